use std::{
    cell::RefCell,
    collections::VecDeque,
    future::poll_fn,
    pin::Pin,
    rc::Rc,
    task::{Context, Poll},
};

use actix_http::BoxedPayloadStream;
use actix_web::body::BodySize;
use actix_web::dev::Payload;
use actix_web::error::PayloadError;
use bytes::{Bytes, BytesMut};
use futures_core::{Stream, ready};

/// Counts the bytes of a body as they stream by and keeps the first `limit`
/// of them.
#[derive(Debug, Default)]
pub(crate) struct BodyCapture {
    limit: usize,
    length: usize,
    hint: Option<usize>,
    complete: bool,
    buf: BytesMut,
}

impl BodyCapture {
    pub(crate) fn new(limit: usize) -> Self {
        BodyCapture {
            limit,
            ..Default::default()
        }
    }

    /// Size announced up front (`Content-Length` or a sized body). Used when
    /// the body was not read to the end.
    pub(crate) fn set_hint(&mut self, hint: Option<usize>) {
        self.hint = hint;
    }

    pub(crate) fn set_size_hint(&mut self, size: BodySize) {
        if let BodySize::Sized(size) = size {
            self.hint = usize::try_from(size).ok();
        }
    }

    pub(crate) fn record(&mut self, chunk: &[u8]) {
        self.length += chunk.len();
        let room = self.limit.saturating_sub(self.buf.len());
        self.buf.extend_from_slice(&chunk[..room.min(chunk.len())]);
    }

    pub(crate) fn finish(&mut self) {
        self.complete = true;
    }

    pub(crate) fn is_full(&self) -> bool {
        self.buf.len() >= self.limit
    }

    /// Full, untruncated body length.
    pub(crate) fn len(&self) -> usize {
        match self.hint {
            Some(hint) if !self.complete => hint.max(self.length),
            _ => self.length,
        }
    }

    /// Captured prefix of the body, never longer than `limit` bytes.
    pub(crate) fn text(&self) -> String {
        let mut bytes = &self.buf[..];

        // a character cut by the truncation is dropped whole
        if bytes.len() < self.length {
            if let Err(err) = std::str::from_utf8(bytes) {
                if err.error_len().is_none() {
                    bytes = &bytes[..err.valid_up_to()];
                }
            }
        }

        let mut text = String::from_utf8_lossy(bytes).into_owned();
        if text.len() > self.limit {
            let mut end = self.limit;
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            text.truncate(end);
        }
        text
    }
}

/// Request payload that reports what the handler reads into a shared
/// [`BodyCapture`].
///
/// Chunks read ahead of the handler are replayed first; they are already
/// recorded.
pub(crate) struct CapturedPayload {
    prefix: VecDeque<Result<Bytes, PayloadError>>,
    rest: Option<BoxedPayloadStream>,
    capture: Rc<RefCell<BodyCapture>>,
}

impl CapturedPayload {
    pub(crate) fn wrap(payload: Payload, capture: Rc<RefCell<BodyCapture>>) -> Payload {
        CapturedPayload::replay(VecDeque::new(), Some(Box::pin(payload)), capture)
    }

    fn replay(
        prefix: VecDeque<Result<Bytes, PayloadError>>,
        rest: Option<BoxedPayloadStream>,
        capture: Rc<RefCell<BodyCapture>>,
    ) -> Payload {
        let stream: BoxedPayloadStream = Box::pin(CapturedPayload {
            prefix,
            rest,
            capture,
        });
        Payload::from(stream)
    }
}

impl Stream for CapturedPayload {
    type Item = Result<Bytes, PayloadError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if let Some(item) = this.prefix.pop_front() {
            return Poll::Ready(Some(item));
        }
        let Some(rest) = this.rest.as_mut() else {
            return Poll::Ready(None);
        };

        let item = ready!(rest.as_mut().poll_next(cx));
        match &item {
            Some(Ok(chunk)) => this.capture.borrow_mut().record(chunk),
            Some(Err(_)) => {}
            None => {
                this.capture.borrow_mut().finish();
                this.rest = None;
            }
        }
        Poll::Ready(item)
    }
}

/// Read the payload until `capture` is full or the payload ends, so the body
/// is captured even when the handler never reads it. The returned payload
/// yields the whole body again.
pub(crate) async fn prefill(payload: Payload, capture: Rc<RefCell<BodyCapture>>) -> Payload {
    let mut stream: BoxedPayloadStream = Box::pin(payload);
    let mut prefix = VecDeque::new();

    while !capture.borrow().is_full() {
        match poll_fn(|cx| stream.as_mut().poll_next(cx)).await {
            Some(Ok(chunk)) => {
                capture.borrow_mut().record(&chunk);
                prefix.push_back(Ok(chunk));
            }
            Some(Err(err)) => {
                prefix.push_back(Err(err));
                return CapturedPayload::replay(prefix, None, capture);
            }
            None => {
                capture.borrow_mut().finish();
                return CapturedPayload::replay(prefix, None, capture);
            }
        }
    }

    CapturedPayload::replay(prefix, Some(stream), capture)
}
