use std::{
    cell::RefCell,
    future::Future,
    marker::PhantomData,
    mem,
    pin::Pin,
    rc::Rc,
    sync::Arc,
    task::{Context, Poll},
    time::Instant,
};

use bytes::Bytes;
use futures_core::{future::LocalBoxFuture, ready};
use pin_project_lite::pin_project;
use time::OffsetDateTime;

use actix_service::{Service, Transform};
use actix_utils::future::{Either, Ready, ready};
use actix_web::body::{BodySize, MessageBody};
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::http::StatusCode;
use actix_web::http::header::{HeaderMap, HeaderValue};
use actix_web::{Error, HttpMessage, Result};

use crate::attr::Attr;
use crate::body::{self, BodyCapture, CapturedPayload};
use crate::config::Config;
use crate::context::{CustomAttributes, RequestId};
use crate::exchange::{Exchange, RequestFacts, ResponseFacts};
use crate::filters::Filter;
use crate::record::PendingRecord;
use crate::sink::{LogCrate, LogSink};
use crate::trace;

/// Middleware emitting one structured record per request.
///
/// The record is handed to a [`LogSink`] once the response body has been
/// streamed, so the logged response length is the number of bytes actually
/// sent.
///
/// # Examples
/// ```rust
/// use actix_web::App;
/// use actix_web_middleware_reqlog::RequestLogger;
///
/// let app = App::new()
///     .wrap(RequestLogger::default());
/// ```
pub struct RequestLogger(Rc<Inner>);

struct Inner {
    sink: Arc<dyn LogSink>,
    config: Config,
}

impl RequestLogger {
    /// Create `RequestLogger` middleware writing to `sink` with the default
    /// [`Config`].
    pub fn new(sink: impl LogSink) -> RequestLogger {
        RequestLogger::with_config(sink, Config::default())
    }

    /// Default [`Config`] plus `filters`. Every filter has to accept a
    /// request for it to be logged.
    pub fn with_filters(
        sink: impl LogSink,
        filters: impl IntoIterator<Item = Filter>,
    ) -> RequestLogger {
        RequestLogger::with_config(sink, Config::default().filters(filters))
    }

    pub fn with_config(sink: impl LogSink, config: Config) -> RequestLogger {
        RequestLogger(Rc::new(Inner {
            sink: Arc::new(sink),
            config,
        }))
    }

    pub fn config(&self) -> &Config {
        &self.0.config
    }
}

impl Default for RequestLogger {
    /// Create `RequestLogger` middleware logging through the `log` crate
    /// under the `actix_web_middleware_reqlog::logger` target.
    fn default() -> Self {
        RequestLogger::new(LogCrate::default())
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequestLogger
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<StreamLog<B>>;
    type Error = Error;
    type Transform = RequestLoggerMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestLoggerMiddleware {
            service: Rc::new(service),
            inner: Rc::clone(&self.0),
        }))
    }
}

pin_project! {
    /// Response body that emits the pending record once it is finished or
    /// dropped.
    pub struct StreamLog<B> {
        #[pin]
        body: B,
        record: Option<PendingRecord>,
        capture: BodyCapture,
    }

    impl<B> PinnedDrop for StreamLog<B> {
        fn drop(this: Pin<&mut Self>) {
            let this = this.project();
            if let Some(record) = this.record.take() {
                record.emit(this.capture);
            }
        }
    }
}

impl<B: MessageBody> MessageBody for StreamLog<B> {
    type Error = B::Error;

    #[inline]
    fn size(&self) -> BodySize {
        self.body.size()
    }

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Bytes, Self::Error>>> {
        let this = self.project();

        match ready!(this.body.poll_next(cx)) {
            Some(Ok(chunk)) => {
                this.capture.record(&chunk);
                Poll::Ready(Some(Ok(chunk)))
            }
            Some(Err(err)) => Poll::Ready(Some(Err(err))),
            None => {
                this.capture.finish();
                Poll::Ready(None)
            }
        }
    }
}

/// Logger middleware service.
pub struct RequestLoggerMiddleware<S> {
    inner: Rc<Inner>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for RequestLoggerMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<StreamLog<B>>;
    type Error = Error;
    type Future = RequestLoggerResponse<S, B>;

    actix_service::forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let config = &self.inner.config;
        let start = Instant::now();
        let started_at = OffsetDateTime::now_utc();

        let request_id = config.with_request_id.then(|| {
            let id = RequestId::resolve(&req, config);
            req.extensions_mut().insert(id.clone());
            id
        });
        let custom = CustomAttributes::install(&req);

        let request = RequestFacts::collect(&req, config);

        let mut base = Vec::new();
        if let Some(id) = &request_id {
            base.push(Attr::new(config.request_id_key.clone(), id.as_str()));
        }
        base.extend(trace::span_attributes(&req, config));

        let capture = Rc::new(RefCell::new(BodyCapture::new(config.request_body_limit())));
        let fut = if config.request_body_limit() > 0 {
            // read the captured prefix before dispatch; the handler still
            // gets the whole body
            let service = Rc::clone(&self.service);
            let capture = Rc::clone(&capture);
            let fut: LocalBoxFuture<'static, _> = Box::pin(async move {
                let payload = body::prefill(req.take_payload(), capture).await;
                req.set_payload(payload);
                service.call(req).await
            });
            Either::right(fut)
        } else {
            let payload = req.take_payload();
            req.set_payload(CapturedPayload::wrap(payload, Rc::clone(&capture)));
            Either::left(self.service.call(req))
        };

        RequestLoggerResponse {
            fut,
            inner: Rc::clone(&self.inner),
            start,
            started_at,
            request,
            request_id,
            base,
            custom,
            capture,
            _phantom: PhantomData,
        }
    }
}

pin_project! {
    pub struct RequestLoggerResponse<S, B>
    where
        B: MessageBody,
        S: Service<ServiceRequest>,
    {
        #[pin]
        fut: Either<S::Future, LocalBoxFuture<'static, Result<S::Response, S::Error>>>,
        inner: Rc<Inner>,
        start: Instant,
        started_at: OffsetDateTime,
        request: RequestFacts,
        request_id: Option<RequestId>,
        base: Vec<Attr>,
        custom: CustomAttributes,
        capture: Rc<RefCell<BodyCapture>>,
        _phantom: PhantomData<B>,
    }
}

impl<S, B> Future for RequestLoggerResponse<S, B>
where
    B: MessageBody,
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
{
    type Output = Result<ServiceResponse<StreamLog<B>>, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        let result = ready!(this.fut.poll(cx));
        let latency = this.start.elapsed();
        let inner = Rc::clone(this.inner);
        let config = &inner.config;

        let mut exchange = Exchange {
            start: *this.started_at,
            end: *this.started_at + latency,
            latency,
            request_id: this.request_id.as_ref().map(RequestId::to_string),
            request: mem::take(this.request),
            response: ResponseFacts::default(),
        };

        match result {
            Ok(mut res) => {
                if let Some(id) = this.request_id {
                    match HeaderValue::from_str(id.as_str()) {
                        Ok(value) => {
                            res.headers_mut()
                                .insert(config.request_id_header.clone(), value);
                        }
                        Err(err) => log::debug!("Request id {id:?} is not a valid header: {err}"),
                    }
                }

                exchange.response = ResponseFacts::from_response(&res, config);

                let record = config.accepts(&exchange).then(|| {
                    PendingRecord::new(
                        Arc::clone(&inner.sink),
                        config,
                        exchange,
                        mem::take(this.base),
                        this.custom.take(),
                        Rc::clone(this.capture),
                    )
                });
                let mut capture = BodyCapture::new(config.response_body_limit());

                Poll::Ready(Ok(res.map_body(move |_, body| {
                    capture.set_size_hint(body.size());
                    StreamLog {
                        body,
                        record,
                        capture,
                    }
                })))
            }

            Err(err) => {
                // The framework renders `err` itself; the translated response
                // is only inspected.
                let mut capture = BodyCapture::new(config.response_body_limit());
                let (status, headers) = match (config.error_handler)(&err) {
                    Ok(res) => {
                        let status = res.status();
                        let headers = res.headers().clone();
                        match res.into_body().try_into_bytes() {
                            Ok(bytes) => {
                                capture.record(&bytes);
                                capture.finish();
                            }
                            Err(body) => capture.set_size_hint(body.size()),
                        }
                        (status, headers)
                    }
                    Err(handler_err) => {
                        log::warn!("Error handler failed, logging as 500: {handler_err}");
                        (StatusCode::INTERNAL_SERVER_ERROR, HeaderMap::new())
                    }
                };

                exchange.response =
                    ResponseFacts::from_error(status, &headers, err.to_string(), config);

                if config.accepts(&exchange) {
                    PendingRecord::new(
                        Arc::clone(&inner.sink),
                        config,
                        exchange,
                        mem::take(this.base),
                        this.custom.take(),
                        Rc::clone(this.capture),
                    )
                    .emit(&capture);
                }

                Poll::Ready(Err(err))
            }
        }
    }
}
