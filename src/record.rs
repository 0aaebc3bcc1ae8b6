use std::{cell::RefCell, rc::Rc, sync::Arc};

use actix_web::http::StatusCode;
use log::Level;

use crate::attr::{Attr, Value};
use crate::body::BodyCapture;
use crate::config::Config;
use crate::exchange::{Exchange, HeaderList};
use crate::sink::LogSink;

pub(crate) const INCOMING_REQUEST: &str = "Incoming request";

/// Level and message of a request that finished with `status`.
pub(crate) fn classify(config: &Config, status: StatusCode, error: Option<&str>) -> (Level, String) {
    let code = status.as_u16();
    let level = if code >= 500 {
        config.server_error_level
    } else if code >= 400 {
        config.client_error_level
    } else {
        return (config.default_level, INCOMING_REQUEST.to_owned());
    };

    let reason = status.canonical_reason().unwrap_or_default();
    let message = match error {
        Some(text) if !text.is_empty() => text.to_owned(),
        Some(_) => String::new(),
        None => reason.to_owned(),
    };

    if message.is_empty() {
        let synthesized = format!("HTTP error: {code} {}", reason.to_lowercase());
        return (level, synthesized.trim_end().to_owned());
    }

    (level, message)
}

/// A record waiting for the body sizes before it can be emitted.
pub(crate) struct PendingRecord {
    sink: Arc<dyn LogSink>,
    level: Level,
    message: String,
    with_request_body: bool,
    with_response_body: bool,
    request: Vec<Attr>,
    request_tail: Vec<Attr>,
    request_body: Rc<RefCell<BodyCapture>>,
    response: Vec<Attr>,
    response_tail: Vec<Attr>,
    base: Vec<Attr>,
    custom: Vec<Attr>,
}

impl PendingRecord {
    pub(crate) fn new(
        sink: Arc<dyn LogSink>,
        config: &Config,
        exchange: Exchange,
        base: Vec<Attr>,
        custom: Vec<Attr>,
        request_body: Rc<RefCell<BodyCapture>>,
    ) -> Self {
        let (level, message) = classify(config, exchange.status(), exchange.error());
        let Exchange {
            start,
            end,
            latency,
            request: req,
            response: res,
            ..
        } = exchange;

        let request = vec![
            Attr::new("time", start),
            Attr::new("method", req.method.as_str()),
            Attr::new("host", req.host),
            Attr::new("path", req.path),
            Attr::new("query", req.query),
            Attr::group(
                "params",
                res.params
                    .into_iter()
                    .map(|(name, value)| Attr::new(name, value))
                    .collect(),
            ),
            Attr::new("route", res.route),
            Attr::new("ip", req.ip),
            Attr::new("x-forwarded-for", Value::list(req.forwarded_for)),
            Attr::new("referer", req.referer),
        ];

        let mut request_tail = Vec::new();
        if config.with_request_header {
            request_tail.push(header_group(req.headers));
        }
        if config.with_user_agent {
            request_tail.push(Attr::new("user-agent", req.user_agent));
        }

        let response = vec![
            Attr::new("time", end),
            Attr::new("latency", latency),
            Attr::new("status", res.status.as_u16()),
        ];

        let mut response_tail = Vec::new();
        if config.with_response_header {
            response_tail.push(header_group(res.headers));
        }

        request_body.borrow_mut().set_hint(req.content_length);

        PendingRecord {
            sink,
            level,
            message,
            with_request_body: config.with_request_body,
            with_response_body: config.with_response_body,
            request,
            request_tail,
            request_body,
            response,
            response_tail,
            base,
            custom,
        }
    }

    /// Assemble the attributes and hand them to the sink.
    pub(crate) fn emit(self, response_body: &BodyCapture) {
        let attrs = self.attrs(response_body);
        self.sink.log(self.level, &self.message, &attrs);
    }

    fn attrs(&self, response_body: &BodyCapture) -> Vec<Attr> {
        let request_body = self.request_body.borrow();

        let mut request = self.request.clone();
        request.push(Attr::new("length", request_body.len()));
        if self.with_request_body {
            request.push(Attr::new("body", request_body.text()));
        }
        request.extend(self.request_tail.iter().cloned());

        let mut response = self.response.clone();
        response.push(Attr::new("length", response_body.len()));
        if self.with_response_body {
            response.push(Attr::new("body", response_body.text()));
        }
        response.extend(self.response_tail.iter().cloned());

        let mut attrs = vec![
            Attr::group("request", request),
            Attr::group("response", response),
        ];
        attrs.extend(self.base.iter().cloned());
        attrs.extend(self.custom.iter().cloned());
        attrs
    }
}

fn header_group(headers: HeaderList) -> Attr {
    Attr::group(
        "header",
        headers
            .into_iter()
            .map(|(name, values)| Attr::new(name, Value::list(values)))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::Method;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Last(Mutex<Option<(Level, String, Vec<Attr>)>>);

    impl LogSink for Last {
        fn log(&self, level: Level, message: &str, attrs: &[Attr]) {
            *self.0.lock().unwrap() = Some((level, message.to_owned(), attrs.to_vec()));
        }
    }

    fn status(code: u16) -> StatusCode {
        StatusCode::from_u16(code).unwrap()
    }

    #[test]
    fn test_classify_levels() {
        let config = Config::default();

        for code in [100, 200, 204, 301, 304, 399] {
            assert_eq!(
                classify(&config, status(code), None),
                (Level::Info, "Incoming request".to_owned())
            );
        }
        for code in [400, 401, 404, 418, 499] {
            assert_eq!(classify(&config, status(code), None).0, Level::Warn);
        }
        for code in [500, 502, 503, 599] {
            assert_eq!(classify(&config, status(code), None).0, Level::Error);
        }

        let config = Config::default()
            .default_level(Level::Debug)
            .client_error_level(Level::Info)
            .server_error_level(Level::Warn);
        assert_eq!(classify(&config, status(200), None).0, Level::Debug);
        assert_eq!(classify(&config, status(404), None).0, Level::Info);
        assert_eq!(classify(&config, status(500), None).0, Level::Warn);
    }

    #[test]
    fn test_classify_messages() {
        let config = Config::default();

        assert_eq!(
            classify(&config, status(401), Some("invalid token")).1,
            "invalid token"
        );
        assert_eq!(
            classify(&config, status(401), Some("")).1,
            "HTTP error: 401 unauthorized"
        );
        assert_eq!(classify(&config, status(404), None).1, "Not Found");
        assert_eq!(
            classify(&config, status(500), None).1,
            "Internal Server Error"
        );
        assert_eq!(classify(&config, status(499), None).1, "HTTP error: 499");
        assert_eq!(
            classify(&config, status(200), Some("ignored")).1,
            "Incoming request"
        );
    }

    #[test]
    fn test_emit_record_shape() {
        let sink = Arc::new(Last::default());
        let config = Config::default()
            .with_request_body(true)
            .with_response_body(true)
            .with_user_agent(true);

        let mut exchange =
            Exchange::for_test(Method::POST, "localhost", "/items/7", StatusCode::CREATED);
        exchange.request.user_agent = "curl/8.0".to_owned();
        exchange.response.route = "/items/{id}".to_owned();
        exchange.response.params = vec![("id".to_owned(), "7".to_owned())];

        let request_body = Rc::new(RefCell::new(BodyCapture::new(4)));
        request_body.borrow_mut().record(b"hello");
        request_body.borrow_mut().finish();

        let mut response_body = BodyCapture::new(65536);
        response_body.record(b"created");
        response_body.finish();

        PendingRecord::new(
            sink.clone(),
            &config,
            exchange,
            vec![Attr::new("id", "req-1")],
            vec![Attr::new("foo", "bar")],
            request_body,
        )
        .emit(&response_body);

        let (level, message, attrs) = sink.0.lock().unwrap().take().unwrap();
        assert_eq!(level, Level::Info);
        assert_eq!(message, "Incoming request");

        let keys: Vec<&str> = attrs.iter().map(Attr::key).collect();
        assert_eq!(keys, vec!["request", "response", "id", "foo"]);

        let request = attrs[0].value();
        assert_eq!(request.get("method").and_then(Value::as_str), Some("POST"));
        assert_eq!(request.get("route").and_then(Value::as_str), Some("/items/{id}"));
        assert_eq!(
            request.get("params").and_then(|p| p.get("id")).and_then(Value::as_str),
            Some("7")
        );
        assert_eq!(request.get("length"), Some(&Value::Uint(5)));
        assert_eq!(request.get("body").and_then(Value::as_str), Some("hell"));
        assert_eq!(request.get("user-agent").and_then(Value::as_str), Some("curl/8.0"));
        assert_eq!(request.get("header"), None);

        let response = attrs[1].value();
        assert_eq!(response.get("status"), Some(&Value::Uint(201)));
        assert_eq!(response.get("length"), Some(&Value::Uint(7)));
        assert_eq!(response.get("body").and_then(Value::as_str), Some("created"));
        assert!(matches!(response.get("latency"), Some(Value::Duration(_))));
        assert!(matches!(response.get("time"), Some(Value::Time(_))));
    }

    #[test]
    fn test_optional_attributes_omitted() {
        let sink = Arc::new(Last::default());
        let exchange = Exchange::for_test(Method::GET, "localhost", "/", StatusCode::OK);

        PendingRecord::new(
            sink.clone(),
            &Config::default(),
            exchange,
            Vec::new(),
            Vec::new(),
            Rc::new(RefCell::new(BodyCapture::new(0))),
        )
        .emit(&BodyCapture::new(0));

        let (_, _, attrs) = sink.0.lock().unwrap().take().unwrap();
        assert_eq!(attrs.len(), 2);
        let request = attrs[0].value();
        assert_eq!(request.get("length"), Some(&Value::Uint(0)));
        assert_eq!(request.get("body"), None);
        assert_eq!(request.get("user-agent"), None);
        assert_eq!(attrs[1].value().get("body"), None);
        assert_eq!(attrs[1].value().get("header"), None);
    }
}
