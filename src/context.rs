use std::{cell::RefCell, fmt, rc::Rc};

use actix_utils::future::{Ready, ready};
use actix_web::dev::{Payload, ServiceRequest};
use actix_web::{Error, FromRequest, HttpMessage, HttpRequest};
use uuid::Uuid;

use crate::attr::Attr;
use crate::config::Config;

/// Identifier of the current request.
///
/// Can be used as a handler argument; it is empty when request IDs are
/// disabled.
///
/// # Examples
/// ```rust
/// use actix_web_middleware_reqlog::RequestId;
///
/// async fn index(id: RequestId) -> String {
///     format!("request {id}")
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    pub(crate) fn new() -> Self {
        #[cfg(not(feature = "uuid_v7"))]
        {
            Self(Uuid::new_v4().as_hyphenated().to_string())
        }
        #[cfg(feature = "uuid_v7")]
        {
            Self(Uuid::now_v7().as_hyphenated().to_string())
        }
    }

    /// Inbound ID from the configured header, else an ID set by
    /// `TracingLogger`, else a fresh UUID.
    pub(crate) fn resolve(req: &ServiceRequest, config: &Config) -> Self {
        let inbound = req
            .headers()
            .get(&config.request_id_header)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty());

        match inbound {
            Some(id) => RequestId(id.to_owned()),
            None => tracing_request_id(req).unwrap_or_else(RequestId::new),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<RequestId> for String {
    fn from(id: RequestId) -> Self {
        id.0
    }
}

impl FromRequest for RequestId {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(Ok(req.extensions().get::<RequestId>().cloned().unwrap_or_default()))
    }
}

#[cfg(feature = "tracing-request-id")]
fn tracing_request_id(req: &ServiceRequest) -> Option<RequestId> {
    req.extensions()
        .get::<tracing_actix_web::RequestId>()
        .map(|id| RequestId(id.to_string()))
}

#[cfg(not(feature = "tracing-request-id"))]
fn tracing_request_id(_req: &ServiceRequest) -> Option<RequestId> {
    None
}

/// Returns the identifier of the current request, or an empty string when
/// request IDs are disabled.
pub fn get_request_id(req: &impl HttpMessage) -> String {
    req.extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default()
}

/// Attributes attached by handlers. Shared with the logger, which reads
/// them once the request is complete.
#[derive(Debug, Clone, Default)]
pub(crate) struct CustomAttributes(Rc<RefCell<Vec<Attr>>>);

impl CustomAttributes {
    pub(crate) fn install(req: &ServiceRequest) -> Self {
        let attrs = CustomAttributes::default();
        req.extensions_mut().insert(attrs.clone());
        attrs
    }

    pub(crate) fn take(&self) -> Vec<Attr> {
        self.0.take()
    }
}

/// Adds an attribute to the log record of the current request.
///
/// Attributes are logged in the order they were added.
///
/// # Examples
/// ```rust
/// use actix_web::HttpRequest;
/// use actix_web_middleware_reqlog::{Attr, add_custom_attribute};
///
/// async fn index(req: HttpRequest) -> &'static str {
///     add_custom_attribute(&req, Attr::new("user_id", 42u64));
///     "Hello world!"
/// }
/// ```
pub fn add_custom_attribute(req: &impl HttpMessage, attr: Attr) {
    let mut extensions = req.extensions_mut();
    match extensions.get::<CustomAttributes>() {
        Some(attrs) => attrs.0.borrow_mut().push(attr),
        None => {
            extensions.insert(CustomAttributes(Rc::new(RefCell::new(vec![attr]))));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_request_id_generation() {
        let id1 = RequestId::new();
        let id2 = RequestId::new();
        assert_ne!(id1, id2);
        assert_eq!(id1.as_str().len(), 36);
    }

    #[test]
    fn test_resolve_prefers_inbound_header() {
        let config = Config::default();

        let req = TestRequest::default()
            .insert_header(("X-Request-Id", "abc-123"))
            .to_srv_request();
        assert_eq!(RequestId::resolve(&req, &config).as_str(), "abc-123");

        let req = TestRequest::default()
            .insert_header(("X-Request-Id", ""))
            .to_srv_request();
        assert_eq!(RequestId::resolve(&req, &config).as_str().len(), 36);

        let config = config.request_id_header("x-correlation-id").unwrap();
        let req = TestRequest::default()
            .insert_header(("X-Correlation-Id", "corr"))
            .insert_header(("X-Request-Id", "abc-123"))
            .to_srv_request();
        assert_eq!(RequestId::resolve(&req, &config).as_str(), "corr");
    }

    #[test]
    fn test_get_request_id() {
        let req = TestRequest::default().to_http_request();
        assert_eq!(get_request_id(&req), "");

        req.extensions_mut().insert(RequestId("req-1".to_owned()));
        assert_eq!(get_request_id(&req), "req-1");
    }

    #[test]
    fn test_custom_attributes_keep_order() {
        let req = TestRequest::default().to_srv_request();
        let attrs = CustomAttributes::install(&req);

        add_custom_attribute(&req, Attr::new("foo", "bar"));
        add_custom_attribute(req.request(), Attr::new("count", 2u64));

        assert_eq!(
            attrs.take(),
            vec![Attr::new("foo", "bar"), Attr::new("count", 2u64)]
        );
        assert!(attrs.take().is_empty());
    }

    #[test]
    fn test_custom_attributes_without_logger() {
        let req = TestRequest::default().to_http_request();
        add_custom_attribute(&req, Attr::new("foo", "bar"));
        add_custom_attribute(&req, Attr::new("baz", "qux"));

        let attrs = req.extensions().get::<CustomAttributes>().cloned().unwrap();
        assert_eq!(attrs.take().len(), 2);
    }
}
