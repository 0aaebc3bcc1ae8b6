use std::{borrow::Cow, collections::HashSet, fmt, sync::Arc};

use actix_web::http::header::{HeaderName, InvalidHeaderName};
use actix_web::{Error, HttpResponse};
use log::Level;

use crate::exchange::Exchange;
use crate::filters::Filter;

/// Header used to read and propagate the request identifier.
pub const REQUEST_ID_HEADER: &str = "x-request-id";
/// Attribute key of the request identifier.
pub const REQUEST_ID_KEY: &str = "id";
pub const TRACE_ID_KEY: &str = "trace_id";
pub const SPAN_ID_KEY: &str = "span_id";

/// Bodies are truncated to this many bytes before being logged.
pub const BODY_MAX_SIZE: usize = 64 * 1024;

/// Request headers that are never logged.
pub const HIDDEN_REQUEST_HEADERS: [&str; 6] = [
    "authorization",
    "cookie",
    "set-cookie",
    "x-auth-token",
    "x-csrf-token",
    "x-xsrf-token",
];
/// Response headers that are never logged.
pub const HIDDEN_RESPONSE_HEADERS: [&str; 1] = ["set-cookie"];

/// Translates an error returned by the wrapped service into the response the
/// framework will render for it.
pub type ErrorHandler = Arc<dyn Fn(&Error) -> Result<HttpResponse, Error> + Send + Sync>;

/// Settings of a [`RequestLogger`](crate::RequestLogger).
///
/// A `Config` is cheap to clone and can be moved into the `HttpServer::new`
/// factory closure.
///
/// # Examples
/// ```rust
/// use actix_web_middleware_reqlog::{Config, Level, filters};
///
/// let config = Config::default()
///     .client_error_level(Level::Info)
///     .with_request_body(true)
///     .with_user_agent(true)
///     .filter(filters::ignore_path(["/health", "/metrics"]));
/// ```
#[derive(Clone)]
pub struct Config {
    pub(crate) default_level: Level,
    pub(crate) client_error_level: Level,
    pub(crate) server_error_level: Level,

    pub(crate) with_user_agent: bool,
    pub(crate) with_request_id: bool,
    pub(crate) with_request_body: bool,
    pub(crate) with_request_header: bool,
    pub(crate) with_response_body: bool,
    pub(crate) with_response_header: bool,
    pub(crate) with_span_id: bool,
    pub(crate) with_trace_id: bool,

    pub(crate) filters: Vec<Filter>,

    pub(crate) request_id_header: HeaderName,
    pub(crate) request_id_key: Cow<'static, str>,
    pub(crate) trace_id_key: Cow<'static, str>,
    pub(crate) span_id_key: Cow<'static, str>,
    pub(crate) hidden_request_headers: HashSet<String>,
    pub(crate) hidden_response_headers: HashSet<String>,
    pub(crate) request_body_max_size: usize,
    pub(crate) response_body_max_size: usize,

    pub(crate) error_handler: ErrorHandler,
}

impl Default for Config {
    /// Info for successful requests, Warn for 4xx, Error for 5xx.
    /// Only the request ID is enabled.
    fn default() -> Self {
        Config {
            default_level: Level::Info,
            client_error_level: Level::Warn,
            server_error_level: Level::Error,

            with_user_agent: false,
            with_request_id: true,
            with_request_body: false,
            with_request_header: false,
            with_response_body: false,
            with_response_header: false,
            with_span_id: false,
            with_trace_id: false,

            filters: Vec::new(),

            request_id_header: HeaderName::from_static(REQUEST_ID_HEADER),
            request_id_key: Cow::Borrowed(REQUEST_ID_KEY),
            trace_id_key: Cow::Borrowed(TRACE_ID_KEY),
            span_id_key: Cow::Borrowed(SPAN_ID_KEY),
            hidden_request_headers: HIDDEN_REQUEST_HEADERS.map(String::from).into(),
            hidden_response_headers: HIDDEN_RESPONSE_HEADERS.map(String::from).into(),
            request_body_max_size: BODY_MAX_SIZE,
            response_body_max_size: BODY_MAX_SIZE,

            error_handler: Arc::new(|err: &Error| Ok(err.error_response())),
        }
    }
}

impl Config {
    /// Level of requests that finished with a status below 400.
    pub fn default_level(mut self, level: Level) -> Self {
        self.default_level = level;
        self
    }

    /// Level of requests that finished with a 4xx status.
    pub fn client_error_level(mut self, level: Level) -> Self {
        self.client_error_level = level;
        self
    }

    /// Level of requests that finished with a status of 500 or above.
    pub fn server_error_level(mut self, level: Level) -> Self {
        self.server_error_level = level;
        self
    }

    pub fn with_user_agent(mut self, enabled: bool) -> Self {
        self.with_user_agent = enabled;
        self
    }

    /// Reuse the inbound request ID or generate one, echo it in the response
    /// header and log it.
    pub fn with_request_id(mut self, enabled: bool) -> Self {
        self.with_request_id = enabled;
        self
    }

    pub fn with_request_body(mut self, enabled: bool) -> Self {
        self.with_request_body = enabled;
        self
    }

    pub fn with_request_header(mut self, enabled: bool) -> Self {
        self.with_request_header = enabled;
        self
    }

    pub fn with_response_body(mut self, enabled: bool) -> Self {
        self.with_response_body = enabled;
        self
    }

    pub fn with_response_header(mut self, enabled: bool) -> Self {
        self.with_response_header = enabled;
        self
    }

    /// Log the span ID of the recording OpenTelemetry span, if any.
    /// Needs the `otel` feature.
    pub fn with_span_id(mut self, enabled: bool) -> Self {
        self.with_span_id = enabled;
        self
    }

    /// Log the trace ID of the recording OpenTelemetry span, if any.
    /// Needs the `otel` feature.
    pub fn with_trace_id(mut self, enabled: bool) -> Self {
        self.with_trace_id = enabled;
        self
    }

    /// Append a filter. Every filter has to accept a request for it to be logged.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn filters(mut self, filters: impl IntoIterator<Item = Filter>) -> Self {
        self.filters.extend(filters);
        self
    }

    /// Header the request ID is read from and written to.
    pub fn request_id_header(mut self, header: &str) -> Result<Self, InvalidHeaderName> {
        self.request_id_header = HeaderName::try_from(header)?;
        Ok(self)
    }

    pub fn request_id_key(mut self, key: impl Into<Cow<'static, str>>) -> Self {
        self.request_id_key = key.into();
        self
    }

    pub fn trace_id_key(mut self, key: impl Into<Cow<'static, str>>) -> Self {
        self.trace_id_key = key.into();
        self
    }

    pub fn span_id_key(mut self, key: impl Into<Cow<'static, str>>) -> Self {
        self.span_id_key = key.into();
        self
    }

    /// Never log the request header `name`, in addition to the defaults.
    pub fn hide_request_header(mut self, name: &str) -> Self {
        self.hidden_request_headers.insert(name.to_ascii_lowercase());
        self
    }

    /// Never log the response header `name`, in addition to the defaults.
    pub fn hide_response_header(mut self, name: &str) -> Self {
        self.hidden_response_headers.insert(name.to_ascii_lowercase());
        self
    }

    /// Maximum number of body bytes kept for the `body` attributes.
    pub fn body_max_size(mut self, request: usize, response: usize) -> Self {
        self.request_body_max_size = request;
        self.response_body_max_size = response;
        self
    }

    /// Replace the translation of service errors into responses.
    ///
    /// The logger only reads the translated response; the error itself is
    /// still returned to the framework. When the handler fails, the request
    /// is logged as `500 Internal Server Error`.
    pub fn error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Error) -> Result<HttpResponse, Error> + Send + Sync + 'static,
    {
        self.error_handler = Arc::new(handler);
        self
    }

    pub(crate) fn accepts(&self, exchange: &Exchange) -> bool {
        self.filters.iter().all(|filter| filter.matches(exchange))
    }

    pub(crate) fn request_body_limit(&self) -> usize {
        if self.with_request_body {
            self.request_body_max_size
        } else {
            0
        }
    }

    pub(crate) fn response_body_limit(&self) -> usize {
        if self.with_response_body {
            self.response_body_max_size
        } else {
            0
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("default_level", &self.default_level)
            .field("client_error_level", &self.client_error_level)
            .field("server_error_level", &self.server_error_level)
            .field("with_user_agent", &self.with_user_agent)
            .field("with_request_id", &self.with_request_id)
            .field("with_request_body", &self.with_request_body)
            .field("with_request_header", &self.with_request_header)
            .field("with_response_body", &self.with_response_body)
            .field("with_response_header", &self.with_response_header)
            .field("with_span_id", &self.with_span_id)
            .field("with_trace_id", &self.with_trace_id)
            .field("filters", &self.filters.len())
            .field("request_id_header", &self.request_id_header)
            .finish_non_exhaustive()
    }
}
