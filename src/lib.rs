//! Actix-web middleware for structured request logs.
//! This middleware emits exactly one structured record per request, with the
//! request and response grouped as nested attributes.
//!
//! # Examples:
//! ## By default middleware uses the standard `log` crate for logging.
//! ```bash
//! cargo add actix-web-middleware-reqlog
//! ```
//! Example usage with standard `log` crate and `structured_logger` crate:
//! ```rust
//! use actix_web::{web, App, HttpServer};
//! use actix_web_middleware_reqlog::RequestLogger;
//! use tokio;
//! use structured_logger::{Builder, async_json::new_writer};
//!
//! #[actix_web::main] // or #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     Builder::new()
//!         .with_target_writer("*", new_writer(tokio::io::stdout()))
//!         .init();
//!
//!     HttpServer::new(|| {
//!         App::new()
//!             .wrap(RequestLogger::default())
//!             .route("/", web::get().to(|| async { "Hello world!" }))
//!     })
//!     .bind("127.0.0.1:8080")?;
//!     Ok(())
//! }
//! ```
//! A request to `/` is then written as:
//! ```json
//! {"level":"INFO","message":"Incoming request","target":"actix_web_middleware_reqlog::logger",
//!  "request":{"time":"2023-04-10T14:00:00.000012Z","method":"GET","host":"localhost:8080",
//!   "path":"/","query":"","params":{},"route":"/","ip":"127.0.0.1","x-forwarded-for":[],
//!   "referer":"","length":0},
//!  "response":{"time":"2023-04-10T14:00:00.000104Z","latency":"92.3µs","status":200,"length":12},
//!  "id":"0e3b8e51-2a6c-4c6f-8d8e-5d4f1c1a7f43"}
//! ```
//!
//! ## `tracing-request-id` feature reuses the Request ID set by `TracingLogger`.
//! ```bash
//! cargo add actix-web-middleware-reqlog --features tracing-request-id
//! ```
//! Example usage with `tracing-request-id` feature:
//! ```rust
//! use actix_web::{web, App, HttpServer};
//! use actix_web_middleware_reqlog::RequestLogger;
//! use tokio;
//! use structured_logger::{Builder, async_json::new_writer};
//! use tracing_actix_web::TracingLogger;
//!
//! #[actix_web::main] // or #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     Builder::new()
//!         .with_target_writer("*", new_writer(tokio::io::stdout()))
//!         .init();
//!
//!     HttpServer::new(|| {
//!         App::new()
//!             .wrap(RequestLogger::default())
//!             .wrap(TracingLogger::default())
//!             .route("/", web::get().to(|| async { "Hello world!" }))
//!     })
//!     .bind("127.0.0.1:8080")?;
//!     Ok(())
//! }
//!```
//! # Features
//! - One structured record per request, emitted after the response body is sent
//! - Levels and messages derived from the response status and handler error
//! - Optional capture of request and response bodies and headers
//! - Request ID tracking (with UUID v4 or v7 support)
//! - Composable filters over the finished request
//! - Custom attributes added from handlers
//! - OpenTelemetry trace and span IDs via the `otel` feature
//!
//! # Configuration
//!
//! ```rust
//! use actix_web_middleware_reqlog::{Config, Level, LogCrate, RequestLogger, filters};
//!
//! let config = Config::default()
//!     .client_error_level(Level::Info)      // 4xx responses
//!     .with_request_body(true)              // first 64 KiB of the request body
//!     .with_response_header(true)           // minus Set-Cookie
//!     .filter(filters::ignore_path(["/health", "/metrics"]))
//!     .filter(filters::ignore_status([304]));
//!
//! let logger = RequestLogger::with_config(LogCrate::with_target("http_access"), config);
//! ```
//!
//! ## Filters
//!
//! Every filter has to accept a request for it to be logged:
//!
//! ```rust
//! use actix_web_middleware_reqlog::{LogCrate, RequestLogger, filters};
//! use regex::Regex;
//!
//! let logger = RequestLogger::with_filters(
//!     LogCrate::default(),
//!     [
//!         filters::accept_status_greater_than_or_equal(400),
//!         filters::ignore_path_match([Regex::new(r"^/assets/.*").unwrap()]),
//!     ],
//! );
//! ```
//!
//! ## Custom attributes
//!
//! ```rust
//! use actix_web::HttpRequest;
//! use actix_web_middleware_reqlog::{Attr, add_custom_attribute, get_request_id};
//!
//! async fn index(req: HttpRequest) -> String {
//!     add_custom_attribute(&req, Attr::new("tenant", "acme"));
//!     get_request_id(&req)
//! }
//! ```
//!
//! # Record shape
//!
//! - `request` - time, method, host, path, query, params, route, ip,
//!   x-forwarded-for, referer, length, and optionally body, header and
//!   user-agent
//! - `response` - time, latency, status, length, and optionally body and header
//! - `id` - request ID
//! - `trace_id`, `span_id` - when enabled and a recording span exists
//! - custom attributes, in the order they were added
//!
//! Authorization, Cookie, Set-Cookie, X-Auth-Token, X-CSRF-Token and
//! X-XSRF-Token request headers and Set-Cookie response headers are never logged.
//!
//! # Feature Flags
//!
//! - `uuid_v4` (default) - Use UUIDv4 for request IDs
//! - `uuid_v7` - Use UUIDv7 instead of UUIDv4 for request IDs
//! - `tracing-request-id` - Reuse `tracing-actix-web`'s request ID
//! - `otel` - Log OpenTelemetry trace and span IDs

mod attr;
mod body;
mod config;
mod context;
mod exchange;
pub mod filters;
mod logger;
mod record;
mod sink;
mod trace;

pub use crate::attr::{Attr, Value};
pub use crate::config::{
    BODY_MAX_SIZE, Config, ErrorHandler, HIDDEN_REQUEST_HEADERS, HIDDEN_RESPONSE_HEADERS,
    REQUEST_ID_HEADER, REQUEST_ID_KEY, SPAN_ID_KEY, TRACE_ID_KEY,
};
pub use crate::context::{RequestId, add_custom_attribute, get_request_id};
pub use crate::exchange::Exchange;
pub use crate::filters::Filter;
pub use crate::logger::{RequestLogger, RequestLoggerMiddleware, RequestLoggerResponse, StreamLog};
pub use crate::sink::{LogCrate, LogSink};
pub use log::Level;
