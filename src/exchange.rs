use std::{collections::HashSet, time::Duration};

use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::http::header::{self, HeaderMap};
use actix_web::http::{Method, StatusCode};
use time::OffsetDateTime;

use crate::config::Config;

/// Header names paired with all of their values.
pub(crate) type HeaderList = Vec<(String, Vec<String>)>;

/// One request paired with the outcome of the wrapped service.
///
/// Handed to every [`Filter`](crate::Filter) once the service has returned.
///
/// ```rust
/// use actix_web_middleware_reqlog::{Config, Filter};
///
/// let config = Config::default().filter(Filter::new(|exchange| {
///     exchange.status().is_server_error() || exchange.latency().as_millis() > 500
/// }));
/// ```
#[derive(Debug, Clone)]
pub struct Exchange {
    pub(crate) start: OffsetDateTime,
    pub(crate) end: OffsetDateTime,
    pub(crate) latency: Duration,
    pub(crate) request_id: Option<String>,
    pub(crate) request: RequestFacts,
    pub(crate) response: ResponseFacts,
}

/// Everything known about the request before it is dispatched.
#[derive(Debug, Clone, Default)]
pub(crate) struct RequestFacts {
    pub(crate) method: Method,
    pub(crate) host: String,
    pub(crate) path: String,
    pub(crate) query: String,
    pub(crate) ip: String,
    pub(crate) forwarded_for: Vec<String>,
    pub(crate) user_agent: String,
    pub(crate) referer: String,
    pub(crate) content_length: Option<usize>,
    pub(crate) headers: HeaderList,
}

/// Outcome of the wrapped service.
#[derive(Debug, Clone, Default)]
pub(crate) struct ResponseFacts {
    pub(crate) status: StatusCode,
    pub(crate) route: String,
    pub(crate) params: Vec<(String, String)>,
    pub(crate) error: Option<String>,
    pub(crate) headers: HeaderList,
}

impl Exchange {
    /// HTTP method of the request.
    pub fn method(&self) -> &Method {
        &self.request.method
    }

    /// Host the request was addressed to.
    pub fn host(&self) -> &str {
        &self.request.host
    }

    /// Request path, without the query string.
    pub fn path(&self) -> &str {
        &self.request.path
    }

    /// Raw query string, empty when there is none.
    pub fn query(&self) -> &str {
        &self.request.query
    }

    /// Client IP: first `X-Forwarded-For` entry, else the peer address.
    pub fn ip(&self) -> &str {
        &self.request.ip
    }

    /// Every address listed in `X-Forwarded-For`, in order.
    pub fn forwarded_for(&self) -> &[String] {
        &self.request.forwarded_for
    }

    /// `User-Agent` header, empty when absent.
    pub fn user_agent(&self) -> &str {
        &self.request.user_agent
    }

    /// `Referer` header, empty when absent.
    pub fn referer(&self) -> &str {
        &self.request.referer
    }

    /// Response status, or the status the error translates to.
    pub fn status(&self) -> StatusCode {
        self.response.status
    }

    /// Matched resource pattern. Example: /users/{id}
    pub fn route(&self) -> &str {
        &self.response.route
    }

    /// Path parameters extracted by the matched route.
    pub fn params(&self) -> &[(String, String)] {
        &self.response.params
    }

    /// Text of the error produced while handling the request.
    pub fn error(&self) -> Option<&str> {
        self.response.error.as_deref()
    }

    /// Request ID, when request IDs are enabled.
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// When the middleware received the request.
    pub fn start(&self) -> OffsetDateTime {
        self.start
    }

    /// When the wrapped service returned.
    pub fn end(&self) -> OffsetDateTime {
        self.end
    }

    /// Time spent in the wrapped service.
    pub fn latency(&self) -> Duration {
        self.latency
    }
}

impl RequestFacts {
    pub(crate) fn collect(req: &ServiceRequest, config: &Config) -> Self {
        let headers = req.headers();
        let forwarded_for = forwarded_for(headers);
        let ip = match forwarded_for.first() {
            Some(ip) => ip.clone(),
            None => req
                .peer_addr()
                .map(|addr| addr.ip().to_string())
                .unwrap_or_default(),
        };

        RequestFacts {
            method: req.method().clone(),
            host: req.connection_info().host().to_owned(),
            path: req.path().to_owned(),
            query: req.query_string().to_owned(),
            ip,
            forwarded_for,
            user_agent: header_str(headers, &header::USER_AGENT),
            referer: header_str(headers, &header::REFERER),
            content_length: headers
                .get(header::CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok()),
            headers: if config.with_request_header {
                visible_headers(headers, &config.hidden_request_headers)
            } else {
                Vec::new()
            },
        }
    }
}

impl ResponseFacts {
    pub(crate) fn from_response<B>(res: &ServiceResponse<B>, config: &Config) -> Self {
        let req = res.request();

        ResponseFacts {
            status: res.status(),
            route: req.match_pattern().unwrap_or_default(),
            params: req
                .match_info()
                .iter()
                .map(|(name, value)| (name.to_owned(), value.to_owned()))
                .collect(),
            error: res.response().error().map(|err| err.to_string()),
            headers: response_headers(res.headers(), config),
        }
    }

    /// Outcome of a service that returned an error instead of a response.
    /// Route and params are unknown at that point.
    pub(crate) fn from_error(
        status: StatusCode,
        headers: &HeaderMap,
        error: String,
        config: &Config,
    ) -> Self {
        ResponseFacts {
            status,
            route: String::new(),
            params: Vec::new(),
            error: Some(error),
            headers: response_headers(headers, config),
        }
    }
}

fn response_headers(headers: &HeaderMap, config: &Config) -> HeaderList {
    if config.with_response_header {
        visible_headers(headers, &config.hidden_response_headers)
    } else {
        Vec::new()
    }
}

/// All headers not in `hidden`, sorted by name.
pub(crate) fn visible_headers(headers: &HeaderMap, hidden: &HashSet<String>) -> HeaderList {
    let mut list: HeaderList = headers
        .keys()
        .filter(|name| !hidden.contains(&name.as_str().to_ascii_lowercase()))
        .map(|name| {
            let values = headers
                .get_all(name)
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                .collect();
            (name.as_str().to_owned(), values)
        })
        .collect();
    list.sort_by(|a, b| a.0.cmp(&b.0));
    list
}

/// Entries of every `X-Forwarded-For` header, in order.
pub(crate) fn forwarded_for(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all("x-forwarded-for")
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_owned)
        .collect()
}

fn header_str(headers: &HeaderMap, name: &header::HeaderName) -> String {
    headers
        .get(name)
        .map(|v| v.to_str().unwrap_or_default().to_owned())
        .unwrap_or_default()
}

#[cfg(test)]
impl Exchange {
    pub(crate) fn for_test(method: Method, host: &str, path: &str, status: StatusCode) -> Self {
        let now = OffsetDateTime::now_utc();
        Exchange {
            start: now,
            end: now,
            latency: Duration::ZERO,
            request_id: None,
            request: RequestFacts {
                method,
                host: host.to_owned(),
                path: path.to_owned(),
                ..Default::default()
            },
            response: ResponseFacts {
                status,
                ..Default::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_collect_request_facts() {
        let req = TestRequest::default()
            .method(Method::POST)
            .uri("/items?page=2")
            .insert_header(("host", "api.example.com"))
            .insert_header(("user-agent", "test-agent"))
            .insert_header(("referer", "https://example.com"))
            .insert_header(("content-length", "12"))
            .peer_addr("10.1.2.3:5555".parse().unwrap())
            .to_srv_request();

        let facts = RequestFacts::collect(&req, &Config::default());
        assert_eq!(facts.method, Method::POST);
        assert_eq!(facts.host, "api.example.com");
        assert_eq!(facts.path, "/items");
        assert_eq!(facts.query, "page=2");
        assert_eq!(facts.ip, "10.1.2.3");
        assert!(facts.forwarded_for.is_empty());
        assert_eq!(facts.user_agent, "test-agent");
        assert_eq!(facts.referer, "https://example.com");
        assert_eq!(facts.content_length, Some(12));
        assert!(facts.headers.is_empty());
    }

    #[test]
    fn test_forwarded_ip_takes_precedence() {
        let req = TestRequest::default()
            .insert_header(("x-forwarded-for", "203.0.113.7, 10.0.0.1"))
            .append_header(("x-forwarded-for", "10.0.0.2"))
            .peer_addr("10.1.2.3:5555".parse().unwrap())
            .to_srv_request();

        let facts = RequestFacts::collect(&req, &Config::default());
        assert_eq!(facts.ip, "203.0.113.7");
        assert_eq!(facts.forwarded_for, vec!["203.0.113.7", "10.0.0.1", "10.0.0.2"]);
    }

    #[test]
    fn test_hidden_request_headers_are_skipped() {
        let req = TestRequest::default()
            .insert_header(("Authorization", "Bearer secret"))
            .insert_header(("Cookie", "session=1"))
            .insert_header(("X-CSRF-Token", "token"))
            .insert_header(("Accept", "application/json"))
            .insert_header(("X-Custom", "a"))
            .append_header(("X-Custom", "b"))
            .to_srv_request();

        let config = Config::default().with_request_header(true);
        let facts = RequestFacts::collect(&req, &config);

        let names: Vec<&str> = facts.headers.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["accept", "x-custom"]);
        assert_eq!(facts.headers[1].1, vec!["a", "b"]);
    }

    #[test]
    fn test_visible_headers_respect_custom_deny_list() {
        let mut headers = HeaderMap::new();
        headers.insert(header::SET_COOKIE, header::HeaderValue::from_static("a=b"));
        headers.insert(header::CONTENT_TYPE, header::HeaderValue::from_static("text/plain"));
        headers.insert(
            header::HeaderName::from_static("x-internal"),
            header::HeaderValue::from_static("1"),
        );

        let config = Config::default().hide_response_header("X-Internal");
        let list = visible_headers(&headers, &config.hidden_response_headers);
        assert_eq!(list, vec![("content-type".to_owned(), vec!["text/plain".to_owned()])]);
    }
}
