use actix_web::HttpMessage;
use actix_web::dev::ServiceRequest;

use crate::attr::Attr;
use crate::config::Config;

/// Trace and span ID of the recording OpenTelemetry span of the request.
///
/// The context stored in the request extensions wins over the current one.
#[cfg(feature = "otel")]
pub(crate) fn span_attributes(req: &ServiceRequest, config: &Config) -> Vec<Attr> {
    use opentelemetry::trace::{SpanId, TraceContextExt, TraceId};

    if !(config.with_trace_id || config.with_span_id) {
        return Vec::new();
    }

    let cx = req
        .extensions()
        .get::<opentelemetry::Context>()
        .cloned()
        .unwrap_or_else(opentelemetry::Context::current);
    let span = cx.span();
    if !span.is_recording() {
        return Vec::new();
    }

    let span_context = span.span_context();
    let mut attrs = Vec::new();

    if config.with_trace_id && span_context.trace_id() != TraceId::INVALID {
        attrs.push(Attr::new(
            config.trace_id_key.clone(),
            span_context.trace_id().to_string(),
        ));
    }

    if config.with_span_id && span_context.span_id() != SpanId::INVALID {
        attrs.push(Attr::new(
            config.span_id_key.clone(),
            span_context.span_id().to_string(),
        ));
    }

    attrs
}

#[cfg(not(feature = "otel"))]
pub(crate) fn span_attributes(_req: &ServiceRequest, _config: &Config) -> Vec<Attr> {
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_no_span_no_attributes() {
        let req = TestRequest::default().to_srv_request();

        let config = Config::default().with_trace_id(true).with_span_id(true);
        assert!(span_attributes(&req, &config).is_empty());

        assert!(span_attributes(&req, &Config::default()).is_empty());
    }

    #[cfg(feature = "otel")]
    #[test]
    fn test_remote_span_is_not_recording() {
        use opentelemetry::trace::{
            SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId, TraceState,
        };

        let span_context = SpanContext::new(
            TraceId::from_hex("4bf92f3577b34da6a3ce929d0e0e4736").unwrap(),
            SpanId::from_hex("00f067aa0ba902b7").unwrap(),
            TraceFlags::SAMPLED,
            true,
            TraceState::default(),
        );
        let req = TestRequest::default().to_srv_request();
        req.extensions_mut()
            .insert(opentelemetry::Context::new().with_remote_span_context(span_context));

        let config = Config::default().with_trace_id(true).with_span_id(true);
        assert!(span_attributes(&req, &config).is_empty());
    }

    #[cfg(feature = "otel")]
    mod recording {
        use super::*;
        use crate::attr::Value;
        use opentelemetry::trace::{
            Span, SpanContext, SpanId, Status, TraceContextExt, TraceFlags, TraceId, TraceState,
        };
        use opentelemetry::KeyValue;
        use std::borrow::Cow;
        use std::time::SystemTime;

        const TRACE_ID: &str = "4bf92f3577b34da6a3ce929d0e0e4736";
        const SPAN_ID: &str = "00f067aa0ba902b7";

        struct LiveSpan(SpanContext);

        impl Span for LiveSpan {
            fn add_event_with_timestamp<T>(&mut self, _: T, _: SystemTime, _: Vec<KeyValue>)
            where
                T: Into<Cow<'static, str>>,
            {
            }

            fn span_context(&self) -> &SpanContext {
                &self.0
            }

            fn is_recording(&self) -> bool {
                true
            }

            fn set_attribute(&mut self, _: KeyValue) {}

            fn set_status(&mut self, _: Status) {}

            fn update_name<T>(&mut self, _: T)
            where
                T: Into<Cow<'static, str>>,
            {
            }

            fn add_link(&mut self, _: SpanContext, _: Vec<KeyValue>) {}

            fn end_with_timestamp(&mut self, _: SystemTime) {}
        }

        fn traced_request() -> ServiceRequest {
            let span = LiveSpan(SpanContext::new(
                TraceId::from_hex(TRACE_ID).unwrap(),
                SpanId::from_hex(SPAN_ID).unwrap(),
                TraceFlags::SAMPLED,
                false,
                TraceState::default(),
            ));
            let req = TestRequest::default().to_srv_request();
            req.extensions_mut()
                .insert(opentelemetry::Context::new().with_span(span));
            req
        }

        fn keys(attrs: &[Attr]) -> Vec<&str> {
            attrs.iter().map(Attr::key).collect()
        }

        #[test]
        fn test_recording_span_ids_are_attached() {
            let req = traced_request();
            let config = Config::default()
                .with_trace_id(true)
                .with_span_id(true)
                .trace_id_key("tid")
                .span_id_key("sid");

            let attrs = span_attributes(&req, &config);
            assert_eq!(keys(&attrs), vec!["tid", "sid"]);
            assert_eq!(attrs[0].value().as_str(), Some(TRACE_ID));
            assert_eq!(attrs[1].value().as_str(), Some(SPAN_ID));
        }

        #[test]
        fn test_each_flag_gates_its_own_id() {
            let req = traced_request();

            let attrs = span_attributes(&req, &Config::default().with_trace_id(true));
            assert_eq!(attrs.len(), 1);
            assert_eq!(attrs[0].value(), &Value::from(TRACE_ID));

            let attrs = span_attributes(&req, &Config::default().with_span_id(true));
            assert_eq!(attrs.len(), 1);
            assert_eq!(attrs[0].value(), &Value::from(SPAN_ID));

            assert!(span_attributes(&req, &Config::default()).is_empty());
        }
    }
}
