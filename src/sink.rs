use std::{borrow::Cow, sync::Arc};

use log::Level;

use crate::attr::Attr;

/// Destination of the request records.
///
/// Implementations must be safe to call from every worker thread at once.
pub trait LogSink: Send + Sync + 'static {
    fn log(&self, level: Level, message: &str, attrs: &[Attr]);
}

impl<T: LogSink + ?Sized> LogSink for Arc<T> {
    fn log(&self, level: Level, message: &str, attrs: &[Attr]) {
        (**self).log(level, message, attrs)
    }
}

impl<T: LogSink + ?Sized> LogSink for Box<T> {
    fn log(&self, level: Level, message: &str, attrs: &[Attr]) {
        (**self).log(level, message, attrs)
    }
}

/// Sink writing through the `log` facade.
///
/// Every attribute becomes a structured key/value of the record, groups are
/// passed as serde maps, so a structured backend such as `structured-logger`
/// renders them as nested objects.
#[derive(Debug, Clone)]
pub struct LogCrate {
    target: Cow<'static, str>,
}

impl LogCrate {
    /// Sets the logging target to `target`.
    ///
    /// By default, the log target is `actix_web_middleware_reqlog::logger`.
    ///
    /// # Examples
    /// Using `.with_target("http_access")` would have this effect on request logs:
    /// ```diff
    /// - {"level":"INFO","message":"Incoming request","target":"actix_web_middleware_reqlog::logger",...}
    /// + {"level":"INFO","message":"Incoming request","target":"http_access",...}
    /// ```
    pub fn with_target(target: impl Into<Cow<'static, str>>) -> Self {
        LogCrate {
            target: target.into(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

impl Default for LogCrate {
    fn default() -> Self {
        LogCrate {
            target: Cow::Borrowed("actix_web_middleware_reqlog::logger"),
        }
    }
}

impl LogSink for LogCrate {
    fn log(&self, level: Level, message: &str, attrs: &[Attr]) {
        if level > log::max_level() {
            return;
        }

        let kvs: Vec<(&str, log::kv::Value)> = attrs
            .iter()
            .map(|attr| (attr.key(), log::kv::Value::from_serde(attr.value())))
            .collect();
        let kvs = kvs.as_slice();

        log::logger().log(
            &log::Record::builder()
                .args(format_args!("{message}"))
                .level(level)
                .target(&self.target)
                .module_path_static(Some(module_path!()))
                .key_values(&kvs)
                .build(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Collect(Mutex<Vec<(Level, String, usize)>>);

    impl LogSink for Collect {
        fn log(&self, level: Level, message: &str, attrs: &[Attr]) {
            self.0
                .lock()
                .unwrap()
                .push((level, message.to_owned(), attrs.len()));
        }
    }

    #[test]
    fn test_log_crate_target() {
        assert_eq!(
            LogCrate::default().target(),
            "actix_web_middleware_reqlog::logger"
        );
        assert_eq!(LogCrate::with_target("http_access").target(), "http_access");
    }

    #[test]
    fn test_log_crate_without_logger_installed() {
        LogCrate::default().log(
            Level::Error,
            "Incoming request",
            &[Attr::group("request", vec![Attr::new("method", "GET")])],
        );
    }

    #[test]
    fn test_shared_sinks_forward() {
        let collect = Arc::new(Collect::default());
        let boxed: Box<dyn LogSink> = Box::new(Arc::clone(&collect));

        boxed.log(Level::Warn, "Not Found", &[Attr::new("id", "1")]);
        Arc::clone(&collect).log(Level::Info, "Incoming request", &[]);

        let records = collect.0.lock().unwrap();
        assert_eq!(records[0], (Level::Warn, "Not Found".to_owned(), 1));
        assert_eq!(records[1], (Level::Info, "Incoming request".to_owned(), 0));
    }
}
