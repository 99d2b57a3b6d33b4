//! Log capture for assertions on tracing output.
//!
//! [`capture_logs`] installs a capturing subscriber for the current thread
//! only, so parallel tests do not see each other's events.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// A captured log event.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: Level,
    pub target: String,
    pub message: String,
    pub fields: Vec<(String, String)>,
}

impl LogEntry {
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Events captured while a closure ran.
#[derive(Debug, Default, Clone)]
pub struct CapturedLogs {
    entries: Vec<LogEntry>,
}

impl CapturedLogs {
    #[must_use]
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    #[must_use]
    pub fn contains(&self, level: Level, message: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.level == level && e.message.contains(message))
    }

    #[must_use]
    pub fn at_level(&self, level: Level) -> Vec<&LogEntry> {
        self.entries.iter().filter(|e| e.level == level).collect()
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|e| e.level == Level::ERROR)
    }

    /// One line per event, for assertion failure output.
    #[must_use]
    pub fn render(&self) -> String {
        if self.entries.is_empty() {
            return String::from("No logs captured");
        }
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&format!("[{}] {}: {}", entry.level, entry.target, entry.message));
            for (key, value) in &entry.fields {
                out.push_str(&format!(" {key}={value}"));
            }
            out.push('\n');
        }
        out
    }
}

/// Layer that records every event it sees.
pub struct CaptureLayer {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl<S> tracing_subscriber::Layer<S> for CaptureLayer
where
    S: tracing::Subscriber,
{
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        struct Visitor<'a> {
            message: &'a mut String,
            fields: &'a mut Vec<(String, String)>,
        }

        impl tracing::field::Visit for Visitor<'_> {
            fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
                if field.name() == "message" {
                    *self.message = value.to_string();
                } else {
                    self.fields.push((field.name().to_string(), value.to_string()));
                }
            }

            fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
                let rendered = format!("{value:?}");
                if field.name() == "message" {
                    *self.message = rendered;
                } else {
                    self.fields.push((field.name().to_string(), rendered));
                }
            }
        }

        let metadata = event.metadata();
        let mut message = String::new();
        let mut fields = Vec::new();
        event.record(&mut Visitor {
            message: &mut message,
            fields: &mut fields,
        });
        self.entries.lock().push(LogEntry {
            level: *metadata.level(),
            target: metadata.target().to_string(),
            message,
            fields,
        });
    }
}

/// Run `f` with a thread-local capturing subscriber at `level` and return
/// its result together with the captured events.
pub fn capture_logs<T>(level: &str, f: impl FnOnce() -> T) -> (T, CapturedLogs) {
    let entries = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::new(level))
        .with(CaptureLayer {
            entries: Arc::clone(&entries),
        });
    let value = tracing::subscriber::with_default(subscriber, f);
    let entries = std::mem::take(&mut *entries.lock());
    (value, CapturedLogs { entries })
}
