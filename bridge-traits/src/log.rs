//! Host log forwarding.
//!
//! The runtime's tracing layer turns every event that passes the host's
//! threshold into a [`LogEntry`] and hands it to a [`LoggerSink`]. Values of
//! secret-looking fields and API keys embedded in URLs are already redacted at
//! that point.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// One forwarded tracing event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub timestamp: DateTime<Utc>,
    /// Module path of the emitting code, e.g. `core_download::orchestrator`
    pub target: String,
    pub message: String,
    /// Event fields in key order (`item_id`, `error`, ...)
    pub fields: BTreeMap<String, String>,
    /// Name of the innermost span, when the event was emitted inside one
    pub span: Option<String>,
}

impl LogEntry {
    pub fn new(level: LogLevel, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            timestamp: Utc::now(),
            target: target.into(),
            message: message.into(),
            fields: BTreeMap::new(),
            span: None,
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Queue item the entry refers to, if it carries one.
    pub fn item_id(&self) -> Option<&str> {
        self.fields.get("item_id").map(String::as_str)
    }
}

/// Receives structured logs from the core: a console, a log file, or the
/// host's own logging pipeline.
///
/// ```ignore
/// use bridge_traits::log::{LogEntry, LogLevel, LoggerSink};
///
/// async fn report(sink: &dyn LoggerSink) {
///     let entry = LogEntry::new(LogLevel::Error, "core_download", "Download failed")
///         .with_field("item_id", "song-42");
///     sink.log(entry).await.ok();
/// }
/// ```
#[async_trait::async_trait]
pub trait LoggerSink: Send + Sync {
    async fn log(&self, entry: LogEntry) -> Result<()>;

    /// Entries below this level are never built. Default: `Info`
    fn min_level(&self) -> LogLevel {
        LogLevel::Info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_exposes_item_id() {
        let entry = LogEntry::new(LogLevel::Warn, "core_metadata::race", "provider failed")
            .with_field("provider", "lrclib")
            .with_field("item_id", "song-7");

        assert_eq!(entry.item_id(), Some("song-7"));
        assert_eq!(
            entry.fields.keys().collect::<Vec<_>>(),
            vec!["item_id", "provider"]
        );
        assert!(LogEntry::new(LogLevel::Info, "t", "m").item_id().is_none());
    }

    #[test]
    fn test_levels_order_and_names() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Warn < LogLevel::Error);
        assert_eq!(LogLevel::Warn.as_str(), "warn");
        assert_eq!(serde_json::to_string(&LogLevel::Error).unwrap(), "\"error\"");
    }
}
