//! Structured logging for the download core.
//!
//! [`init_logging`] installs a global `tracing` subscriber made of three
//! layers: an [`EnvFilter`], an optional forwarder to the host's
//! [`LoggerSink`], and a console formatter (pretty, compact or JSON).
//!
//! Each pipeline run opens a span carrying its `item_id`, and the forwarder
//! copies the innermost span name into [`LogEntry::span`]. Values bound for
//! the sink are scrubbed of secrets: fields named like credentials are
//! replaced wholesale, and `apikey`/`token` query parameters inside URLs are
//! masked.
//!
//! ```ignore
//! use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
//! use bridge_traits::log::LogLevel;
//!
//! init_logging(
//!     LoggingConfig::default()
//!         .with_format(LogFormat::Json)
//!         .with_level(LogLevel::Debug),
//! )?;
//! ```

use std::fmt;
use std::sync::Arc;

use bridge_traits::log::{LogEntry, LogLevel, LoggerSink};
use core_async::runtime;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use crate::error::{Error, Result};

/// Crates that log at the configured level when no custom filter is given.
const WORKSPACE_TARGETS: &[&str] = &[
    "tunevault_workspace",
    "core_runtime",
    "core_library",
    "core_metadata",
    "core_download",
    "core_service",
    "bridge_desktop",
];

/// Chatty dependencies, capped at `warn`.
const DEPENDENCY_TARGETS: &[&str] = &["h2", "hyper", "hyper_util", "reqwest", "sqlx"];

const SECRET_FIELDS: &[&str] = &["token", "password", "secret", "api_key", "apikey", "authorization"];

const SECRET_QUERY_PARAMS: &[&str] = &["apikey", "api_key", "key", "token", "access_token"];

const REDACTED: &str = "[REDACTED]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, colored; the debug-build default
    Pretty,
    /// One line per event
    Compact,
    /// Flattened JSON objects; the release-build default
    Json,
}

impl Default for LogFormat {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Level applied to workspace crates by the default filter
    pub level: LogLevel,
    /// Full `EnvFilter` directive string, replacing the default filter
    pub filter: Option<String>,
    pub logger_sink: Option<Arc<dyn LoggerSink>>,
    /// Scrub secrets from values forwarded to the sink
    pub redact: bool,
    /// Print span open/close lines on the console
    pub spans: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            filter: None,
            logger_sink: None,
            redact: true,
            spans: false,
        }
    }
}

impl fmt::Debug for LoggingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingConfig")
            .field("format", &self.format)
            .field("level", &self.level)
            .field("filter", &self.filter)
            .field("logger_sink", &self.logger_sink.is_some())
            .field("redact", &self.redact)
            .field("spans", &self.spans)
            .finish()
    }
}

impl LoggingConfig {
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    pub fn with_redaction(mut self, redact: bool) -> Self {
        self.redact = redact;
        self
    }

    pub fn with_spans(mut self, spans: bool) -> Self {
        self.spans = spans;
        self
    }

    fn filter_directives(&self) -> String {
        if let Some(custom) = &self.filter {
            return custom.clone();
        }
        let level = self.level.as_str();
        WORKSPACE_TARGETS
            .iter()
            .map(|target| format!("{target}={level}"))
            .chain(DEPENDENCY_TARGETS.iter().map(|target| format!("{target}=warn")))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Install the global subscriber.
///
/// Only the first call in a process succeeds; later calls and malformed
/// filters return [`Error::Config`].
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_new(config.filter_directives())
        .map_err(|e| Error::Config(format!("Invalid log filter: {}", e)))?;

    let span_events = if config.spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let console = match config.format {
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_span_events(span_events)
            .boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .with_span_events(span_events)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
    };

    let forwarder = config
        .logger_sink
        .map(|sink| SinkForwarder::new(sink, config.redact));

    tracing_subscriber::registry()
        .with(filter)
        .with(forwarder)
        .with(console)
        .try_init()
        .map_err(|e| Error::Config(format!("Logging already initialized: {}", e)))
}

/// Converts tracing events into [`LogEntry`] values for a host sink.
struct SinkForwarder {
    sink: Arc<dyn LoggerSink>,
    redact: bool,
}

impl SinkForwarder {
    fn new(sink: Arc<dyn LoggerSink>, redact: bool) -> Self {
        Self { sink, redact }
    }

    fn scrub(&self, key: &str, value: String) -> String {
        if !self.redact {
            value
        } else if is_secret_field(key) {
            REDACTED.to_string()
        } else {
            redact_url_secrets(&value)
        }
    }

    fn deliver(&self, entry: LogEntry) {
        let sink = Arc::clone(&self.sink);
        match runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = sink.log(entry).await {
                        eprintln!("log sink rejected entry: {}", err);
                    }
                });
            }
            Err(_) => match runtime::block_on(async move { sink.log(entry).await }) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => eprintln!("log sink rejected entry: {}", err),
                Err(err) => eprintln!("log sink unavailable: {}", err),
            },
        }
    }
}

impl<S> Layer<S> for SinkForwarder
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let level = match *metadata.level() {
            tracing::Level::TRACE => LogLevel::Trace,
            tracing::Level::DEBUG => LogLevel::Debug,
            tracing::Level::INFO => LogLevel::Info,
            tracing::Level::WARN => LogLevel::Warn,
            tracing::Level::ERROR => LogLevel::Error,
        };
        if level < self.sink.min_level() {
            return;
        }

        let mut fields = FieldCollector::default();
        event.record(&mut fields);

        let message = fields
            .message
            .take()
            .unwrap_or_else(|| metadata.name().to_string());
        let mut entry = LogEntry::new(level, metadata.target(), self.scrub("message", message));
        for (key, value) in fields.values {
            let value = self.scrub(key, value);
            entry = entry.with_field(key, value);
        }
        entry.span = ctx.event_span(event).map(|span| span.name().to_string());

        self.deliver(entry);
    }
}

#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    values: Vec<(&'static str, String)>,
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.push(field, format!("{:?}", value));
    }
}

impl FieldCollector {
    fn push(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = Some(value),
            name => self.values.push((name, value)),
        }
    }
}

fn is_secret_field(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    SECRET_FIELDS.iter().any(|secret| name.contains(secret))
}

/// Field value as it may leave the process: `[REDACTED]` when the field name
/// looks like a credential, the value with URL secrets masked otherwise.
pub fn redact_if_sensitive(field_name: &str, value: &str) -> String {
    if is_secret_field(field_name) {
        REDACTED.to_string()
    } else {
        redact_url_secrets(value)
    }
}

/// Mask credential query parameters in every URL found in `text`.
///
/// ```ignore
/// use core_runtime::logging::redact_url_secrets;
///
/// let url = "https://api.musixmatch.com/ws/1.1/track.search?q_track=Blue&apikey=abc";
/// assert_eq!(
///     redact_url_secrets(url),
///     "https://api.musixmatch.com/ws/1.1/track.search?q_track=Blue&apikey=[REDACTED]"
/// );
/// ```
pub fn redact_url_secrets(text: &str) -> String {
    if !text.contains('?') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find(|c: char| c == '?' || c == '&') {
        out.push_str(&rest[..=pos]);
        rest = &rest[pos + 1..];

        let Some(eq) = rest.find('=') else { break };
        let name = &rest[..eq];
        if name.is_empty() || name.contains(|c: char| c.is_whitespace() || c == '&' || c == '?') {
            continue;
        }
        let value_end = rest[eq + 1..]
            .find(|c: char| c == '&' || c == '#' || c.is_whitespace() || c == '"' || c == ')')
            .map_or(rest.len(), |end| eq + 1 + end);

        out.push_str(&rest[..=eq]);
        if SECRET_QUERY_PARAMS.contains(&name.to_ascii_lowercase().as_str()) {
            out.push_str(REDACTED);
        } else {
            out.push_str(&rest[eq + 1..value_end]);
        }
        rest = &rest[value_end..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as SinkResult;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemorySink {
        entries: Mutex<Vec<LogEntry>>,
    }

    #[async_trait]
    impl LoggerSink for MemorySink {
        async fn log(&self, entry: LogEntry) -> SinkResult<()> {
            self.entries.lock().unwrap().push(entry);
            Ok(())
        }

        fn min_level(&self) -> LogLevel {
            LogLevel::Debug
        }
    }

    fn capture(redact: bool, emit: impl FnOnce()) -> Vec<LogEntry> {
        let sink = Arc::new(MemorySink::default());
        let forwarder = SinkForwarder::new(sink.clone(), redact);
        let subscriber = tracing_subscriber::registry().with(forwarder);
        tracing::subscriber::with_default(subscriber, emit);
        let entries = sink.entries.lock().unwrap().clone();
        entries
    }

    #[test]
    fn test_default_filter_pins_dependencies() {
        let directives = LoggingConfig::default()
            .with_level(LogLevel::Debug)
            .filter_directives();

        assert!(directives.contains("core_download=debug"));
        assert!(directives.contains("core_metadata=debug"));
        assert!(directives.contains("reqwest=warn"));
        assert!(EnvFilter::try_new(directives).is_ok());
    }

    #[test]
    fn test_custom_filter_replaces_default() {
        let config = LoggingConfig::default().with_filter("core_download=trace");
        assert_eq!(config.filter_directives(), "core_download=trace");
    }

    #[test]
    fn test_forwarder_copies_fields_and_span() {
        let entries = capture(true, || {
            let span = tracing::info_span!("download_item", item_id = "song-9");
            let _entered = span.enter();
            tracing::info!(target: "core_download::manager", item_id = "song-9", bytes = 42u64, "Audio staged");
            tracing::trace!("dropped by sink threshold");
        });

        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.target, "core_download::manager");
        assert_eq!(entry.message, "Audio staged");
        assert_eq!(entry.item_id(), Some("song-9"));
        assert_eq!(entry.fields.get("bytes").map(String::as_str), Some("42"));
        assert_eq!(entry.span.as_deref(), Some("download_item"));
    }

    #[test]
    fn test_forwarder_scrubs_secrets() {
        let entries = capture(true, || {
            tracing::warn!(
                apikey = "hunter2",
                error = "error sending request for url (https://api.test/search?q=x&apikey=hunter2)",
                "Provider failed"
            );
        });

        let fields = &entries[0].fields;
        assert_eq!(fields.get("apikey").map(String::as_str), Some(REDACTED));
        let error = &fields["error"];
        assert!(!error.contains("hunter2"));
        assert!(error.contains("q=x&apikey=[REDACTED])"));
    }

    #[test]
    fn test_forwarder_can_skip_redaction() {
        let entries = capture(false, || tracing::info!(token = "t0k", "raw"));
        assert_eq!(entries[0].fields.get("token").map(String::as_str), Some("t0k"));
    }

    #[test]
    fn test_redact_url_secrets() {
        assert_eq!(
            redact_url_secrets("https://a.test/x?apikey=abc&page=2"),
            "https://a.test/x?apikey=[REDACTED]&page=2"
        );
        assert_eq!(
            redact_url_secrets("https://a.test/x?q=sea&sky&token=t#frag"),
            "https://a.test/x?q=sea&sky&token=[REDACTED]#frag"
        );
        assert_eq!(redact_url_secrets("no query here"), "no query here");
        assert_eq!(redact_url_secrets("what? really"), "what? really");
    }

    #[test]
    fn test_redact_if_sensitive() {
        assert_eq!(redact_if_sensitive("musixmatch_api_key", "k"), REDACTED);
        assert_eq!(redact_if_sensitive("item_id", "song-1"), "song-1");
        assert_eq!(
            redact_if_sensitive("url", "https://a.test/?key=1"),
            "https://a.test/?key=[REDACTED]"
        );
    }

    #[test]
    fn test_default_format_follows_build_profile() {
        let expected = if cfg!(debug_assertions) {
            LogFormat::Pretty
        } else {
            LogFormat::Json
        };
        assert_eq!(LogFormat::default(), expected);
    }
}
