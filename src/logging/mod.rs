//! Logging infrastructure
//!
//! Two layers:
//! - [`init_logging`] installs the process-wide `tracing` subscriber once,
//!   at startup, from a [`LogConfig`].
//! - [`Logger`] is the bridge's own diagnostic capability. It is passed
//!   explicitly to the components that log and gates the [`bridge_log!`]
//!   macro on its verbosity level, so a disabled logger costs one compare.
//!
//! [`bridge_log!`]: crate::bridge_log

use core::fmt;
use once_cell::sync::OnceCell;
use tracing::Level;
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    fmt::{format::FmtSpan, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

mod launch;
mod macros;

pub use launch::LaunchTimer;

/// Target used for every event emitted through a [`Logger`]
pub const LOG_TARGET: &str = "hostbridge";

static SUBSCRIBER_INSTALLED: OnceCell<()> = OnceCell::new();

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable multi-line format
    Pretty,
    /// Single-line format
    Compact,
    /// Structured JSON lines
    Json,
}

/// Log output destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    Stderr,
    /// Daily rotated file
    File { directory: String, prefix: String },
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum level passed to the subscriber
    pub level: Level,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Emit span enter/close events
    pub span_events: bool,
    /// Extra filter directives, e.g. "hostbridge=trace"
    pub filter: Option<String>,
    /// Verbosity of the bridge diagnostics; 0 disables them
    pub bridge_level: u32,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Compact,
            output: LogOutput::Stderr,
            span_events: false,
            filter: None,
            bridge_level: 0,
        }
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply environment overrides on top of `self`
    ///
    /// - `HOSTBRIDGE_LOG_LEVEL`: trace, debug, info, warn, error
    /// - `HOSTBRIDGE_LOG_FORMAT`: pretty, compact, json
    /// - `HOSTBRIDGE_LOG_FILE`: directory for rotated log files
    /// - `HOSTBRIDGE_VERBOSE`: bridge diagnostic level (integer)
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(level) = std::env::var("HOSTBRIDGE_LOG_LEVEL")
            .ok()
            .and_then(|s| parse_level(&s))
        {
            self.level = level;
        }

        if let Some(format) = std::env::var("HOSTBRIDGE_LOG_FORMAT")
            .ok()
            .and_then(|s| parse_format(&s))
        {
            self.format = format;
        }

        if let Ok(directory) = std::env::var("HOSTBRIDGE_LOG_FILE") {
            self.output = LogOutput::File {
                directory,
                prefix: "hostbridge.log".to_string(),
            };
        }

        if let Some(verbosity) = std::env::var("HOSTBRIDGE_VERBOSE")
            .ok()
            .and_then(|s| s.trim().parse().ok())
        {
            self.bridge_level = verbosity;
        }

        self
    }

    /// Defaults plus environment overrides
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_bridge_level(mut self, level: u32) -> Self {
        self.bridge_level = level;
        self
    }

    /// Diagnostic capability matching this configuration
    pub fn logger(&self) -> Logger {
        Logger::new(self.bridge_level)
    }
}

/// Parse a level name, case-insensitively
pub fn parse_level(s: &str) -> Option<Level> {
    match s.trim().to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Parse a format name, case-insensitively
pub fn parse_format(s: &str) -> Option<LogFormat> {
    match s.trim().to_lowercase().as_str() {
        "pretty" => Some(LogFormat::Pretty),
        "compact" => Some(LogFormat::Compact),
        "json" => Some(LogFormat::Json),
        _ => None,
    }
}

/// Install the process-wide subscriber
///
/// Only the first call installs anything; later calls return `None`. The
/// returned guard flushes buffered events when dropped and must be kept
/// alive until the process exits.
pub fn init_logging(config: &LogConfig) -> Option<WorkerGuard> {
    let mut guard = None;

    SUBSCRIBER_INSTALLED.get_or_init(|| {
        let (writer, worker) = match &config.output {
            LogOutput::Stdout => tracing_appender::non_blocking(std::io::stdout()),
            LogOutput::Stderr => tracing_appender::non_blocking(std::io::stderr()),
            LogOutput::File { directory, prefix } => {
                tracing_appender::non_blocking(rolling::daily(directory, prefix))
            }
        };
        let writer = BoxMakeWriter::new(writer);
        let filter = build_filter(config);
        let spans = span_events_config(config.span_events);

        let layer = match config.format {
            LogFormat::Pretty => tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .pretty()
                .with_span_events(spans)
                .with_filter(filter)
                .boxed(),
            LogFormat::Compact => tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .compact()
                .with_span_events(spans)
                .with_filter(filter)
                .boxed(),
            LogFormat::Json => tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .json()
                .with_span_events(spans)
                .with_filter(filter)
                .boxed(),
        };

        // Another subscriber may already be installed by the host
        if tracing_subscriber::registry().with(layer).try_init().is_ok() {
            guard = Some(worker);
        }
    });

    guard
}

/// Whether [`init_logging`] has run
pub fn is_initialized() -> bool {
    SUBSCRIBER_INSTALLED.get().is_some()
}

fn build_filter(config: &LogConfig) -> EnvFilter {
    let base = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str().to_lowercase()));

    match &config.filter {
        Some(directives) => directives
            .split(',')
            .filter(|d| !d.trim().is_empty())
            .fold(base, |filter, directive| match directive.trim().parse() {
                Ok(d) => filter.add_directive(d),
                Err(_) => {
                    tracing::warn!("ignoring invalid filter directive: {}", directive);
                    filter
                }
            }),
        None => base,
    }
}

fn span_events_config(enabled: bool) -> FmtSpan {
    if enabled {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    }
}

/// Diagnostic logging capability
///
/// Cheap to copy. Components receive one at construction instead of reading a
/// process-wide level variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Logger {
    level: u32,
}

impl Logger {
    pub const fn new(level: u32) -> Self {
        Self { level }
    }

    /// Logger that never emits
    pub const fn disabled() -> Self {
        Self { level: 0 }
    }

    #[inline]
    pub const fn level(&self) -> u32 {
        self.level
    }

    /// Whether messages pass the threshold
    #[inline]
    pub const fn enabled(&self) -> bool {
        self.level > 0
    }

    /// Emit a pre-formatted message; callers go through [`bridge_log!`]
    ///
    /// [`bridge_log!`]: crate::bridge_log
    #[doc(hidden)]
    pub fn emit(&self, args: fmt::Arguments<'_>) {
        tracing::info!(target: LOG_TARGET, verbosity = self.level, "{}", args);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = LogConfig::default();
        assert_eq!(config.level, Level::INFO);
        assert_eq!(config.format, LogFormat::Compact);
        assert_eq!(config.output, LogOutput::Stderr);
        assert!(!config.logger().enabled());
    }

    #[test]
    fn test_builder() {
        let config = LogConfig::new()
            .with_level(Level::TRACE)
            .with_format(LogFormat::Json)
            .with_filter("hostbridge=trace")
            .with_bridge_level(2);

        assert_eq!(config.level, Level::TRACE);
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.filter.as_deref(), Some("hostbridge=trace"));
        assert_eq!(config.logger().level(), 2);
    }

    #[test]
    fn test_parse_level_and_format() {
        assert_eq!(parse_level("DEBUG"), Some(Level::DEBUG));
        assert_eq!(parse_level(" warn "), Some(Level::WARN));
        assert_eq!(parse_level("loud"), None);
        assert_eq!(parse_format("json"), Some(LogFormat::Json));
        assert_eq!(parse_format("xml"), None);
    }

    #[test]
    fn test_logger_threshold() {
        assert!(!Logger::disabled().enabled());
        assert!(!Logger::default().enabled());
        assert!(Logger::new(1).enabled());
    }

    #[test]
    fn test_disabled_logger_skips_formatting() {
        struct Explodes;
        impl fmt::Display for Explodes {
            fn fmt(&self, _: &mut fmt::Formatter<'_>) -> fmt::Result {
                panic!("formatted while disabled");
            }
        }

        let logger = Logger::disabled();
        crate::bridge_log!(logger, "{}", Explodes);
    }

    #[test]
    fn test_init_idempotent() {
        let config = LogConfig::default();
        let _first = init_logging(&config);
        let second = init_logging(&config);
        assert!(second.is_none());
        assert!(is_initialized());
    }
}
