//! Diagnostic macros

/// Emit a bridge diagnostic through a [`Logger`](crate::logging::Logger)
///
/// Arguments are only formatted when the logger is enabled.
///
/// ```
/// use hostbridge::logging::Logger;
///
/// let logger = Logger::new(1);
/// hostbridge::bridge_log!(logger, "opened assembly {}", "CoreLib");
/// ```
#[macro_export]
macro_rules! bridge_log {
    ($logger:expr, $($arg:tt)+) => {{
        let logger = &$logger;
        if logger.enabled() {
            logger.emit(format_args!($($arg)+));
        }
    }};
}
