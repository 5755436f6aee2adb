//! Error types for the bridge
//!
//! Every failure the bridge can report falls in one of three categories:
//! configuration problems detected before managed code runs, unsupported
//! conversions at the managed/native boundary, and assembly resolution misses.
//! The first two are fatal, the last is reported to the caller.

use crate::entry::{HostContext, Platform};
use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Broad classification of a [`BridgeError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Startup configuration is unusable; the process cannot continue
    Configuration,
    /// A managed value could not be converted; signals version skew between
    /// the bridge and the managed runtime
    UnsupportedType,
    /// A named assembly could not be found; recoverable by the caller
    ResolutionMiss,
}

/// Errors reported by the entry dispatcher, the marshaling engine and the
/// assembly resolver
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("conflicting host contexts: {first} and {second} are both eligible")]
    ConflictingHostContexts {
        first: HostContext,
        second: HostContext,
    },

    #[error("no host context is eligible for this process")]
    NoHostContext,

    #[error("entry symbol '{symbol}' required by {context} is unavailable")]
    MissingEntrySymbol {
        context: HostContext,
        symbol: &'static str,
    },

    #[error("entry symbol '{symbol}' required by {context} resolves to the bridge's own process entry")]
    EntryIsBridge {
        context: HostContext,
        symbol: &'static str,
    },

    #[error("{context} is not supported on {platform}")]
    UnsupportedHostPlatform {
        context: HostContext,
        platform: Platform,
    },

    #[error("invalid host configuration: {0}")]
    InvalidConfig(String),

    #[error("argument {index} contains an interior NUL byte")]
    InvalidArgument { index: usize },

    #[error("failed to read configuration: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("unsupported managed type category '{category}' for {type_name}")]
    UnsupportedType { type_name: String, category: String },

    #[error("invalid native type encoding '{0}'")]
    InvalidTypeHint(String),

    #[error("native type '{hint}' does not fit managed type {type_name}")]
    HintMismatch { type_name: String, hint: String },

    #[error("managed value does not match {type_name}: {reason}")]
    ValueMismatch { type_name: String, reason: String },

    #[error("value {value} of {type_name} does not fit native type '{hint}'")]
    ValueOutOfRange {
        type_name: String,
        hint: String,
        value: i128,
    },

    #[error("assembly '{0}' not found")]
    AssemblyNotFound(String),
}

impl BridgeError {
    /// Category of this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ConflictingHostContexts { .. }
            | Self::NoHostContext
            | Self::MissingEntrySymbol { .. }
            | Self::EntryIsBridge { .. }
            | Self::UnsupportedHostPlatform { .. }
            | Self::InvalidConfig(_)
            | Self::InvalidArgument { .. }
            | Self::ConfigIo(_)
            | Self::ConfigParse(_) => ErrorCategory::Configuration,

            Self::UnsupportedType { .. }
            | Self::InvalidTypeHint(_)
            | Self::HintMismatch { .. }
            | Self::ValueMismatch { .. }
            | Self::ValueOutOfRange { .. } => ErrorCategory::UnsupportedType,

            Self::AssemblyNotFound(_) => ErrorCategory::ResolutionMiss,
        }
    }

    /// Whether this error must terminate the process
    #[inline]
    pub fn is_fatal(&self) -> bool {
        self.category() != ErrorCategory::ResolutionMiss
    }

    pub(crate) fn value_mismatch(type_name: &str, reason: impl Into<String>) -> Self {
        Self::ValueMismatch {
            type_name: type_name.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn hint_mismatch(type_name: &str, hint: &str) -> Self {
        Self::HintMismatch {
            type_name: type_name.to_string(),
            hint: hint.to_string(),
        }
    }
}

/// Report a fatal error and terminate the process
///
/// Used at the outermost layer (process entry, C ABI) where there is no
/// caller left to hand the error to.
#[cold]
pub fn fatal(err: &BridgeError) -> ! {
    report_fatal(err);
    std::process::exit(1);
}

/// Log `err` as fatal and echo it to stderr, without exiting
///
/// For callers that must flush their log writer between the report and the
/// exit.
#[cold]
pub fn report_fatal(err: &BridgeError) {
    tracing::error!(
        event = "fatal",
        category = ?err.category(),
        error = %err,
        "hostbridge cannot continue"
    );
    eprintln!("hostbridge: fatal error: {}", err);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        let err = BridgeError::ConflictingHostContexts {
            first: HostContext::AppExtension,
            second: HostContext::WatchExtension,
        };
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert!(err.is_fatal());

        let err = BridgeError::UnsupportedType {
            type_name: "Foo".into(),
            category: "0x7f".into(),
        };
        assert_eq!(err.category(), ErrorCategory::UnsupportedType);
        assert!(err.is_fatal());

        let err = BridgeError::AssemblyNotFound("CoreLib".into());
        assert_eq!(err.category(), ErrorCategory::ResolutionMiss);
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_fatal_report_returns_to_caller() {
        // The launcher drops its log guard after this and only then exits
        report_fatal(&BridgeError::NoHostContext);
        report_fatal(&BridgeError::AssemblyNotFound("CoreLib".into()));
    }

    #[test]
    fn test_messages_name_the_subject() {
        let err = BridgeError::MissingEntrySymbol {
            context: HostContext::TVExtension,
            symbol: "TVExtensionMain",
        };
        let msg = err.to_string();
        assert!(msg.contains("TVExtensionMain"));
        assert!(msg.contains("tv-extension"));

        let err = BridgeError::AssemblyNotFound("CoreLib".into());
        assert_eq!(err.to_string(), "assembly 'CoreLib' not found");
    }
}
