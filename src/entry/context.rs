//! Host contexts and the platforms they run on

use crate::error::{BridgeError, Result};
use core::fmt;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Extension point identifier of watch app extensions
pub const WATCHKIT_EXTENSION_POINT: &str = "com.apple.watchkit";
/// Extension point identifier of TV services extensions
pub const TV_SERVICES_EXTENSION_POINT: &str = "com.apple.tv-services";

/// Kind of container the process runs inside
///
/// Exactly one context is active per process and it never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostContext {
    StandaloneApp,
    AppExtension,
    WatchExtension,
    #[serde(rename = "tv-extension")]
    TVExtension,
    MacExtension,
}

impl HostContext {
    /// All contexts, in dispatch table order
    pub const ALL: [HostContext; 5] = [
        Self::StandaloneApp,
        Self::AppExtension,
        Self::WatchExtension,
        Self::TVExtension,
        Self::MacExtension,
    ];

    /// Native entry function that receives control in this context
    pub const fn entry_symbol(self) -> &'static str {
        match self {
            Self::StandaloneApp => "xamarin_main",
            Self::AppExtension => "NSExtensionMain",
            // WatchKit.framework supplies its own main
            Self::WatchExtension => "main",
            Self::TVExtension => "TVExtensionMain",
            Self::MacExtension => "xamarin_mac_extension_main",
        }
    }

    /// Static archive providing the launcher for this context
    pub const fn main_library(self) -> &'static str {
        match self {
            Self::StandaloneApp => "libapp.a",
            Self::AppExtension | Self::MacExtension => "libextension.a",
            Self::WatchExtension => "libwatchextension.a",
            Self::TVExtension => "libtvextension.a",
        }
    }

    /// Linker entry point override, when the context needs one
    pub const fn linker_entry_override(self) -> Option<&'static str> {
        match self {
            Self::WatchExtension => Some("_xamarin_watchextension_main"),
            _ => None,
        }
    }

    /// Whether the host executable defines a symbol of the same name as the
    /// entry, so the entry must come from a framework
    #[inline]
    pub const fn entry_shadowed_by_host(self) -> bool {
        matches!(self, Self::WatchExtension)
    }

    /// Whether this context is an extension hosted by another process
    #[inline]
    pub const fn is_extension(self) -> bool {
        !matches!(self, Self::StandaloneApp)
    }

    /// Stable kebab-case name, as used in configuration files
    pub const fn name(self) -> &'static str {
        match self {
            Self::StandaloneApp => "standalone-app",
            Self::AppExtension => "app-extension",
            Self::WatchExtension => "watch-extension",
            Self::TVExtension => "tv-extension",
            Self::MacExtension => "mac-extension",
        }
    }

    /// Derive the context from an extension point identifier
    ///
    /// No identifier means the process is a standalone app.
    pub fn from_extension_point(identifier: Option<&str>, platform: Platform) -> Self {
        match identifier {
            None => Self::StandaloneApp,
            Some(WATCHKIT_EXTENSION_POINT) => Self::WatchExtension,
            Some(TV_SERVICES_EXTENSION_POINT) => Self::TVExtension,
            Some(_) if platform == Platform::MacOS => Self::MacExtension,
            Some(_) => Self::AppExtension,
        }
    }

    /// Check that this context can run on `platform`
    pub fn validate_for(self, platform: Platform) -> Result<()> {
        let supported = match self {
            // watchOS apps only exist as extensions
            Self::StandaloneApp => platform != Platform::WatchOS,
            Self::AppExtension => matches!(platform, Platform::IOS | Platform::WatchOS | Platform::TvOS),
            Self::WatchExtension => matches!(platform, Platform::WatchOS | Platform::IOS),
            Self::TVExtension => platform == Platform::TvOS,
            Self::MacExtension => platform == Platform::MacOS,
        };

        if supported {
            Ok(())
        } else {
            Err(BridgeError::UnsupportedHostPlatform {
                context: self,
                platform,
            })
        }
    }
}

impl fmt::Display for HostContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HostContext {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|ctx| ctx.name() == s)
            .ok_or_else(|| BridgeError::InvalidConfig(format!("unknown host context '{}'", s)))
    }
}

/// Operating system family the host process runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    #[serde(rename = "ios")]
    IOS,
    #[serde(rename = "watchos")]
    WatchOS,
    #[serde(rename = "tvos")]
    TvOS,
    #[serde(rename = "macos")]
    MacOS,
}

impl Platform {
    /// Platform this crate was compiled for, falling back to iOS for
    /// non-Apple targets (simulated hosts)
    pub const fn current() -> Self {
        if cfg!(target_os = "watchos") {
            Self::WatchOS
        } else if cfg!(target_os = "tvos") {
            Self::TvOS
        } else if cfg!(target_os = "macos") {
            Self::MacOS
        } else {
            Self::IOS
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::current()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::IOS => "iOS",
            Self::WatchOS => "watchOS",
            Self::TvOS => "tvOS",
            Self::MacOS => "macOS",
        })
    }
}
