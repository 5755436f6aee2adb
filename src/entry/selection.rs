//! Exclusive host context selection
//!
//! A [`ContextSelection`] can only be built from exactly one eligible
//! context; holding one is proof that no other context's entry point may run.

use super::context::{HostContext, Platform};
use crate::error::{BridgeError, Result};

/// Context compiled into this build by the `*-extension` cargo features
#[cfg(host_context = "app-extension")]
pub const BUILD_HOST_CONTEXT: HostContext = HostContext::AppExtension;
/// Context compiled into this build by the `*-extension` cargo features
#[cfg(host_context = "watch-extension")]
pub const BUILD_HOST_CONTEXT: HostContext = HostContext::WatchExtension;
/// Context compiled into this build by the `*-extension` cargo features
#[cfg(host_context = "tv-extension")]
pub const BUILD_HOST_CONTEXT: HostContext = HostContext::TVExtension;
/// Context compiled into this build by the `*-extension` cargo features
#[cfg(host_context = "mac-extension")]
pub const BUILD_HOST_CONTEXT: HostContext = HostContext::MacExtension;
/// Context compiled into this build by the `*-extension` cargo features
#[cfg(not(any(
    host_context = "app-extension",
    host_context = "watch-extension",
    host_context = "tv-extension",
    host_context = "mac-extension"
)))]
pub const BUILD_HOST_CONTEXT: HostContext = HostContext::StandaloneApp;

/// The single active host context of this process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextSelection {
    context: HostContext,
}

impl ContextSelection {
    /// Selection fixed at build time
    pub const fn from_build() -> Self {
        Self {
            context: BUILD_HOST_CONTEXT,
        }
    }

    /// Build a selection from every context the configuration declared
    /// eligible
    ///
    /// Duplicates of the same context collapse; two distinct contexts are a
    /// configuration error, as is an empty set.
    pub fn exclusive<I>(eligible: I) -> Result<Self>
    where
        I: IntoIterator<Item = HostContext>,
    {
        let mut selected: Option<HostContext> = None;

        for ctx in eligible {
            match selected {
                None => selected = Some(ctx),
                Some(first) if first == ctx => {}
                Some(first) => {
                    return Err(BridgeError::ConflictingHostContexts { first, second: ctx });
                }
            }
        }

        selected
            .map(|context| Self { context })
            .ok_or(BridgeError::NoHostContext)
    }

    /// Same as [`exclusive`](Self::exclusive), additionally checking the
    /// platform
    pub fn exclusive_on<I>(eligible: I, platform: Platform) -> Result<Self>
    where
        I: IntoIterator<Item = HostContext>,
    {
        let selection = Self::exclusive(eligible)?;
        selection.context.validate_for(platform)?;
        Ok(selection)
    }

    /// The active context
    #[inline]
    pub const fn context(&self) -> HostContext {
        self.context
    }
}
