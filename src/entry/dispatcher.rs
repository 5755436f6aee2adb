//! Entry dispatch
//!
//! [`EntryDispatcher`] is the unselected state; resolving its entry symbol
//! yields a [`DispatchedEntry`], after which control can only go to that one
//! function. A failed resolution consumes the dispatcher: there is no retry
//! and no fallback to another context.

use super::context::HostContext;
use super::selection::ContextSelection;
use super::symbols::{NativeMain, SymbolSource};
use crate::error::{BridgeError, Result};
use crate::logging::Logger;
use core::ffi::{c_char, c_int};
use core::fmt;
use std::ffi::CString;
use tracing::{debug, info};

/// Exit status returned by a native entry function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExitStatus(i32);

impl ExitStatus {
    pub const SUCCESS: Self = Self(0);
    pub const FAILURE: Self = Self(1);

    #[inline]
    pub const fn from_code(code: i32) -> Self {
        Self(code)
    }

    #[inline]
    pub const fn code(self) -> i32 {
        self.0
    }

    #[inline]
    pub const fn success(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "exit status {}", self.0)
    }
}

/// Dispatcher for a selected context whose entry function is not yet resolved
#[derive(Debug)]
pub struct EntryDispatcher {
    selection: ContextSelection,
    logger: Logger,
}

impl EntryDispatcher {
    pub fn new(selection: ContextSelection, logger: Logger) -> Self {
        Self { selection, logger }
    }

    #[inline]
    pub fn context(&self) -> HostContext {
        self.selection.context()
    }

    /// Resolve the active context's entry function
    ///
    /// Only the active context's symbol is ever looked up, and it never
    /// resolves to one of the bridge's own process entries.
    pub fn resolve<S>(self, symbols: &S) -> Result<DispatchedEntry>
    where
        S: SymbolSource + ?Sized,
    {
        let context = self.selection.context();
        let symbol = context.entry_symbol();

        debug!(event = "entry_lookup", context = %context, symbol);

        let found = if context.entry_shadowed_by_host() {
            symbols.lookup_framework(symbol)
        } else {
            symbols.lookup(symbol)
        };
        let entry = found.ok_or(BridgeError::MissingEntrySymbol { context, symbol })?;

        // The bridge must never dispatch to itself
        if crate::ffi::is_bridge_entry(entry) {
            return Err(BridgeError::EntryIsBridge { context, symbol });
        }

        crate::bridge_log!(self.logger, "dispatching {} through {}", context, symbol);

        Ok(DispatchedEntry {
            context,
            symbol,
            entry,
            logger: self.logger,
        })
    }
}

/// Entry function committed to for this process
pub struct DispatchedEntry {
    context: HostContext,
    symbol: &'static str,
    entry: NativeMain,
    logger: Logger,
}

impl DispatchedEntry {
    #[inline]
    pub fn context(&self) -> HostContext {
        self.context
    }

    #[inline]
    pub fn symbol(&self) -> &'static str {
        self.symbol
    }

    /// Transfer control to the entry function with `args` as argv
    ///
    /// Returns once the entry function returns. Fails only if an argument
    /// cannot be represented as a C string, in which case the entry function
    /// is never called.
    pub fn run<I, A>(self, args: I) -> Result<ExitStatus>
    where
        I: IntoIterator<Item = A>,
        A: Into<Vec<u8>>,
    {
        let mut argv = CArgv::new(args)?;

        info!(
            event = "entry_dispatch",
            context = %self.context,
            symbol = self.symbol,
            argc = argv.argc(),
        );

        let code = unsafe { (self.entry)(argv.argc(), argv.as_mut_ptr()) };

        crate::bridge_log!(self.logger, "{} returned {}", self.symbol, code);

        Ok(ExitStatus::from_code(code))
    }
}

impl fmt::Debug for DispatchedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchedEntry")
            .field("context", &self.context)
            .field("symbol", &self.symbol)
            .finish()
    }
}

/// Owned, NUL-terminated argv array
pub(crate) struct CArgv {
    // Keeps the strings alive for the pointers below
    _strings: Vec<CString>,
    pointers: Vec<*mut c_char>,
}

impl CArgv {
    pub(crate) fn new<I, A>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = A>,
        A: Into<Vec<u8>>,
    {
        let strings = args
            .into_iter()
            .enumerate()
            .map(|(index, arg)| {
                CString::new(arg).map_err(|_| BridgeError::InvalidArgument { index })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut pointers: Vec<*mut c_char> = strings
            .iter()
            .map(|s| s.as_ptr() as *mut c_char)
            .collect();
        pointers.push(core::ptr::null_mut());

        Ok(Self {
            _strings: strings,
            pointers,
        })
    }

    #[inline]
    pub(crate) fn argc(&self) -> c_int {
        (self.pointers.len() - 1) as c_int
    }

    #[inline]
    pub(crate) fn as_mut_ptr(&mut self) -> *mut *mut c_char {
        self.pointers.as_mut_ptr()
    }
}
