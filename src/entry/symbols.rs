//! Entry symbol lookup
//!
//! Host frameworks supply the native entry functions. A [`SymbolSource`]
//! answers whether a given entry symbol is available in this process.

use core::ffi::{c_char, c_int};
use std::collections::HashMap;

/// Native `(argc, argv) -> exit status` entry function
pub type NativeMain = unsafe extern "C" fn(argc: c_int, argv: *mut *mut c_char) -> c_int;

/// Provider of native entry functions
pub trait SymbolSource {
    /// Look up an entry function by symbol name
    fn lookup(&self, symbol: &str) -> Option<NativeMain>;

    /// Look up an entry function supplied by a framework, skipping any
    /// definition in the image that contains the bridge
    ///
    /// Sources that only hold explicitly registered entries have nothing to
    /// skip.
    fn lookup_framework(&self, symbol: &str) -> Option<NativeMain> {
        self.lookup(symbol)
    }
}

/// Entry functions registered explicitly by the embedding host
#[derive(Debug, Default, Clone)]
pub struct StaticSymbols {
    symbols: HashMap<String, NativeMain>,
}

impl StaticSymbols {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `entry` under `symbol`, replacing any earlier registration
    pub fn register(&mut self, symbol: impl Into<String>, entry: NativeMain) -> &mut Self {
        self.symbols.insert(symbol.into(), entry);
        self
    }

    /// Builder-style [`register`](Self::register)
    pub fn with(mut self, symbol: impl Into<String>, entry: NativeMain) -> Self {
        self.register(symbol, entry);
        self
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

impl SymbolSource for StaticSymbols {
    fn lookup(&self, symbol: &str) -> Option<NativeMain> {
        self.symbols.get(symbol).copied()
    }
}

impl<S: SymbolSource + ?Sized> SymbolSource for &S {
    fn lookup(&self, symbol: &str) -> Option<NativeMain> {
        (**self).lookup(symbol)
    }

    fn lookup_framework(&self, symbol: &str) -> Option<NativeMain> {
        (**self).lookup_framework(symbol)
    }
}

/// Symbols exported by the running process and the frameworks it links
///
/// Backed by the dynamic linker; on targets without one every lookup misses.
pub struct ProcessSymbols {
    #[cfg(unix)]
    handle: core::ptr::NonNull<core::ffi::c_void>,
}

impl ProcessSymbols {
    /// Open the global symbol table of the running process
    #[cfg(unix)]
    pub fn open() -> crate::Result<Self> {
        // A null filename yields a handle for the main program and its
        // dependencies.
        let handle = unsafe { libc::dlopen(core::ptr::null(), libc::RTLD_NOW) };
        core::ptr::NonNull::new(handle)
            .map(|handle| Self { handle })
            .ok_or_else(|| {
                crate::BridgeError::InvalidConfig(format!(
                    "cannot open process symbol table: {}",
                    last_dl_error()
                ))
            })
    }

    /// Open the global symbol table of the running process
    #[cfg(not(unix))]
    pub fn open() -> crate::Result<Self> {
        Ok(Self {})
    }
}

impl SymbolSource for ProcessSymbols {
    #[cfg(unix)]
    fn lookup(&self, symbol: &str) -> Option<NativeMain> {
        dl_lookup(self.handle.as_ptr(), symbol)
    }

    /// Searches the images loaded after the one containing the bridge, so
    /// the `main` of the host executable is never found
    #[cfg(unix)]
    fn lookup_framework(&self, symbol: &str) -> Option<NativeMain> {
        dl_lookup(libc::RTLD_NEXT, symbol)
    }

    #[cfg(not(unix))]
    fn lookup(&self, _symbol: &str) -> Option<NativeMain> {
        None
    }
}

#[cfg(unix)]
fn dl_lookup(handle: *mut core::ffi::c_void, symbol: &str) -> Option<NativeMain> {
    let cname = std::ffi::CString::new(symbol).ok()?;

    unsafe {
        let ptr = libc::dlsym(handle, cname.as_ptr());
        if ptr.is_null() {
            None
        } else {
            Some(core::mem::transmute::<*mut core::ffi::c_void, NativeMain>(ptr))
        }
    }
}

#[cfg(unix)]
impl Drop for ProcessSymbols {
    fn drop(&mut self) {
        unsafe {
            libc::dlclose(self.handle.as_ptr());
        }
    }
}

#[cfg(unix)]
fn last_dl_error() -> String {
    unsafe {
        let err = libc::dlerror();
        if err.is_null() {
            "unknown error".into()
        } else {
            std::ffi::CStr::from_ptr(err).to_string_lossy().into_owned()
        }
    }
}
