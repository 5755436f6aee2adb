//! C FFI - process entry for native launchers
//!
//! `hostbridge_main` is what a host's `main` calls. It dispatches the host
//! context this library was built for. Watch extensions have no host `main`:
//! the linker entry point is `xamarin_watchextension_main`, and `main` is
//! left to WatchKit.

use crate::assembly::{AssemblyResolver, CachingResolver, DirectoryLoader};
use crate::bridge::Bridge;
use crate::config::BridgeConfig;
use crate::entry::{ExitStatus, NativeMain, ProcessSymbols, SymbolSource, BUILD_HOST_CONTEXT};
use crate::error::{fatal, report_fatal, BridgeError, Result};
use crate::logging::{init_logging, LaunchTimer, Logger};
use core::ffi::{c_char, c_int, CStr};
use tracing_appender::non_blocking::WorkerGuard;

/// Configuration and logging of the running process
///
/// Holds the log writer guard, so events logged before this is dropped are
/// flushed; report failures through [`fail`](Self::fail) while it is alive.
pub struct ProcessLaunch {
    config: BridgeConfig,
    logger: Logger,
    timer: LaunchTimer,
    _log_guard: Option<WorkerGuard>,
}

impl ProcessLaunch {
    /// Load configuration from the environment and install logging
    pub fn init() -> Result<Self> {
        Self::with_config(BridgeConfig::from_env()?)
    }

    /// Install logging described by `config`
    pub fn with_config(config: BridgeConfig) -> Result<Self> {
        let log_config = config.log_config()?.with_env_overrides();
        let log_guard = init_logging(&log_config);

        let logger = log_config.logger();
        let timer = LaunchTimer::start(logger, config.launch.trace_launch_time);
        timer.checkpoint("configuration loaded");

        Ok(Self {
            config,
            logger,
            timer,
            _log_guard: log_guard,
        })
    }

    #[inline]
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    #[inline]
    pub fn logger(&self) -> Logger {
        self.logger
    }

    /// Bridge resolving assemblies from the configured directories
    pub fn bridge(&self) -> Result<Bridge<CachingResolver<DirectoryLoader>>> {
        let loader = self.config.assembly_loader()?;
        Ok(Bridge::new(CachingResolver::new(loader), self.logger))
    }

    /// Dispatch the build's host context through `bridge`
    ///
    /// Returns the entry's exit status.
    pub fn launch<R, S, I, A>(&self, bridge: &Bridge<R>, symbols: &S, args: I) -> Result<ExitStatus>
    where
        R: AssemblyResolver,
        S: SymbolSource + ?Sized,
        I: IntoIterator<Item = A>,
        A: Into<Vec<u8>>,
    {
        let selection = self.config.selection(BUILD_HOST_CONTEXT)?;
        let status = bridge.launch(
            selection,
            symbols,
            self.config.launch.root_assembly.as_deref(),
            args,
            &self.timer,
        )?;

        tracing::debug!(event = "entry_returned", status = status.code(), elapsed = ?self.timer.elapsed());
        Ok(status)
    }

    /// Report `err`, flush the log writer and exit with status 1
    pub fn fail(self, err: &BridgeError) -> ! {
        report_fatal(err);
        drop(self);
        std::process::exit(1);
    }
}

/// Run the bridge for this process with `args` as the argument vector
///
/// Failures after logging is installed are reported and terminate the
/// process; only configuration failures before that are returned.
pub fn launch_process<I, A>(args: I) -> Result<ExitStatus>
where
    I: IntoIterator<Item = A>,
    A: Into<Vec<u8>>,
{
    let process = ProcessLaunch::init()?;
    let result = ProcessSymbols::open().and_then(|symbols| {
        let bridge = process.bridge()?;
        process.launch(&bridge, &symbols, args)
    });

    match result {
        Ok(status) => Ok(status),
        Err(err) => process.fail(&err),
    }
}

/// Whether `entry` is one of this library's own process entries
pub(crate) fn is_bridge_entry(entry: NativeMain) -> bool {
    let address = entry as usize;

    #[cfg(host_context = "watch-extension")]
    {
        if address == xamarin_watchextension_main as usize {
            return true;
        }
    }

    address == hostbridge_main as usize
}

/// Copy a C argument vector
///
/// # Safety
///
/// `argv` must be null or point to `argc` pointers, each null or pointing to
/// a NUL-terminated string.
unsafe fn collect_args(argc: c_int, argv: *const *const c_char) -> Result<Vec<Vec<u8>>> {
    if argv.is_null() || argc <= 0 {
        return Ok(Vec::new());
    }

    (0..argc as usize)
        .map(|index| {
            let arg = *argv.add(index);
            if arg.is_null() {
                return Err(BridgeError::InvalidArgument { index });
            }
            Ok(CStr::from_ptr(arg).to_bytes().to_vec())
        })
        .collect()
}

/// Process entry
///
/// Never returns on a configuration error: the diagnostic is logged and the
/// process exits with status 1.
///
/// # Safety
///
/// `argv` must be null or point to `argc` valid C strings, as passed to `main`.
#[no_mangle]
pub unsafe extern "C" fn hostbridge_main(argc: c_int, argv: *const *const c_char) -> c_int {
    let process = match ProcessLaunch::init() {
        Ok(process) => process,
        Err(err) => fatal(&err),
    };

    let result = collect_args(argc, argv).and_then(|args| {
        let symbols = ProcessSymbols::open()?;
        let bridge = process.bridge()?;
        process.launch(&bridge, &symbols, args)
    });

    match result {
        Ok(status) => status.code(),
        Err(err) => process.fail(&err),
    }
}

/// Linker entry point of watch extensions
///
/// # Safety
///
/// As for [`hostbridge_main`].
#[cfg(host_context = "watch-extension")]
#[no_mangle]
pub unsafe extern "C" fn xamarin_watchextension_main(argc: c_int, argv: *const *const c_char) -> c_int {
    hostbridge_main(argc, argv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::StaticSymbols;
    use std::ffi::CString;
    use std::fs;

    unsafe extern "C" fn build_entry(_argc: c_int, _argv: *mut *mut c_char) -> c_int {
        7
    }

    #[test]
    fn test_collect_args() {
        let owned: Vec<CString> = ["app", "--flag"].iter().map(|s| CString::new(*s).unwrap()).collect();
        let ptrs: Vec<*const c_char> = owned.iter().map(|s| s.as_ptr()).collect();

        let args = unsafe { collect_args(ptrs.len() as c_int, ptrs.as_ptr()) }.unwrap();
        assert_eq!(args, vec![b"app".to_vec(), b"--flag".to_vec()]);
    }

    #[test]
    fn test_collect_args_null_vector() {
        let args = unsafe { collect_args(3, core::ptr::null()) }.unwrap();
        assert!(args.is_empty());
    }

    #[test]
    fn test_collect_args_null_entry() {
        let first = CString::new("app").unwrap();
        let ptrs = [first.as_ptr(), core::ptr::null()];

        let err = unsafe { collect_args(2, ptrs.as_ptr()) }.unwrap_err();
        assert!(matches!(err, BridgeError::InvalidArgument { index: 1 }));
    }

    #[test]
    fn test_bridge_entry_is_recognized() {
        let own = unsafe {
            core::mem::transmute::<unsafe extern "C" fn(c_int, *const *const c_char) -> c_int, NativeMain>(
                hostbridge_main,
            )
        };
        assert!(is_bridge_entry(own));
        assert!(!is_bridge_entry(build_entry));
    }

    #[test]
    fn test_launch_preloads_root_from_assembly_path() {
        let dir = tempfile::tempdir().unwrap();
        let managed = dir.path().join("Managed");
        fs::create_dir_all(&managed).unwrap();
        fs::write(managed.join("App.dll"), b"app image").unwrap();

        let mut config = BridgeConfig::default();
        config.launch.root_assembly = Some("App".into());
        config.launch.assembly_path = vec![managed.display().to_string()];

        let process = ProcessLaunch::with_config(config).unwrap();
        let bridge = process.bridge().unwrap();
        let symbols = StaticSymbols::new().with(BUILD_HOST_CONTEXT.entry_symbol(), build_entry);

        let status = process.launch(&bridge, &symbols, ["app"]).unwrap();
        assert_eq!(status.code(), 7);
        assert_eq!(bridge.resolver().load_count(), 1);

        let root = bridge.open_assembly("App").unwrap();
        assert_eq!(root.image(), b"app image");
        assert_eq!(bridge.resolver().load_count(), 1);
    }
}
