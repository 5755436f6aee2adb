//! Per-process bridge context
//!
//! Owns the diagnostic capability and hands it to the engine and the
//! dispatcher, so no component reads a global log level.

use crate::assembly::{AssemblyHandle, AssemblyResolver};
use crate::config::BridgeConfig;
use crate::entry::{ContextSelection, EntryDispatcher, ExitStatus, SymbolSource};
use crate::error::{BridgeError, Result};
use crate::logging::{LaunchTimer, Logger};
use crate::marshal::{ManagedTypeDescriptor, ManagedValue, MarshalEngine, Marshaled, MethodHandle};
use tracing::{debug, warn};

/// Bridge context for one process
#[derive(Debug)]
pub struct Bridge<R> {
    logger: Logger,
    engine: MarshalEngine,
    resolver: R,
}

impl<R: AssemblyResolver> Bridge<R> {
    pub fn new(resolver: R, logger: Logger) -> Self {
        Self {
            logger,
            engine: MarshalEngine::new(logger),
            resolver,
        }
    }

    /// Bridge with the diagnostic level of `config`
    pub fn from_config(config: &BridgeConfig, resolver: R) -> Self {
        Self::new(resolver, Logger::new(config.logging.verbosity))
    }

    #[inline]
    pub fn logger(&self) -> Logger {
        self.logger
    }

    #[inline]
    pub fn engine(&self) -> &MarshalEngine {
        &self.engine
    }

    #[inline]
    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Open an assembly by logical name
    ///
    /// Every call goes to the resolver; repeated names are the resolver's
    /// concern. A miss is returned, not reported as fatal.
    pub fn open_assembly(&self, name: &str) -> Result<AssemblyHandle> {
        crate::bridge_log!(self.logger, "opening assembly {}", name);

        match self.resolver.open_assembly(name) {
            Ok(handle) => {
                debug!(event = "assembly_opened", name, unit = handle.unit_id());
                Ok(handle)
            }
            Err(err) => {
                crate::bridge_log!(self.logger, "could not open assembly {}: {}", name, err);
                Err(err)
            }
        }
    }

    /// See [`MarshalEngine::marshal_return_value`]
    pub fn marshal_return_value(
        &self,
        descriptor: &ManagedTypeDescriptor,
        hint: &str,
        value: &ManagedValue,
        retain: bool,
        method: &MethodHandle,
    ) -> Result<Marshaled> {
        self.engine
            .marshal_return_value(descriptor, hint, value, retain, method)
    }

    /// Resolve the entry of `selection`, preload `root_assembly` if given,
    /// then run the entry
    ///
    /// A missing entry symbol fails before any assembly is opened. A root
    /// assembly the resolver does not know is left for the managed runtime
    /// to load.
    pub fn launch<S, I, A>(
        &self,
        selection: ContextSelection,
        symbols: &S,
        root_assembly: Option<&str>,
        args: I,
        timer: &LaunchTimer,
    ) -> Result<ExitStatus>
    where
        S: SymbolSource + ?Sized,
        I: IntoIterator<Item = A>,
        A: Into<Vec<u8>>,
    {
        crate::bridge_log!(self.logger, "launching as {}", selection.context());

        let entry = EntryDispatcher::new(selection, self.logger).resolve(symbols)?;
        timer.checkpoint("entry resolved");

        if let Some(name) = root_assembly {
            match self.open_assembly(name) {
                Ok(_) => timer.checkpoint("root assembly opened"),
                Err(BridgeError::AssemblyNotFound(_)) => {
                    warn!(event = "root_assembly_missing", name);
                }
                Err(err) => return Err(err),
            }
        }

        entry.run(args)
    }
}
