//! Entry dispatcher - route process startup to exactly one native entry
//!
//! Architecture:
//! - `context.rs` - host contexts, their entry symbols and platform rules
//! - `selection.rs` - exclusive selection of the active context
//! - `symbols.rs` - where entry functions are looked up
//! - `dispatcher.rs` - the `Unselected -> Dispatched` state machine
//!
//! The dispatcher is a pure selector: it initializes nothing and runs once,
//! single-threaded, before any application logic.

mod context;
mod dispatcher;
mod selection;
mod symbols;

pub use context::{HostContext, Platform, TV_SERVICES_EXTENSION_POINT, WATCHKIT_EXTENSION_POINT};
pub use dispatcher::{DispatchedEntry, EntryDispatcher, ExitStatus};
pub use selection::{ContextSelection, BUILD_HOST_CONTEXT};
pub use symbols::{NativeMain, ProcessSymbols, StaticSymbols, SymbolSource};

use crate::error::Result;
use crate::logging::{LaunchTimer, Logger};

/// Select, resolve and run the entry function for `selection`
pub fn launch<S, I, A>(
    selection: ContextSelection,
    symbols: &S,
    args: I,
    logger: Logger,
    timer: &LaunchTimer,
) -> Result<ExitStatus>
where
    S: SymbolSource + ?Sized,
    I: IntoIterator<Item = A>,
    A: Into<Vec<u8>>,
{
    let entry = EntryDispatcher::new(selection, logger).resolve(symbols)?;
    timer.checkpoint("entry resolved");
    entry.run(args)
}
