//! hostbridge - native side of a managed runtime embedded in a native host
//!
//! Two leaf components sit on the managed/native boundary:
//!
//! - [`entry`] picks, once at launch, the single native entry function for
//!   the host container the process runs in (standalone app, app extension,
//!   watch extension, TV extension, macOS extension).
//! - [`marshal`] converts a managed return value into its native
//!   representation and states who owns the result.
//!
//! [`assembly`] defines the resolver boundary the bridge calls to open
//! managed assemblies; [`Bridge`] ties the pieces to one logging capability.
//!
//! ```
//! use hostbridge::logging::Logger;
//! use hostbridge::marshal::{ManagedTypeDescriptor, ManagedValue, MarshalEngine, MethodHandle, Ownership, PrimitiveKind};
//!
//! let engine = MarshalEngine::new(Logger::disabled());
//! let result = engine
//!     .marshal_return_value(
//!         &ManagedTypeDescriptor::primitive(PrimitiveKind::I4),
//!         "i",
//!         &ManagedValue::scalar(7i32),
//!         false,
//!         &MethodHandle::new(1, "Count"),
//!     )
//!     .unwrap();
//! assert_eq!(result.ownership(), Ownership::Copied);
//! ```

pub mod assembly;
pub mod bridge;
pub mod config;
pub mod entry;
pub mod error;
pub mod ffi;
pub mod logging;
pub mod marshal;

pub use assembly::{AssemblyHandle, AssemblyLoader, AssemblyResolver, CachingResolver, DirectoryLoader, InMemoryLoader};
pub use bridge::Bridge;
pub use config::BridgeConfig;
pub use entry::{ContextSelection, EntryDispatcher, ExitStatus, HostContext, Platform};
pub use error::{fatal, report_fatal, BridgeError, ErrorCategory, Result};
pub use logging::{init_logging, LaunchTimer, LogConfig, Logger};
pub use marshal::{ManagedTypeDescriptor, ManagedValue, MarshalEngine, Marshaled, MethodHandle, Ownership};
