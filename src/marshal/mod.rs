//! Return value marshaling engine
//!
//! Architecture:
//! - `descriptor.rs` - read-only view of managed types
//! - `value.rs` - managed value handles
//! - `hint.rs` - native type encodings
//! - `rules.rs` - descriptor + hint -> conversion rule
//! - `native.rs` - native representations and ownership
//! - `engine.rs` - applies a rule to a value
//!
//! Rules are resolved from the full descriptor, generic arguments included,
//! so two instantiations of one definition never share a conversion. The
//! engine holds no per-type state and may be called from any thread.

mod descriptor;
mod engine;
mod hint;
mod native;
mod rules;
mod value;

pub use descriptor::{ManagedTypeDescriptor, PrimitiveKind, TypeKind, ELEMENT_TYPE, NULLABLE_DEFINITION};
pub use engine::{MarshalEngine, Marshaled, MethodHandle};
pub use hint::{NativeTypeHint, ScalarType, MAX_HINT_DEPTH};
pub use native::{NativeObject, NativeRepresentation, NativeScalar, NativeString, NativeStruct, Ownership};
pub use rules::{natural_scalar, resolve, scalar_fits, ConversionRule, RuleKind, NSSTRING_CLASS};
pub use value::{ManagedData, ManagedObject, ManagedString, ManagedValue, Scalar, ValueId};
