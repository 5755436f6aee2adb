//! Conversion rules
//!
//! Picks how a managed type is converted, from the full descriptor and the
//! native hint. Resolution is a pure function: equal inputs give equal rules.
//! Generic instantiations are keyed by their full name, so two instantiations
//! of one definition never share a rule.

use super::descriptor::{ManagedTypeDescriptor, PrimitiveKind, TypeKind};
use super::engine::MethodHandle;
use super::hint::{NativeTypeHint, ScalarType};
use crate::error::{BridgeError, Result};

/// How a managed value becomes a native one
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RuleKind {
    /// Void return
    Absent,
    /// Copy a primitive into a native scalar of the same width
    Scalar {
        source: PrimitiveKind,
        target: ScalarType,
    },
    /// Copy an enum value into an integer of the chosen width
    Enum {
        underlying: PrimitiveKind,
        target: ScalarType,
    },
    /// Copy or share string storage
    String { c_string: bool },
    /// Field-wise copy of a value type
    Struct { name: String, layout: Vec<ScalarType> },
    /// Hand out the native object behind a managed wrapper
    NativeObject { class: String },
    /// Create a native proxy for a pure managed object
    Proxy { class: String },
    /// Unwrap a nullable
    Nullable(Box<RuleKind>),
}

/// Rule resolved for one descriptor
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversionRule {
    key: String,
    kind: RuleKind,
}

impl ConversionRule {
    /// Full name of the managed type the rule was resolved for
    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[inline]
    pub fn kind(&self) -> &RuleKind {
        &self.kind
    }

    /// Encoding of the native type this rule produces
    pub fn native_hint(&self) -> NativeTypeHint {
        fn hint_of(kind: &RuleKind) -> NativeTypeHint {
            match kind {
                RuleKind::Absent => NativeTypeHint::Void,
                RuleKind::Scalar { target, .. } | RuleKind::Enum { target, .. } => {
                    NativeTypeHint::Scalar(*target)
                }
                RuleKind::String { c_string: true } => NativeTypeHint::CString,
                RuleKind::String { c_string: false } => NativeTypeHint::object(NSSTRING_CLASS),
                RuleKind::Struct { name, layout } => NativeTypeHint::Struct {
                    name: name.clone(),
                    fields: layout.iter().copied().map(NativeTypeHint::Scalar).collect(),
                },
                RuleKind::NativeObject { class } | RuleKind::Proxy { class } => {
                    NativeTypeHint::object(class.clone())
                }
                RuleKind::Nullable(inner) => hint_of(inner),
            }
        }

        hint_of(&self.kind)
    }
}

/// Native class of string objects
pub const NSSTRING_CLASS: &str = "NSString";

/// Resolve the conversion rule for `descriptor` under `hint`
pub fn resolve(
    descriptor: &ManagedTypeDescriptor,
    hint: &NativeTypeHint,
    method: &MethodHandle,
) -> Result<ConversionRule> {
    Ok(ConversionRule {
        key: descriptor.full_name(),
        kind: resolve_kind(descriptor, hint, method)?,
    })
}

fn resolve_kind(
    descriptor: &ManagedTypeDescriptor,
    hint: &NativeTypeHint,
    method: &MethodHandle,
) -> Result<RuleKind> {
    match descriptor.kind() {
        TypeKind::Void => match hint {
            NativeTypeHint::Unspecified | NativeTypeHint::Void => Ok(RuleKind::Absent),
            _ => Err(mismatch(descriptor, hint)),
        },

        TypeKind::Primitive(kind) => {
            let target = match hint {
                NativeTypeHint::Unspecified => natural_scalar(*kind),
                NativeTypeHint::Scalar(t) if scalar_fits(*kind, *t) => *t,
                _ => return Err(mismatch(descriptor, hint)),
            };
            Ok(RuleKind::Scalar {
                source: *kind,
                target,
            })
        }

        TypeKind::Enum { underlying } => {
            let target = enum_target(descriptor, *underlying, hint, method)?;
            Ok(RuleKind::Enum {
                underlying: *underlying,
                target,
            })
        }

        TypeKind::String => match hint {
            NativeTypeHint::Unspecified | NativeTypeHint::Object { class: None } => {
                Ok(RuleKind::String { c_string: false })
            }
            NativeTypeHint::Object { class: Some(c) } if c == NSSTRING_CLASS => {
                Ok(RuleKind::String { c_string: false })
            }
            NativeTypeHint::CString => Ok(RuleKind::String { c_string: true }),
            _ => Err(mismatch(descriptor, hint)),
        },

        TypeKind::ValueType { fields } => struct_rule(descriptor, fields, hint),

        TypeKind::Class {
            native_class: Some(class),
        } => object_rule(descriptor, hint, class.clone(), false),

        TypeKind::Class { native_class: None } => {
            object_rule(descriptor, hint, descriptor.full_name(), true)
        }

        TypeKind::GenericInstance {
            definition,
            arguments,
        } => {
            if let Some(inner) = descriptor.nullable_argument() {
                return Ok(RuleKind::Nullable(Box::new(resolve_kind(inner, hint, method)?)));
            }

            for argument in arguments {
                ensure_known(argument)?;
            }

            match definition.kind() {
                // The native class is shared by all instantiations; the rule
                // key still tells them apart.
                TypeKind::Class {
                    native_class: Some(class),
                } => object_rule(descriptor, hint, class.clone(), false),
                TypeKind::Class { native_class: None } => {
                    object_rule(descriptor, hint, descriptor.full_name(), true)
                }
                // Field types are already substituted in the definition
                TypeKind::ValueType { fields } => struct_rule(descriptor, fields, hint),
                _ => Err(unsupported(descriptor)),
            }
        }

        TypeKind::Unrecognized { .. } => Err(unsupported(descriptor)),
    }
}

/// Default native scalar for a primitive
pub fn natural_scalar(kind: PrimitiveKind) -> ScalarType {
    match kind {
        PrimitiveKind::Boolean => ScalarType::Bool,
        PrimitiveKind::Char => ScalarType::UShort,
        PrimitiveKind::I1 => ScalarType::Char,
        PrimitiveKind::U1 => ScalarType::UChar,
        PrimitiveKind::I2 => ScalarType::Short,
        PrimitiveKind::U2 => ScalarType::UShort,
        PrimitiveKind::I4 => ScalarType::Int,
        PrimitiveKind::U4 => ScalarType::UInt,
        PrimitiveKind::I8 => ScalarType::LongLong,
        PrimitiveKind::U8 => ScalarType::ULongLong,
        PrimitiveKind::R4 => ScalarType::Float,
        PrimitiveKind::R8 => ScalarType::Double,
        PrimitiveKind::I => native_word(true),
        PrimitiveKind::U => native_word(false),
    }
}

const fn native_word(signed: bool) -> ScalarType {
    match (core::mem::size_of::<usize>(), signed) {
        (8, true) => ScalarType::LongLong,
        (8, false) => ScalarType::ULongLong,
        (_, true) => ScalarType::Int,
        (_, false) => ScalarType::UInt,
    }
}

/// Whether a primitive has the width of `target`
///
/// Signedness is not compared here; the engine range-checks integer values
/// when the signedness differs.
pub fn scalar_fits(kind: PrimitiveKind, target: ScalarType) -> bool {
    match kind {
        // BOOL is a signed or unsigned char depending on the target
        PrimitiveKind::Boolean => matches!(target, ScalarType::Bool | ScalarType::Char | ScalarType::UChar),
        PrimitiveKind::R4 => target == ScalarType::Float,
        PrimitiveKind::R8 => target == ScalarType::Double,
        PrimitiveKind::I | PrimitiveKind::U if target == ScalarType::Pointer => true,
        _ => target.is_integral() && target.size() == kind.size(),
    }
}

fn enum_target(
    descriptor: &ManagedTypeDescriptor,
    underlying: PrimitiveKind,
    hint: &NativeTypeHint,
    method: &MethodHandle,
) -> Result<ScalarType> {
    match hint {
        NativeTypeHint::Scalar(t) if t.is_integral() => Ok(*t),
        NativeTypeHint::Unspecified => {
            // Same call site, same width: fall back to the method's declared
            // return encoding before the underlying type.
            match method.return_encoding() {
                Some(encoding) => match NativeTypeHint::parse(encoding)? {
                    NativeTypeHint::Scalar(t) if t.is_integral() => Ok(t),
                    NativeTypeHint::Unspecified => Ok(natural_scalar(underlying)),
                    other => Err(mismatch(descriptor, &other)),
                },
                None => Ok(natural_scalar(underlying)),
            }
        }
        _ => Err(mismatch(descriptor, hint)),
    }
}

/// Field-wise copy of `descriptor`, laid out by the hint when it names fields
fn struct_rule(
    descriptor: &ManagedTypeDescriptor,
    fields: &[ManagedTypeDescriptor],
    hint: &NativeTypeHint,
) -> Result<RuleKind> {
    let (native_name, hinted) = match hint {
        NativeTypeHint::Unspecified => (None, None),
        NativeTypeHint::Struct {
            name,
            fields: hint_fields,
        } => {
            let scalars = hint.flattened_scalars().ok_or_else(|| mismatch(descriptor, hint))?;
            (Some(name.clone()), (!hint_fields.is_empty()).then_some(scalars))
        }
        _ => return Err(mismatch(descriptor, hint)),
    };

    let mut managed = Vec::new();
    flatten_fields(descriptor, fields, &mut managed)?;

    let layout = match hinted {
        None => managed.iter().copied().map(natural_scalar).collect(),
        Some(native) => {
            let fits = native.len() == managed.len()
                && managed.iter().zip(&native).all(|(m, n)| scalar_fits(*m, *n));
            if !fits {
                return Err(mismatch(descriptor, hint));
            }
            native
        }
    };

    Ok(RuleKind::Struct {
        name: native_name.unwrap_or_else(|| descriptor.name().to_string()),
        layout,
    })
}

/// Object rule for `class`; a hint naming any other class is rejected
fn object_rule(
    descriptor: &ManagedTypeDescriptor,
    hint: &NativeTypeHint,
    class: String,
    proxy: bool,
) -> Result<RuleKind> {
    match hint {
        NativeTypeHint::Unspecified | NativeTypeHint::Object { class: None } => {}
        NativeTypeHint::Object { class: Some(c) } if *c == class => {}
        _ => return Err(mismatch(descriptor, hint)),
    }

    Ok(if proxy {
        RuleKind::Proxy { class }
    } else {
        RuleKind::NativeObject { class }
    })
}

fn flatten_fields(
    owner: &ManagedTypeDescriptor,
    fields: &[ManagedTypeDescriptor],
    out: &mut Vec<PrimitiveKind>,
) -> Result<()> {
    for field in fields {
        match field.kind() {
            TypeKind::Primitive(kind) => out.push(*kind),
            TypeKind::Enum { underlying } => out.push(*underlying),
            TypeKind::ValueType { fields } => flatten_fields(field, fields, out)?,
            _ => {
                return Err(BridgeError::UnsupportedType {
                    type_name: owner.full_name(),
                    category: format!("valuetype field of category {}", field.category()),
                })
            }
        }
    }
    Ok(())
}

fn ensure_known(descriptor: &ManagedTypeDescriptor) -> Result<()> {
    match descriptor.kind() {
        TypeKind::Unrecognized { .. } => Err(unsupported(descriptor)),
        TypeKind::GenericInstance {
            definition,
            arguments,
        } => {
            ensure_known(definition)?;
            arguments.iter().try_for_each(ensure_known)
        }
        _ => Ok(()),
    }
}

fn unsupported(descriptor: &ManagedTypeDescriptor) -> BridgeError {
    BridgeError::UnsupportedType {
        type_name: descriptor.full_name(),
        category: descriptor.category(),
    }
}

fn mismatch(descriptor: &ManagedTypeDescriptor, hint: &NativeTypeHint) -> BridgeError {
    BridgeError::hint_mismatch(&descriptor.full_name(), &hint.to_string())
}
