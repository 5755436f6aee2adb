//! Return value marshaling

use super::descriptor::{ManagedTypeDescriptor, PrimitiveKind};
use super::hint::{NativeTypeHint, ScalarType};
use super::native::{NativeObject, NativeRepresentation, NativeScalar, NativeString, NativeStruct, Ownership};
use super::rules::{self, ConversionRule, RuleKind};
use super::value::{ManagedData, ManagedObject, ManagedValue, Scalar, ValueId};
use crate::error::{BridgeError, Result};
use crate::logging::Logger;
use tracing::trace;

/// The managed method whose return value is being converted
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodHandle {
    token: u32,
    name: String,
    return_encoding: Option<String>,
}

impl MethodHandle {
    pub fn new(token: u32, name: impl Into<String>) -> Self {
        Self {
            token,
            name: name.into(),
            return_encoding: None,
        }
    }

    /// Declared native encoding of the method's return type
    pub fn with_return_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.return_encoding = Some(encoding.into());
        self
    }

    #[inline]
    pub fn token(&self) -> u32 {
        self.token
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn return_encoding(&self) -> Option<&str> {
        self.return_encoding.as_deref()
    }
}

/// Outcome of one conversion
///
/// A retained result owns one native reference; hand it back with
/// [`Marshaled::release`]. Dropping a retained result without releasing it
/// leaks that reference, as it would on the native side.
#[derive(Debug)]
#[must_use = "a retained result must be released"]
pub struct Marshaled {
    source: ValueId,
    repr: NativeRepresentation,
    ownership: Ownership,
    rule: Option<ConversionRule>,
}

impl Marshaled {
    #[inline]
    pub fn representation(&self) -> &NativeRepresentation {
        &self.repr
    }

    #[inline]
    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    /// Managed value this result was produced from
    #[inline]
    pub fn source(&self) -> ValueId {
        self.source
    }

    /// Rule used, `None` when the value was absent
    #[inline]
    pub fn rule(&self) -> Option<&ConversionRule> {
        self.rule.as_ref()
    }

    pub fn rule_key(&self) -> Option<&str> {
        self.rule.as_ref().map(ConversionRule::key)
    }

    /// Native type of the produced value
    pub fn native_hint(&self) -> Option<NativeTypeHint> {
        self.rule.as_ref().map(ConversionRule::native_hint)
    }

    pub fn into_parts(self) -> (NativeRepresentation, Ownership) {
        (self.repr, self.ownership)
    }

    /// Give back the reference a retained result owns
    ///
    /// Returns the object's remaining retain count when an object reference
    /// was released.
    pub fn release(self) -> Option<u32> {
        match (self.ownership, self.repr) {
            (Ownership::Retained, NativeRepresentation::Object(object)) => Some(object.release()),
            // Retained strings own their copy outright
            _ => None,
        }
    }
}

/// Converts managed return values into native representations
///
/// Stateless apart from its logger: the same inputs always give the same
/// rule, and it can be shared across threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarshalEngine {
    logger: Logger,
}

impl MarshalEngine {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }

    /// Convert `value`, of managed type `descriptor`, for a native caller
    /// expecting `hint`
    ///
    /// With `retain` the caller receives an owned reference and must release
    /// it; otherwise the result is borrowed for the current call. Values that
    /// are copied ignore `retain`.
    pub fn marshal_return_value(
        &self,
        descriptor: &ManagedTypeDescriptor,
        hint: &str,
        value: &ManagedValue,
        retain: bool,
        method: &MethodHandle,
    ) -> Result<Marshaled> {
        if value.is_null() {
            trace!(event = "marshal_absent", method = method.name(), value = %value.id());
            return Ok(Marshaled {
                source: value.id(),
                repr: NativeRepresentation::Absent,
                ownership: Ownership::Copied,
                rule: None,
            });
        }

        let parsed = NativeTypeHint::parse(hint)?;
        let rule = rules::resolve(descriptor, &parsed, method)?;

        let (repr, ownership) = self.apply(descriptor, rule.kind(), value.data(), retain)?;

        crate::bridge_log!(
            self.logger,
            "marshal {} return of {} as {} ({:?})",
            descriptor,
            method.name(),
            rule.native_hint(),
            ownership
        );
        trace!(
            event = "marshal",
            method = method.name(),
            token = method.token(),
            rule = rule.key(),
            ownership = ?ownership,
        );

        Ok(Marshaled {
            source: value.id(),
            repr,
            ownership,
            rule: Some(rule),
        })
    }

    fn apply(
        &self,
        descriptor: &ManagedTypeDescriptor,
        kind: &RuleKind,
        data: &ManagedData,
        retain: bool,
    ) -> Result<(NativeRepresentation, Ownership)> {
        let type_name = descriptor.full_name();

        match kind {
            RuleKind::Absent => Ok((NativeRepresentation::Absent, Ownership::Copied)),

            RuleKind::Scalar { source, target } => {
                let scalar = expect_scalar(&type_name, data, *source)?;
                Ok((
                    NativeRepresentation::Scalar(copy_scalar(&type_name, scalar, *target)?),
                    Ownership::Copied,
                ))
            }

            RuleKind::Enum { underlying, target } => {
                let scalar = expect_scalar(&type_name, data, *underlying)?;
                let value = scalar
                    .as_i128()
                    .ok_or_else(|| BridgeError::value_mismatch(&type_name, "enum value is not integral"))?;
                Ok((
                    NativeRepresentation::Scalar(narrow(&type_name, *target, value)?),
                    Ownership::Copied,
                ))
            }

            RuleKind::String { c_string } => {
                let ManagedData::String(managed) = data else {
                    return Err(BridgeError::value_mismatch(&type_name, "expected a string"));
                };
                if *c_string && managed.as_str().contains('\0') {
                    return Err(BridgeError::value_mismatch(
                        &type_name,
                        "string contains a NUL and cannot be passed as a C string",
                    ));
                }

                Ok(if retain {
                    (NativeRepresentation::String(NativeString::copied(managed)), Ownership::Retained)
                } else {
                    (NativeRepresentation::String(NativeString::borrowed(managed)), Ownership::Borrowed)
                })
            }

            RuleKind::Struct { name, layout } => {
                let mut scalars = Vec::with_capacity(layout.len());
                flatten_data(&type_name, data, &mut scalars)?;
                if scalars.len() != layout.len() {
                    return Err(BridgeError::value_mismatch(
                        &type_name,
                        format!("expected {} scalar fields, found {}", layout.len(), scalars.len()),
                    ));
                }

                let mut fields = Vec::with_capacity(layout.len());
                for (scalar, target) in scalars.into_iter().zip(layout) {
                    if !rules::scalar_fits(scalar.kind(), *target) {
                        return Err(BridgeError::value_mismatch(
                            &type_name,
                            format!("field of type {} does not fit '{}'", scalar.kind().type_name(), target.encoding()),
                        ));
                    }
                    fields.push(copy_scalar(&type_name, scalar, *target)?);
                }

                Ok((
                    NativeRepresentation::Struct(NativeStruct {
                        name: name.clone(),
                        fields,
                    }),
                    Ownership::Copied,
                ))
            }

            RuleKind::NativeObject { .. } => {
                let object = expect_object(&type_name, data)?;
                let native = object.native_object().ok_or_else(|| {
                    BridgeError::value_mismatch(&type_name, "managed wrapper has no native object")
                })?;
                Ok(hand_out(native, retain))
            }

            RuleKind::Proxy { class } => {
                let object = expect_object(&type_name, data)?;
                match object.native_object() {
                    // A managed-typed slot holding a wrapper of a native object
                    Some(native) => Ok(hand_out(native, retain)),
                    None => Ok((
                        NativeRepresentation::Object(NativeObject::proxy(class.clone(), object.clone())),
                        Ownership::Retained,
                    )),
                }
            }

            RuleKind::Nullable(inner) => {
                let inner_descriptor = descriptor.nullable_argument().unwrap_or(descriptor);
                self.apply(inner_descriptor, inner, data, retain)
            }
        }
    }
}

fn hand_out(native: &NativeObject, retain: bool) -> (NativeRepresentation, Ownership) {
    if retain {
        native.retain();
        (NativeRepresentation::Object(native.clone()), Ownership::Retained)
    } else {
        (NativeRepresentation::Object(native.clone()), Ownership::Borrowed)
    }
}

fn expect_scalar(type_name: &str, data: &ManagedData, kind: PrimitiveKind) -> Result<Scalar> {
    match data {
        ManagedData::Scalar(s) if s.kind() == kind => Ok(*s),
        ManagedData::Scalar(s) => Err(BridgeError::value_mismatch(
            type_name,
            format!("expected {}, found {}", kind.type_name(), s.kind().type_name()),
        )),
        _ => Err(BridgeError::value_mismatch(type_name, "expected a scalar")),
    }
}

fn expect_object<'a>(type_name: &str, data: &'a ManagedData) -> Result<&'a ManagedObject> {
    match data {
        ManagedData::Object(object) => Ok(object),
        _ => Err(BridgeError::value_mismatch(type_name, "expected an object reference")),
    }
}

fn flatten_data(type_name: &str, data: &ManagedData, out: &mut Vec<Scalar>) -> Result<()> {
    match data {
        ManagedData::Scalar(s) => out.push(*s),
        ManagedData::Struct(fields) => {
            for field in fields {
                flatten_data(type_name, field, out)?;
            }
        }
        _ => return Err(BridgeError::value_mismatch(type_name, "value type field is not a scalar")),
    }
    Ok(())
}

/// Copy `scalar` into `target`; integers must keep their value
fn copy_scalar(type_name: &str, scalar: Scalar, target: ScalarType) -> Result<NativeScalar> {
    match scalar.as_i128() {
        Some(value) if target.is_integral() => narrow(type_name, target, value),
        _ => Ok(NativeScalar::from_bits(target, scalar.to_bits())),
    }
}

fn narrow(type_name: &str, target: ScalarType, value: i128) -> Result<NativeScalar> {
    match target.integral_range() {
        Some((min, max)) if (min..=max).contains(&value) => {
            Ok(NativeScalar::from_bits(target, value as u64))
        }
        _ => Err(BridgeError::ValueOutOfRange {
            type_name: type_name.to_string(),
            hint: target.encoding().to_string(),
            value,
        }),
    }
}
