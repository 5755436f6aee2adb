//! Managed type descriptors
//!
//! A descriptor is the bridge's read-only view of a managed type: enough
//! shape information to pick a conversion rule. Descriptors are immutable
//! once built.

use core::fmt;

/// Element type codes used by the managed runtime for type categories
#[allow(non_snake_case, dead_code, missing_docs)]
pub mod ELEMENT_TYPE {
    pub const VOID: u8 = 0x01;
    pub const BOOLEAN: u8 = 0x02;
    pub const CHAR: u8 = 0x03;
    pub const I1: u8 = 0x04;
    pub const U1: u8 = 0x05;
    pub const I2: u8 = 0x06;
    pub const U2: u8 = 0x07;
    pub const I4: u8 = 0x08;
    pub const U4: u8 = 0x09;
    pub const I8: u8 = 0x0a;
    pub const U8: u8 = 0x0b;
    pub const R4: u8 = 0x0c;
    pub const R8: u8 = 0x0d;
    pub const STRING: u8 = 0x0e;
    pub const PTR: u8 = 0x0f;
    pub const BYREF: u8 = 0x10;
    pub const VALUETYPE: u8 = 0x11;
    pub const CLASS: u8 = 0x12;
    pub const VAR: u8 = 0x13;
    pub const ARRAY: u8 = 0x14;
    pub const GENERICINST: u8 = 0x15;
    pub const TYPEDBYREF: u8 = 0x16;
    pub const I: u8 = 0x18;
    pub const U: u8 = 0x19;
    pub const FNPTR: u8 = 0x1b;
    pub const OBJECT: u8 = 0x1c;
    pub const SZARRAY: u8 = 0x1d;
    pub const MVAR: u8 = 0x1e;
}

/// Full name of the nullable wrapper definition
pub const NULLABLE_DEFINITION: &str = "System.Nullable`1";

/// Primitive managed scalar kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Boolean,
    /// UTF-16 code unit
    Char,
    I1,
    U1,
    I2,
    U2,
    I4,
    U4,
    I8,
    U8,
    R4,
    R8,
    /// Native-sized signed integer
    I,
    /// Native-sized unsigned integer
    U,
}

impl PrimitiveKind {
    /// Size in bytes
    pub const fn size(self) -> usize {
        match self {
            Self::Boolean | Self::I1 | Self::U1 => 1,
            Self::Char | Self::I2 | Self::U2 => 2,
            Self::I4 | Self::U4 | Self::R4 => 4,
            Self::I8 | Self::U8 | Self::R8 => 8,
            Self::I | Self::U => core::mem::size_of::<usize>(),
        }
    }

    #[inline]
    pub const fn is_integral(self) -> bool {
        matches!(
            self,
            Self::I1 | Self::U1 | Self::I2 | Self::U2 | Self::I4 | Self::U4 | Self::I8 | Self::U8 | Self::I | Self::U
        )
    }

    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::R4 | Self::R8)
    }

    /// Full managed type name
    pub const fn type_name(self) -> &'static str {
        match self {
            Self::Boolean => "System.Boolean",
            Self::Char => "System.Char",
            Self::I1 => "System.SByte",
            Self::U1 => "System.Byte",
            Self::I2 => "System.Int16",
            Self::U2 => "System.UInt16",
            Self::I4 => "System.Int32",
            Self::U4 => "System.UInt32",
            Self::I8 => "System.Int64",
            Self::U8 => "System.UInt64",
            Self::R4 => "System.Single",
            Self::R8 => "System.Double",
            Self::I => "System.IntPtr",
            Self::U => "System.UIntPtr",
        }
    }

    /// Primitive kind for an element type code
    pub const fn from_element_type(code: u8) -> Option<Self> {
        match code {
            ELEMENT_TYPE::BOOLEAN => Some(Self::Boolean),
            ELEMENT_TYPE::CHAR => Some(Self::Char),
            ELEMENT_TYPE::I1 => Some(Self::I1),
            ELEMENT_TYPE::U1 => Some(Self::U1),
            ELEMENT_TYPE::I2 => Some(Self::I2),
            ELEMENT_TYPE::U2 => Some(Self::U2),
            ELEMENT_TYPE::I4 => Some(Self::I4),
            ELEMENT_TYPE::U4 => Some(Self::U4),
            ELEMENT_TYPE::I8 => Some(Self::I8),
            ELEMENT_TYPE::U8 => Some(Self::U8),
            ELEMENT_TYPE::R4 => Some(Self::R4),
            ELEMENT_TYPE::R8 => Some(Self::R8),
            ELEMENT_TYPE::I => Some(Self::I),
            ELEMENT_TYPE::U => Some(Self::U),
            _ => None,
        }
    }
}

/// Category of a managed type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Void,
    Primitive(PrimitiveKind),
    /// Enumeration backed by an integral primitive
    Enum { underlying: PrimitiveKind },
    String,
    /// Value type, copied field by field
    ValueType { fields: Vec<ManagedTypeDescriptor> },
    /// Reference type. `native_class` is set when the managed type wraps a
    /// native class, i.e. every instance carries a native object.
    Class { native_class: Option<String> },
    /// Instantiation of a generic definition
    GenericInstance {
        definition: Box<ManagedTypeDescriptor>,
        arguments: Vec<ManagedTypeDescriptor>,
    },
    /// Category code this bridge does not know how to convert
    Unrecognized { code: u8 },
}

/// Read-only description of a managed type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ManagedTypeDescriptor {
    name: String,
    kind: TypeKind,
}

impl ManagedTypeDescriptor {
    /// Descriptor with an explicit name and kind
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn void() -> Self {
        Self::new("System.Void", TypeKind::Void)
    }

    pub fn primitive(kind: PrimitiveKind) -> Self {
        Self::new(kind.type_name(), TypeKind::Primitive(kind))
    }

    pub fn string() -> Self {
        Self::new("System.String", TypeKind::String)
    }

    /// Enumeration; `underlying` must be integral
    pub fn enumeration(name: impl Into<String>, underlying: PrimitiveKind) -> Self {
        debug_assert!(underlying.is_integral(), "enum backed by non-integral type");
        Self::new(name, TypeKind::Enum { underlying })
    }

    pub fn value_type(name: impl Into<String>, fields: Vec<ManagedTypeDescriptor>) -> Self {
        Self::new(name, TypeKind::ValueType { fields })
    }

    /// Managed type wrapping the native class `native_class`
    pub fn native_class(name: impl Into<String>, native_class: impl Into<String>) -> Self {
        Self::new(
            name,
            TypeKind::Class {
                native_class: Some(native_class.into()),
            },
        )
    }

    /// Reference type with no native counterpart
    pub fn managed_class(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Class { native_class: None })
    }

    /// Instantiation of `definition` with `arguments`
    pub fn generic(definition: ManagedTypeDescriptor, arguments: Vec<ManagedTypeDescriptor>) -> Self {
        let name = definition.name.clone();
        Self::new(
            name,
            TypeKind::GenericInstance {
                definition: Box::new(definition),
                arguments,
            },
        )
    }

    /// `System.Nullable<inner>`
    pub fn nullable(inner: ManagedTypeDescriptor) -> Self {
        Self::generic(
            Self::value_type(NULLABLE_DEFINITION, Vec::new()),
            vec![inner],
        )
    }

    /// Descriptor from a raw element type code
    ///
    /// Composite codes (pointers, arrays, generic instantiations, generic
    /// parameters) carry more structure than a code and a name can express;
    /// they, and any unknown code, produce [`TypeKind::Unrecognized`].
    pub fn from_element_type(code: u8, name: impl Into<String>) -> Self {
        let name = name.into();

        if let Some(kind) = PrimitiveKind::from_element_type(code) {
            return Self::primitive(kind);
        }

        let kind = match code {
            ELEMENT_TYPE::VOID => return Self::void(),
            ELEMENT_TYPE::STRING => return Self::string(),
            ELEMENT_TYPE::OBJECT => return Self::managed_class("System.Object"),
            ELEMENT_TYPE::CLASS => TypeKind::Class { native_class: None },
            ELEMENT_TYPE::VALUETYPE => TypeKind::ValueType { fields: Vec::new() },
            other => TypeKind::Unrecognized { code: other },
        };

        Self::new(name, kind)
    }

    /// Name of the type (for generics, the definition's name)
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    /// Name including generic arguments, e.g.
    /// ``System.Collections.Generic.List`1[System.Int32]``
    pub fn full_name(&self) -> String {
        match &self.kind {
            TypeKind::GenericInstance { arguments, .. } => {
                let args: Vec<String> = arguments.iter().map(Self::full_name).collect();
                format!("{}[{}]", self.name, args.join(","))
            }
            _ => self.name.clone(),
        }
    }

    /// Short label of the category, for diagnostics
    pub fn category(&self) -> String {
        match &self.kind {
            TypeKind::Void => "void".into(),
            TypeKind::Primitive(_) => "primitive".into(),
            TypeKind::Enum { .. } => "enum".into(),
            TypeKind::String => "string".into(),
            TypeKind::ValueType { .. } => "valuetype".into(),
            TypeKind::Class { native_class: Some(_) } => "native-backed class".into(),
            TypeKind::Class { native_class: None } => "managed class".into(),
            TypeKind::GenericInstance { .. } => "generic instance".into(),
            TypeKind::Unrecognized { code } => format!("element type 0x{:02x}", code),
        }
    }

    /// Whether this is the nullable wrapper around a single argument
    pub fn nullable_argument(&self) -> Option<&ManagedTypeDescriptor> {
        match &self.kind {
            TypeKind::GenericInstance {
                definition,
                arguments,
            } if definition.name == NULLABLE_DEFINITION && arguments.len() == 1 => arguments.first(),
            _ => None,
        }
    }
}

impl fmt::Display for ManagedTypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}
