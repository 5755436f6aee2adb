//! Managed values as seen by the bridge
//!
//! Handles to values owned by the managed runtime. The bridge reads them and
//! never extends their lifetime except through the explicit retaining paths
//! of the engine.

use super::descriptor::PrimitiveKind;
use super::native::NativeObject;
use core::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_VALUE_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a managed value handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(u64);

impl ValueId {
    fn next() -> Self {
        Self(NEXT_VALUE_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Unboxed primitive value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Char(u16),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    IntPtr(isize),
    UIntPtr(usize),
}

impl Scalar {
    /// Primitive kind of this scalar
    pub const fn kind(&self) -> PrimitiveKind {
        match self {
            Self::Bool(_) => PrimitiveKind::Boolean,
            Self::Char(_) => PrimitiveKind::Char,
            Self::I8(_) => PrimitiveKind::I1,
            Self::U8(_) => PrimitiveKind::U1,
            Self::I16(_) => PrimitiveKind::I2,
            Self::U16(_) => PrimitiveKind::U2,
            Self::I32(_) => PrimitiveKind::I4,
            Self::U32(_) => PrimitiveKind::U4,
            Self::I64(_) => PrimitiveKind::I8,
            Self::U64(_) => PrimitiveKind::U8,
            Self::F32(_) => PrimitiveKind::R4,
            Self::F64(_) => PrimitiveKind::R8,
            Self::IntPtr(_) => PrimitiveKind::I,
            Self::UIntPtr(_) => PrimitiveKind::U,
        }
    }

    /// Raw bits, zero-extended to 64 bits
    ///
    /// Signed values are truncated to their own width first, so `I8(-1)`
    /// yields `0xff`.
    pub fn to_bits(&self) -> u64 {
        match *self {
            Self::Bool(b) => b as u64,
            Self::Char(c) => c as u64,
            Self::I8(v) => v as u8 as u64,
            Self::U8(v) => v as u64,
            Self::I16(v) => v as u16 as u64,
            Self::U16(v) => v as u64,
            Self::I32(v) => v as u32 as u64,
            Self::U32(v) => v as u64,
            Self::I64(v) => v as u64,
            Self::U64(v) => v,
            Self::F32(v) => v.to_bits() as u64,
            Self::F64(v) => v.to_bits(),
            Self::IntPtr(v) => v as usize as u64,
            Self::UIntPtr(v) => v as u64,
        }
    }

    /// Numeric value of an integral scalar
    pub fn as_i128(&self) -> Option<i128> {
        match *self {
            Self::I8(v) => Some(v as i128),
            Self::U8(v) => Some(v as i128),
            Self::I16(v) => Some(v as i128),
            Self::U16(v) => Some(v as i128),
            Self::I32(v) => Some(v as i128),
            Self::U32(v) => Some(v as i128),
            Self::I64(v) => Some(v as i128),
            Self::U64(v) => Some(v as i128),
            Self::IntPtr(v) => Some(v as i128),
            Self::UIntPtr(v) => Some(v as i128),
            Self::Bool(_) | Self::Char(_) | Self::F32(_) | Self::F64(_) => None,
        }
    }
}

macro_rules! scalar_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Scalar {
                #[inline]
                fn from(v: $ty) -> Self {
                    Self::$variant(v)
                }
            }
        )*
    };
}

scalar_from! {
    bool => Bool,
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    isize => IntPtr,
    usize => UIntPtr,
}

/// Managed string storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedString(Arc<str>);

impl ManagedString {
    pub fn new(s: &str) -> Self {
        Self(Arc::from(s))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    pub(crate) fn storage(&self) -> &Arc<str> {
        &self.0
    }
}

struct ObjectInner {
    id: u64,
    class_name: String,
    native: Option<NativeObject>,
}

/// Reference to a managed object
///
/// Clones are the same object.
#[derive(Clone)]
pub struct ManagedObject(Arc<ObjectInner>);

impl ManagedObject {
    /// Pure managed object with no native counterpart
    pub fn new(class_name: impl Into<String>) -> Self {
        Self::with_native(class_name, None)
    }

    /// Managed wrapper around a pre-existing native object
    pub fn wrapping(class_name: impl Into<String>, native: NativeObject) -> Self {
        Self::with_native(class_name, Some(native))
    }

    fn with_native(class_name: impl Into<String>, native: Option<NativeObject>) -> Self {
        Self(Arc::new(ObjectInner {
            id: NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed),
            class_name: class_name.into(),
            native,
        }))
    }

    #[inline]
    pub fn object_id(&self) -> u64 {
        self.0.id
    }

    #[inline]
    pub fn class_name(&self) -> &str {
        &self.0.class_name
    }

    /// Native object this wrapper carries, if any
    #[inline]
    pub fn native_object(&self) -> Option<&NativeObject> {
        self.0.native.as_ref()
    }

    /// Whether both references point at the same managed object
    #[inline]
    pub fn same_object(&self, other: &ManagedObject) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ManagedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedObject")
            .field("id", &self.0.id)
            .field("class", &self.0.class_name)
            .field("native_backed", &self.0.native.is_some())
            .finish()
    }
}

/// Contents of a managed value
#[derive(Debug, Clone)]
pub enum ManagedData {
    /// The "no value" marker (null reference or empty nullable)
    Null,
    Scalar(Scalar),
    String(ManagedString),
    /// Value type fields in declaration order
    Struct(Vec<ManagedData>),
    Object(ManagedObject),
}

/// Handle to one managed value
///
/// Clones share the [`ValueId`]: they are the same handle.
#[derive(Debug, Clone)]
pub struct ManagedValue {
    id: ValueId,
    data: ManagedData,
}

impl ManagedValue {
    pub fn new(data: ManagedData) -> Self {
        Self {
            id: ValueId::next(),
            data,
        }
    }

    /// The "no value" marker
    pub fn null() -> Self {
        Self::new(ManagedData::Null)
    }

    pub fn scalar(value: impl Into<Scalar>) -> Self {
        Self::new(ManagedData::Scalar(value.into()))
    }

    /// UTF-16 `char`
    pub fn char16(unit: u16) -> Self {
        Self::new(ManagedData::Scalar(Scalar::Char(unit)))
    }

    pub fn string(s: &str) -> Self {
        Self::new(ManagedData::String(ManagedString::new(s)))
    }

    pub fn structure(fields: Vec<ManagedData>) -> Self {
        Self::new(ManagedData::Struct(fields))
    }

    pub fn object(object: ManagedObject) -> Self {
        Self::new(ManagedData::Object(object))
    }

    #[inline]
    pub fn id(&self) -> ValueId {
        self.id
    }

    #[inline]
    pub fn data(&self) -> &ManagedData {
        &self.data
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self.data, ManagedData::Null)
    }
}
