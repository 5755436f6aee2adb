//! Native-side representations
//!
//! What the native caller receives from a conversion, and the ownership it
//! gets with it.

use super::hint::ScalarType;
use super::value::{ManagedObject, ManagedString};
use core::fmt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Who is responsible for the produced native value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ownership {
    /// Valid for the current call frame only; the caller must not release it
    Borrowed,
    /// The caller owns one reference and must release it exactly once
    Retained,
    /// Plain value copy; nothing to release
    Copied,
}

/// Native scalar value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NativeScalar {
    Bool(bool),
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
    Pointer(usize),
}

impl NativeScalar {
    /// Build a scalar of type `ty` from raw bits, truncating to its width
    pub fn from_bits(ty: ScalarType, bits: u64) -> Self {
        match ty {
            ScalarType::Bool => Self::Bool(bits != 0),
            ScalarType::Char => Self::I8(bits as u8 as i8),
            ScalarType::UChar => Self::U8(bits as u8),
            ScalarType::Short => Self::I16(bits as u16 as i16),
            ScalarType::UShort => Self::U16(bits as u16),
            ScalarType::Int | ScalarType::Long => Self::I32(bits as u32 as i32),
            ScalarType::UInt | ScalarType::ULong => Self::U32(bits as u32),
            ScalarType::LongLong => Self::I64(bits as i64),
            ScalarType::ULongLong => Self::U64(bits),
            ScalarType::Float => Self::F32(f32::from_bits(bits as u32)),
            ScalarType::Double => Self::F64(f64::from_bits(bits)),
            ScalarType::Pointer => Self::Pointer(bits as usize),
        }
    }

    /// Raw bits, zero-extended to 64 bits
    pub fn to_bits(&self) -> u64 {
        match *self {
            Self::Bool(b) => b as u64,
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
            Self::Pointer(v) => v as u64,
        }
    }

    /// Size in bytes
    pub const fn size(&self) -> usize {
        match self {
            Self::Bool(_) | Self::I8(_) | Self::U8(_) => 1,
            Self::I16(_) | Self::U16(_) => 2,
            Self::I32(_) | Self::U32(_) | Self::F32(_) => 4,
            Self::I64(_) | Self::U64(_) | Self::F64(_) => 8,
            Self::Pointer(_) => core::mem::size_of::<usize>(),
        }
    }
}

/// Native string
///
/// A borrowed string shares the managed string's storage; a retained one
/// owns an independent copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeString {
    data: Arc<str>,
}

impl NativeString {
    /// Share `managed`'s storage
    pub(crate) fn borrowed(managed: &ManagedString) -> Self {
        Self {
            data: Arc::clone(managed.storage()),
        }
    }

    /// Independent copy of `managed`
    pub(crate) fn copied(managed: &ManagedString) -> Self {
        Self {
            data: Arc::from(managed.as_str()),
        }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.data
    }

    /// Whether this string is backed by `managed`'s storage
    pub fn shares_storage_with(&self, managed: &ManagedString) -> bool {
        Arc::ptr_eq(&self.data, managed.storage())
    }
}

/// Native struct copied out of a managed value type
#[derive(Debug, Clone, PartialEq)]
pub struct NativeStruct {
    pub name: String,
    /// Scalar fields in memory order, nested structs flattened
    pub fields: Vec<NativeScalar>,
}

enum ObjectKind {
    /// Object created and owned by native code
    Plain,
    /// Forwards to a managed object
    Proxy(ManagedObject),
}

struct NativeObjectInner {
    class_name: String,
    retain_count: AtomicU32,
    properties: Mutex<HashMap<String, NativeScalar>>,
    kind: ObjectKind,
}

/// Reference-counted native object
///
/// Clones of this handle are the same object. The explicit retain count is
/// the native object's own count, separate from the handle clones.
#[derive(Clone)]
pub struct NativeObject(Arc<NativeObjectInner>);

impl NativeObject {
    /// New native object with a retain count of 1
    pub fn new(class_name: impl Into<String>) -> Self {
        Self::with_kind(class_name.into(), ObjectKind::Plain)
    }

    /// New proxy forwarding to `target`, with a retain count of 1
    pub(crate) fn proxy(class_name: impl Into<String>, target: ManagedObject) -> Self {
        Self::with_kind(class_name.into(), ObjectKind::Proxy(target))
    }

    fn with_kind(class_name: String, kind: ObjectKind) -> Self {
        trace!(event = "native_object_new", class = %class_name);
        Self(Arc::new(NativeObjectInner {
            class_name,
            retain_count: AtomicU32::new(1),
            properties: Mutex::new(HashMap::new()),
            kind,
        }))
    }

    #[inline]
    pub fn class_name(&self) -> &str {
        &self.0.class_name
    }

    /// Increment the retain count, returning the new count
    #[inline]
    pub fn retain(&self) -> u32 {
        let old = self.0.retain_count.fetch_add(1, Ordering::Relaxed);
        debug_assert!(old < u32::MAX, "retain count overflow");
        old + 1
    }

    /// Decrement the retain count, returning the new count
    ///
    /// Reaching zero deallocates the object from the native side's point of
    /// view; the handle stays valid for inspection.
    pub fn release(&self) -> u32 {
        let old = self.0.retain_count.fetch_sub(1, Ordering::Release);
        debug_assert!(old > 0, "retain count underflow");

        if old == 1 {
            std::sync::atomic::fence(Ordering::Acquire);
            trace!(event = "native_object_dealloc", class = %self.0.class_name);
        }
        old - 1
    }

    /// Current retain count
    #[inline]
    pub fn retain_count(&self) -> u32 {
        self.0.retain_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_deallocated(&self) -> bool {
        self.retain_count() == 0
    }

    pub fn set_property(&self, key: impl Into<String>, value: NativeScalar) {
        self.0.properties.lock().insert(key.into(), value);
    }

    pub fn property(&self, key: &str) -> Option<NativeScalar> {
        self.0.properties.lock().get(key).copied()
    }

    #[inline]
    pub fn is_proxy(&self) -> bool {
        matches!(self.0.kind, ObjectKind::Proxy(_))
    }

    /// Managed object a proxy forwards to
    pub fn proxy_target(&self) -> Option<&ManagedObject> {
        match &self.0.kind {
            ObjectKind::Proxy(target) => Some(target),
            ObjectKind::Plain => None,
        }
    }

    /// Whether both handles refer to the same native object
    #[inline]
    pub fn same_object(&self, other: &NativeObject) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for NativeObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeObject")
            .field("class", &self.0.class_name)
            .field("retain_count", &self.retain_count())
            .field("proxy", &self.is_proxy())
            .finish()
    }
}

/// Result of converting one managed value
#[derive(Debug, Clone)]
pub enum NativeRepresentation {
    /// Native absence of value (nil / NULL)
    Absent,
    Scalar(NativeScalar),
    String(NativeString),
    Struct(NativeStruct),
    Object(NativeObject),
}

impl NativeRepresentation {
    #[inline]
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    pub fn as_scalar(&self) -> Option<NativeScalar> {
        match self {
            Self::Scalar(s) => Some(*s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&NativeObject> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&NativeStruct> {
        match self {
            Self::Struct(s) => Some(s),
            _ => None,
        }
    }
}
