//! Target-side types.

use std::fmt;

use lift_ir::TypeId;

/// A type as seen by the stack machine.
///
/// Aggregates keep a reference to their source struct type; the emitter
/// owns the mapping from that to a concrete type definition.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum TargetType {
    Void,
    Bool,
    I8,
    I16,
    I32,
    I64,
    I128,
    /// Pointer-sized integer.
    NativeInt,
    F32,
    F64,
    /// Unmanaged pointer.
    Pointer,
    Struct(TypeId),
    /// Fixed-length array stored inline.
    InlineArray { element: Box<TargetType>, len: u64 },
    /// The in-flight exception object.
    ExceptionInfo,
    /// Writable view over native-int slots.
    Span,
    /// Read-only view over native-int slots (variadic argument packs).
    ReadOnlySpan,
    Object,
}

impl TargetType {
    pub fn inline_array(element: TargetType, len: u64) -> Self {
        TargetType::InlineArray {
            element: Box::new(element),
            len,
        }
    }

    #[inline]
    pub fn is_void(&self) -> bool {
        matches!(self, TargetType::Void)
    }

    #[inline]
    pub fn is_pointer(&self) -> bool {
        matches!(self, TargetType::Pointer)
    }

    /// Whether a value of `self` may be accessed as `other` without a
    /// conversion. Any pointer is compatible with any pointer; everything
    /// else must match exactly.
    pub fn compatible_with(&self, other: &TargetType) -> bool {
        (self.is_pointer() && other.is_pointer()) || self == other
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetType::Void => f.write_str("void"),
            TargetType::Bool => f.write_str("bool"),
            TargetType::I8 => f.write_str("int8"),
            TargetType::I16 => f.write_str("int16"),
            TargetType::I32 => f.write_str("int32"),
            TargetType::I64 => f.write_str("int64"),
            TargetType::I128 => f.write_str("int128"),
            TargetType::NativeInt => f.write_str("nint"),
            TargetType::F32 => f.write_str("float32"),
            TargetType::F64 => f.write_str("float64"),
            TargetType::Pointer => f.write_str("void*"),
            TargetType::Struct(id) => write!(f, "struct#{}", id.raw()),
            TargetType::InlineArray { element, len } => write!(f, "InlineArray<{element}, {len}>"),
            TargetType::ExceptionInfo => f.write_str("ExceptionInfo"),
            TargetType::Span => f.write_str("Span<nint>"),
            TargetType::ReadOnlySpan => f.write_str("ReadOnlySpan<nint>"),
            TargetType::Object => f.write_str("object"),
        }
    }
}

/// Parameter and return types of a call site.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct Signature {
    pub params: Vec<TargetType>,
    pub ret: TargetType,
}

impl Signature {
    pub fn new(params: Vec<TargetType>, ret: TargetType) -> Self {
        Self { params, ret }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{p}")?;
        }
        write!(f, ") -> {}", self.ret)
    }
}
