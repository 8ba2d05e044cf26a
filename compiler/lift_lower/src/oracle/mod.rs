//! Type and layout queries.
//!
//! Lowering never decides on its own how a source type maps to a target
//! type or how large an aggregate is. It asks a [`TypeOracle`]. Front ends
//! with their own layout rules implement the trait; [`NaturalLayout`] is a
//! stateless implementation with natural alignment and runtime-sized
//! pointers.

use lift_ir::{FunctionId, Module, Type, TypeId};

use crate::cil::{Signature, TargetType};

/// Answers type mapping, layout, and intrinsic questions for lowering.
///
/// Implementations must be `Sync`: one oracle is shared by every function
/// lowered in parallel.
pub trait TypeOracle: Sync {
    /// Target type for a source type, or `None` if it has no value form.
    fn lower_type(&self, module: &Module, ty: TypeId) -> Option<TargetType>;

    /// Size in bytes, or `None` if it is only known at run time.
    fn size_of(&self, module: &Module, ty: TypeId) -> Option<u64>;

    /// Whether `function` is implemented by the runtime rather than by a
    /// lowered body.
    fn is_intrinsic(&self, module: &Module, function: FunctionId) -> bool;

    /// Whether an intrinsic can raise an exception.
    fn intrinsic_may_throw(&self, module: &Module, function: FunctionId) -> bool;

    /// Type of member `index` of an aggregate.
    fn field_type(&self, module: &Module, aggregate: TypeId, index: u32) -> Option<TypeId> {
        module.types.member_type(aggregate, index)
    }

    /// Call-site signature for a source function type. Variadic functions
    /// take their trailing arguments as one final read-only view.
    fn signature(&self, module: &Module, function_type: TypeId) -> Option<Signature> {
        let (ret, params, variadic) = module.types.function_parts(function_type)?;
        let mut lowered = params
            .iter()
            .map(|&p| self.lower_type(module, p))
            .collect::<Option<Vec<_>>>()?;
        if variadic {
            lowered.push(TargetType::ReadOnlySpan);
        }
        Some(Signature::new(lowered, self.lower_type(module, ret)?))
    }
}

/// Runtime routines treated as intrinsics by [`NaturalLayout`].
const RUNTIME_INTRINSICS: &[&str] = &[
    "__CxxFrameHandler3",
    "__gxx_personality_v0",
    "_CxxThrowException",
    "__cxa_throw",
    "__cxa_rethrow",
    "__std_terminate",
];

/// Intrinsics that raise an exception.
const THROWING_INTRINSICS: &[&str] = &["_CxxThrowException", "__cxa_throw", "__cxa_rethrow"];

/// Natural-alignment layout with runtime-sized pointers.
///
/// - `i1` lowers to `bool`, other integers to the matching fixed width.
/// - Arrays and vectors lower to inline arrays.
/// - Structs keep their source identity.
/// - Pointers have no compile-time size, so any aggregate containing one is
///   sized at run time.
#[derive(Clone, Copy, Debug, Default)]
pub struct NaturalLayout;

impl NaturalLayout {
    /// Size and alignment, both in bytes.
    fn layout(module: &Module, ty: TypeId) -> Option<(u64, u64)> {
        match module.types.get(ty) {
            Type::Int { bits } => {
                let bytes = u64::from(bits.div_ceil(8)).next_power_of_two();
                Some((bytes, bytes.min(16)))
            }
            Type::Float => Some((4, 4)),
            Type::Double => Some((8, 8)),
            Type::Array { element, len } | Type::Vector { element, len } => {
                let (size, align) = Self::layout(module, *element)?;
                Some((size.checked_mul(*len)?, align))
            }
            Type::Struct { fields, .. } => {
                let mut offset = 0u64;
                let mut max_align = 1u64;
                for &field in fields {
                    let (size, align) = Self::layout(module, field)?;
                    offset = offset.next_multiple_of(align) + size;
                    max_align = max_align.max(align);
                }
                Some((offset.next_multiple_of(max_align), max_align))
            }
            Type::Ptr
            | Type::Void
            | Type::Function { .. }
            | Type::Label
            | Type::Token
            | Type::Metadata => None,
        }
    }
}

impl TypeOracle for NaturalLayout {
    fn lower_type(&self, module: &Module, ty: TypeId) -> Option<TargetType> {
        Some(match module.types.get(ty) {
            Type::Void => TargetType::Void,
            Type::Int { bits: 1 } => TargetType::Bool,
            Type::Int { bits: 8 } => TargetType::I8,
            Type::Int { bits: 16 } => TargetType::I16,
            Type::Int { bits: 32 } => TargetType::I32,
            Type::Int { bits: 64 } => TargetType::I64,
            Type::Int { bits: 128 } => TargetType::I128,
            Type::Int { .. } => return None,
            Type::Float => TargetType::F32,
            Type::Double => TargetType::F64,
            Type::Ptr => TargetType::Pointer,
            Type::Array { element, len } | Type::Vector { element, len } => {
                TargetType::inline_array(self.lower_type(module, *element)?, *len)
            }
            Type::Struct { .. } => TargetType::Struct(ty),
            Type::Token => TargetType::ExceptionInfo,
            Type::Metadata => TargetType::Object,
            Type::Function { .. } | Type::Label => return None,
        })
    }

    fn size_of(&self, module: &Module, ty: TypeId) -> Option<u64> {
        Self::layout(module, ty).map(|(size, _)| size)
    }

    fn is_intrinsic(&self, module: &Module, function: FunctionId) -> bool {
        let f = module.function(function);
        f.is_declaration()
            && (f.name.starts_with("llvm.") || RUNTIME_INTRINSICS.contains(&f.name.as_str()))
    }

    fn intrinsic_may_throw(&self, module: &Module, function: FunctionId) -> bool {
        THROWING_INTRINSICS.contains(&module.function(function).name.as_str())
    }
}
