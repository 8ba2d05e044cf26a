//! Storage locations addressed by target instructions.

use std::fmt;

use bitflags::bitflags;
use lift_ir::{FunctionId, GlobalId, ValueId};

use super::types::TargetType;

/// Variable ID within one lowered function.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct VarId(u32);

impl VarId {
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

bitflags! {
    /// What a variable can be used for.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
    #[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
    pub struct VarCaps: u8 {
        /// Value can be pushed directly.
        const LOAD = 1 << 0;
        /// Value can be popped into it directly.
        const STORE = 1 << 1;
        /// Address can be pushed.
        const LOAD_ADDRESS = 1 << 2;
        /// Candidate for peephole folding. Only a candidate: the optimizer
        /// still requires every reference to sit in a single block.
        const TEMPORARY = 1 << 3;
    }
}

/// Immediate constant loaded through a variable.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum Constant {
    I4(i32),
    I8(i64),
    /// `f32` bits.
    R4(u32),
    /// `f64` bits.
    R8(u64),
    Null,
    /// All-zero value of the variable's type.
    Default,
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::I4(v) => write!(f, "{v}"),
            Constant::I8(v) => write!(f, "{v}L"),
            Constant::R4(bits) => write!(f, "{:?}f", f32::from_bits(*bits)),
            Constant::R8(bits) => write!(f, "{:?}", f64::from_bits(*bits)),
            Constant::Null => f.write_str("null"),
            Constant::Default => f.write_str("default"),
        }
    }
}

/// Where a variable lives.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum VariableKind {
    /// Method-local slot.
    Local,
    /// Field of the function's heap-allocated frame; survives unwinding.
    FrameField { slot: u32 },
    Parameter { index: u32 },
    /// Static storage of a module global.
    Global(GlobalId),
    /// Load-only slot producing a function pointer.
    FunctionPointer(FunctionId),
    /// Load-only immediate.
    Constant(Constant),
    /// `ctx.current_exception`: the in-flight exception of the calling
    /// thread, reached through the execution-context argument.
    ExceptionSlot,
}

impl VariableKind {
    fn default_caps(&self) -> VarCaps {
        match self {
            VariableKind::Local => {
                VarCaps::LOAD | VarCaps::STORE | VarCaps::LOAD_ADDRESS | VarCaps::TEMPORARY
            }
            VariableKind::FrameField { .. }
            | VariableKind::Parameter { .. }
            | VariableKind::Global(_) => VarCaps::LOAD | VarCaps::STORE | VarCaps::LOAD_ADDRESS,
            VariableKind::FunctionPointer(_) | VariableKind::Constant(_) => VarCaps::LOAD,
            VariableKind::ExceptionSlot => VarCaps::LOAD | VarCaps::STORE,
        }
    }
}

/// A storage location.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct Variable {
    pub kind: VariableKind,
    pub ty: TargetType,
    pub caps: VarCaps,
    /// Source value this variable was created for, if any.
    pub origin: Option<ValueId>,
}

impl Variable {
    #[inline]
    pub fn supports_load(&self) -> bool {
        self.caps.contains(VarCaps::LOAD)
    }

    #[inline]
    pub fn supports_store(&self) -> bool {
        self.caps.contains(VarCaps::STORE)
    }

    #[inline]
    pub fn supports_load_address(&self) -> bool {
        self.caps.contains(VarCaps::LOAD_ADDRESS)
    }

    #[inline]
    pub fn is_temporary_candidate(&self) -> bool {
        self.caps.contains(VarCaps::TEMPORARY)
    }

    pub fn is_durable(&self) -> bool {
        matches!(self.kind, VariableKind::FrameField { .. })
    }
}

/// All variables of one lowered function.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct VariableTable {
    vars: Vec<Variable>,
    frame_slots: u32,
}

impl VariableTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable with the default capabilities of its kind.
    pub fn add(&mut self, kind: VariableKind, ty: TargetType, origin: Option<ValueId>) -> VarId {
        let caps = kind.default_caps();
        self.add_with_caps(kind, ty, caps, origin)
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "variable counts never exceed u32"
    )]
    pub fn add_with_caps(
        &mut self,
        kind: VariableKind,
        ty: TargetType,
        caps: VarCaps,
        origin: Option<ValueId>,
    ) -> VarId {
        let id = VarId::new(self.vars.len() as u32);
        self.vars.push(Variable {
            kind,
            ty,
            caps,
            origin,
        });
        id
    }

    pub fn local(&mut self, ty: TargetType, origin: Option<ValueId>) -> VarId {
        self.add(VariableKind::Local, ty, origin)
    }

    /// A local whose address escapes, so it never takes part in folding.
    pub fn pinned_local(&mut self, ty: TargetType, origin: Option<ValueId>) -> VarId {
        self.add_with_caps(
            VariableKind::Local,
            ty,
            VarCaps::LOAD | VarCaps::STORE | VarCaps::LOAD_ADDRESS,
            origin,
        )
    }

    pub fn frame_field(&mut self, ty: TargetType, origin: Option<ValueId>) -> VarId {
        let slot = self.frame_slots;
        self.frame_slots += 1;
        self.add(VariableKind::FrameField { slot }, ty, origin)
    }

    #[inline]
    pub fn get(&self, id: VarId) -> &Variable {
        &self.vars[id.index()]
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Number of frame fields allocated so far.
    pub fn frame_size(&self) -> u32 {
        self.frame_slots
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "variable counts never exceed u32"
    )]
    pub fn iter(&self) -> impl Iterator<Item = (VarId, &Variable)> {
        self.vars
            .iter()
            .enumerate()
            .map(|(i, v)| (VarId::new(i as u32), v))
    }

    /// First variable created for `value`.
    pub fn for_origin(&self, value: ValueId) -> Option<VarId> {
        self.iter()
            .find(|(_, v)| v.origin == Some(value))
            .map(|(id, _)| id)
    }
}
