//! Labeled target basic blocks.

use std::fmt;

use lift_ir::BlockId;

use super::instr::Instruction;

/// Label of a target block. Also its index in the function's block list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct LabelId(u32);

impl LabelId {
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

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// A label plus an ordered instruction list.
///
/// Blocks lowered from a source block record it in `origin`; blocks the
/// lowering synthesizes (phi detours, dispatch chains) have none and are
/// otherwise treated identically.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct BasicBlock {
    pub label: LabelId,
    pub origin: Option<BlockId>,
    pub instructions: Vec<Instruction>,
}

impl BasicBlock {
    pub fn new(label: LabelId, origin: Option<BlockId>) -> Self {
        Self {
            label,
            origin,
            instructions: Vec::new(),
        }
    }

    #[inline]
    pub fn push(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn is_synthesized(&self) -> bool {
        self.origin.is_none()
    }

    /// Net stack effect of the whole block.
    pub fn stack_effect(&self) -> i32 {
        self.instructions.iter().map(Instruction::stack_effect).sum()
    }
}

impl fmt::Display for BasicBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:", self.label)?;
        for instruction in &self.instructions {
            writeln!(f, "    {instruction}")?;
        }
        Ok(())
    }
}
