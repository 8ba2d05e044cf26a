//! Stack-machine target model.
//!
//! - **[`Instruction`]**: closed set of target instructions, each with a
//!   declared `pop_count`/`push_count`.
//! - **[`BasicBlock`]**: a [`LabelId`] plus an ordered instruction list.
//! - **[`Variable`]**: a storage location with [`VarCaps`] capability flags,
//!   owned by a per-function [`VariableTable`].
//! - **[`TargetType`]**: types as the stack machine sees them.

mod block;
mod instr;
mod types;
mod variable;

pub use block::{BasicBlock, LabelId};
pub use instr::{BinaryOp, CallTarget, Comparison, FieldRef, Helper, Instruction};
pub use types::{Signature, TargetType};
pub use variable::{Constant, VarCaps, VarId, Variable, VariableKind, VariableTable};
