//! Typed SSA source model for the stack-bytecode lowering pipeline.
//!
//! This crate provides:
//!
//! - **Types** ([`TypePool`], [`TypeId`], [`Type`]): structurally interned
//!   source types: integers of any width, floats, opaque pointers, arrays,
//!   vectors, structs, function types, and the `label`/`token`/`metadata`
//!   pseudo-types.
//!
//! - **Values** ([`ValueId`], [`Value`], [`ValueKind`]): one module-wide
//!   arena holding constants, constant expressions, globals, function
//!   references, arguments, and instructions. Every operand of every
//!   instruction is a `ValueId` (or a [`BlockId`] for branch targets).
//!
//! - **Module structure** ([`Module`], [`Function`], [`Block`], [`Global`]) :
//!   functions own ordered blocks, blocks own ordered instruction values.
//!   A function with no blocks is a declaration.
//!
//! - **Construction** ([`ModuleBuilder`]): "position at a block, emit
//!   instructions" builder used by front ends and tests.
//!
//! # Operand Order
//!
//! Operand lists follow the native IR's layout rather than a normalized
//! one, so lowering can index them the same way the producer wrote them:
//!
//! | Opcode | Operands |
//! |---|---|
//! | `br` | `[target]` or `[cond, false_target, true_target]` |
//! | `switch` | `[index, default, (case_value, target)*]` |
//! | `phi` | `[(incoming_value, incoming_block)*]` |
//! | `store` | `[value, pointer]` |
//! | `call` | `[args.., callee]` |
//! | `invoke` | `[args.., normal_dest, unwind_dest, callee]` |
//! | `catchswitch` | `[parent, handlers.., unwind_dest?]` |
//! | `catchpad` | `[args.., catchswitch]` |
//! | `cleanuppad` | `[args.., parent]` |
//! | `catchret` | `[pad, target]` |
//! | `cleanupret` | `[pad, unwind_dest?]` |

mod builder;
mod display;
mod module;
mod opcode;
mod types;
mod value;

pub use builder::ModuleBuilder;
pub use display::{TypeDisplay, ValueDisplay};
pub use module::{Block, Function, Global, Module};
pub use opcode::{BinaryOp, CastOp, FloatPredicate, IntPredicate, Opcode};
pub use types::{Type, TypeId, TypePool};
pub use value::{
    BlockId, ConstExpr, FunctionId, GlobalId, Instruction, Operand, OperandList, Value, ValueId,
    ValueKind,
};
