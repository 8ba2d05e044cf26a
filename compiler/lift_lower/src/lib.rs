//! Lowering of SSA control-flow graphs to stack-machine basic blocks.
//!
//! This crate provides:
//!
//! - **Target model** ([`cil`]): [`Instruction`]s with declared stack
//!   effects, [`BasicBlock`]s, and per-function [`VariableTable`]s.
//!
//! - **Lowering** ([`lift_function`], [`initialize_global`]): one function
//!   or global initializer from [`lift_ir`] to target blocks, including phi
//!   resolution, `switch` tables, calls, and funclet exception handling.
//!
//! - **Peephole optimization** ([`optimize_function`]): load/store folding
//!   of single-block temporaries to a fixed point.
//!
//! - **Verification and emission** ([`verify_blocks`], [`emit_function`]).
//!
//! - **Module driver** ([`lift_module`]): might-throw analysis, then every
//!   function in parallel.
//!
//! # Type Questions
//!
//! Every type mapping and size query goes through a [`TypeOracle`], so the
//! lowering itself carries no layout rules. [`NaturalLayout`] is the stock
//! implementation.
//!
//! # Crate Dependencies
//!
//! `lift_lower` depends on `lift_ir` for the source model and on
//! `lift_stack` to keep recursive constant lowering off the guard page.

pub mod cil;
mod emit;
mod error;
mod lower;
mod optimize;
mod options;
pub mod oracle;
mod pipeline;
mod throw_info;

#[cfg(feature = "cache")]
pub mod cache;

#[cfg(test)]
mod test_helpers;

pub use cil::{BasicBlock, Instruction, LabelId, Signature, TargetType, VarId, VariableTable};
pub use emit::{emit_function, verify_blocks, EmittedBody};
pub use error::{LowerError, LowerResult};
pub use lower::{initialize_global, lift_function, LiftedFunction, LiftedInitializer};
pub use optimize::{optimize_blocks, optimize_function, OptimizeStats};
pub use options::{LowerOptions, PeepholeLevel};
pub use oracle::{NaturalLayout, TypeOracle};
pub use pipeline::{lift_module, lower_function, LiftedModule};
pub use throw_info::ThrowInfo;

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Install a `tracing` subscriber filtered by `RUST_LOG`.
///
/// Does nothing when `RUST_LOG` is unset, and nothing after the first call.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(EnvFilter::from_default_env())
                .init();
        }
    });
}
