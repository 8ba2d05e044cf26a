//! Peephole optimizer over lowered blocks.
//!
//! Lowering always goes through addresses: a read of a local is
//! `AddressOf; LoadIndirect`, a write is `AddressOf; <value>; StoreIndirect`.
//! This pass rewrites those shapes into direct variable and field access
//! where it is safe, and drops the dead pushes left behind.
//!
//! # Rules
//!
//! - **Load fold.** `AddressOf(v); LoadIndirect(t)` becomes `Load(v)` when
//!   `v` is a temporary that supports direct loads and its type is
//!   compatible with `t`. `FieldAddress(f); LoadIndirect(t)` becomes
//!   `LoadField(f)` when the field type is compatible.
//! - **Store fold.** For `StoreIndirect(t)`, a backward scan finds the
//!   instruction that pushed the address (two values down). An `AddressOf`
//!   of a compatible temporary becomes a trailing `Store`; a
//!   `FieldAddress` becomes a trailing `StoreField`. The scan gives up at
//!   any height-dependent instruction.
//! - **Dead push.** `Load`, `AddressOf`, or `SizeOf` immediately followed
//!   by `Pop` are both removed.
//!
//! [`PeepholeLevel::Aggressive`] adds two cleanups:
//!
//! - An `Initialize(v)` of a temporary whose next reference is a `Store(v)`
//!   is removed.
//! - A temporary stored but never loaded has its stores turned into `Pop`.
//! - A temporary stored once and loaded once later in its block loses both
//!   instructions when the value can stay on the stack in between: the
//!   height right after the store equals the height right before the load,
//!   no height-dependent instruction sits between them, and nothing between
//!   them pops below the stored value.
//!
//! # Temporaries
//!
//! A variable is a temporary when it carries [`VarCaps::TEMPORARY`] and
//! every reference to it sits in one block. Folding only ever rewrites
//! temporaries, so no rewrite is visible across a branch. The set is
//! recomputed at the start of every round: the first round sees exactly
//! the variables classified before any rewrite, and later rounds pick up
//! variables whose references in other blocks were rewritten away.
//!
//! # Termination
//!
//! Every rule either shrinks the instruction count or, for a store turned
//! into `Pop`, keeps it and removes one `Store`. No rule adds a `Store`
//! without shrinking the count, so the rounds reach a fixed point. The
//! loop only stops after a round changes nothing, which makes a second
//! call a no-op.
//!
//! [`VarCaps::TEMPORARY`]: crate::cil::VarCaps::TEMPORARY

mod classify;
mod cleanup;
mod fold;

use crate::cil::{BasicBlock, VariableTable};
use crate::lower::LiftedFunction;
use crate::options::PeepholeLevel;

/// What one optimizer run changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OptimizeStats {
    pub load_folds: usize,
    pub store_folds: usize,
    pub pops_removed: usize,
    pub inits_removed: usize,
    pub forwarded: usize,
    /// Stores of never-loaded temporaries turned into `Pop`.
    pub stores_dropped: usize,
    /// Indirect accesses left in place after the last round.
    pub declined: usize,
}

impl OptimizeStats {
    /// Number of rewrites applied.
    pub fn changes(&self) -> usize {
        self.load_folds
            + self.store_folds
            + self.pops_removed
            + self.inits_removed
            + self.forwarded
            + self.stores_dropped
    }
}

/// Optimize a lowered function in place.
pub fn optimize_function(function: &mut LiftedFunction, level: PeepholeLevel) -> OptimizeStats {
    let stats = optimize_blocks(&function.variables, &mut function.blocks, level);
    if stats.changes() > 0 {
        tracing::debug!(
            function = %function.name,
            load_folds = stats.load_folds,
            store_folds = stats.store_folds,
            pops_removed = stats.pops_removed,
            inits_removed = stats.inits_removed,
            forwarded = stats.forwarded,
            stores_dropped = stats.stores_dropped,
            declined = stats.declined,
            "peephole",
        );
    }
    stats
}

/// Optimize `blocks`, whose variables live in `vars`.
pub fn optimize_blocks(
    vars: &VariableTable,
    blocks: &mut [BasicBlock],
    level: PeepholeLevel,
) -> OptimizeStats {
    let mut stats = OptimizeStats::default();
    if level == PeepholeLevel::None {
        return stats;
    }

    loop {
        let temporaries = classify::temporaries(vars, blocks);
        let mut round = 0;
        for block in blocks.iter_mut() {
            round += fold::fold_block(vars, &temporaries, &mut block.instructions, &mut stats);
        }
        if level == PeepholeLevel::Aggressive {
            round += cleanup::remove_redundant_initializations(&temporaries, blocks, &mut stats);
            round += cleanup::remove_temporaries(&temporaries, blocks, &mut stats);
        }
        if round == 0 {
            break;
        }
    }

    stats.declined = fold::count_indirect(blocks);
    stats
}
