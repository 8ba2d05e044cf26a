//! Aggressive cleanups over temporaries.

use rustc_hash::{FxHashMap, FxHashSet};

use super::OptimizeStats;
use crate::cil::{BasicBlock, Instruction, VarId};

/// Drop `Initialize(v)` when the next reference to `v` overwrites it.
pub(super) fn remove_redundant_initializations(
    temporaries: &FxHashSet<VarId>,
    blocks: &mut [BasicBlock],
    stats: &mut OptimizeStats,
) -> usize {
    let mut removed = 0;
    for block in blocks.iter_mut() {
        let instructions = &mut block.instructions;
        let mut at = 0;
        while at < instructions.len() {
            let redundant = match instructions[at] {
                Instruction::Initialize(var) if temporaries.contains(&var) => {
                    overwritten_before_use(&instructions[at + 1..], var)
                }
                _ => false,
            };
            if redundant {
                instructions.remove(at);
                removed += 1;
            } else {
                at += 1;
            }
        }
    }
    stats.inits_removed += removed;
    removed
}

fn overwritten_before_use(rest: &[Instruction], var: VarId) -> bool {
    for instruction in rest {
        if instruction.is_height_dependent() {
            return false;
        }
        if instruction.variable() == Some(var) {
            return matches!(instruction, Instruction::Store(_));
        }
    }
    false
}

/// Loads and stores of one temporary within its block.
#[derive(Clone, Copy, Debug, Default)]
struct Usage {
    loads: usize,
    stores: usize,
    load_at: usize,
    store_at: usize,
}

/// Remove temporaries that only carry a value from one stack position to
/// the same position later on:
///
/// - a temporary that is stored but never loaded has its stores turned
///   into `Pop`;
/// - a temporary stored once and loaded once afterwards loses both
///   instructions when the stack is as high right after the store as right
///   before the load, nothing height dependent sits between them, and
///   nothing between them reaches down to the stored value.
///
/// Temporaries whose address is taken or that are initialized in place are
/// left alone.
pub(super) fn remove_temporaries(
    temporaries: &FxHashSet<VarId>,
    blocks: &mut [BasicBlock],
    stats: &mut OptimizeStats,
) -> usize {
    blocks
        .iter_mut()
        .map(|block| remove_in_block(temporaries, &mut block.instructions, stats))
        .sum()
}

fn remove_in_block(
    temporaries: &FxHashSet<VarId>,
    instructions: &mut Vec<Instruction>,
    stats: &mut OptimizeStats,
) -> usize {
    let mut usages: FxHashMap<VarId, Usage> = FxHashMap::default();
    let mut pinned: FxHashSet<VarId> = FxHashSet::default();
    // Stack height at each instruction once its operands are popped.
    let mut inner: Vec<i64> = Vec::with_capacity(instructions.len());
    let mut barriers = Vec::new();
    let mut height = 0i64;

    for (at, instruction) in instructions.iter().enumerate() {
        inner.push(height - i64::from(instruction.pop_count()));
        height += i64::from(instruction.stack_effect());
        if instruction.is_height_dependent() {
            barriers.push(at);
        }
        match instruction {
            Instruction::Load(var) | Instruction::Store(var)
                if temporaries.contains(var) && !pinned.contains(var) =>
            {
                let usage = usages.entry(*var).or_default();
                if matches!(instruction, Instruction::Load(_)) {
                    usage.loads += 1;
                    usage.load_at = at;
                } else {
                    usage.stores += 1;
                    usage.store_at = at;
                }
            }
            Instruction::AddressOf(var) | Instruction::Initialize(var)
                if temporaries.contains(var) =>
            {
                pinned.insert(*var);
                usages.remove(var);
            }
            _ => {}
        }
    }

    let mut candidates: Vec<(VarId, Usage)> = usages.into_iter().collect();
    candidates.sort_unstable_by_key(|&(var, _)| var);

    let mut changes = 0;
    let mut removed: Vec<usize> = Vec::new();
    for (var, usage) in candidates {
        if usage.loads == 0 {
            for instruction in instructions.iter_mut() {
                if *instruction == Instruction::Store(var) {
                    *instruction = Instruction::Pop;
                    stats.stores_dropped += 1;
                    changes += 1;
                }
            }
            continue;
        }

        let (store, load) = (usage.store_at, usage.load_at);
        if usage.loads != 1 || usage.stores != 1 || load < store || inner[load] != inner[store] {
            continue;
        }
        let between = store + 1..load;
        if barriers.iter().chain(&removed).any(|at| between.contains(at))
            || inner[between].iter().any(|&h| h < inner[store])
        {
            continue;
        }
        removed.extend([store, load]);
    }

    removed.sort_unstable();
    for &at in removed.iter().rev() {
        instructions.remove(at);
    }
    let forwarded = removed.len() / 2;
    stats.forwarded += forwarded;
    changes + forwarded
}
