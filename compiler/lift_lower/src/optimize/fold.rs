//! Load and store folding within one block.

use rustc_hash::FxHashSet;

use super::OptimizeStats;
use crate::cil::{BasicBlock, Instruction, TargetType, VarId, VariableTable};

/// One applicable rewrite, found before the block is mutated.
#[derive(Debug)]
enum Fold {
    /// Replace `[at - 1, at]` with one instruction.
    Load { at: usize, with: Instruction },
    /// Remove the address producer at `producer`, replace `at`.
    Store {
        producer: usize,
        at: usize,
        with: Instruction,
    },
    /// Remove `[at - 1, at]`.
    DeadPush { at: usize },
}

/// Fold `instructions` to a fixed point. Returns the number of rewrites.
pub(super) fn fold_block(
    vars: &VariableTable,
    temporaries: &FxHashSet<VarId>,
    instructions: &mut Vec<Instruction>,
    stats: &mut OptimizeStats,
) -> usize {
    let mut applied = 0;
    while let Some(fold) = find_fold(vars, temporaries, instructions) {
        tracing::trace!(?fold, "peephole fold");
        match fold {
            Fold::Load { at, with } => {
                instructions[at] = with;
                instructions.remove(at - 1);
                stats.load_folds += 1;
            }
            Fold::Store { producer, at, with } => {
                instructions[at] = with;
                instructions.remove(producer);
                stats.store_folds += 1;
            }
            Fold::DeadPush { at } => {
                instructions.drain(at - 1..=at);
                stats.pops_removed += 1;
            }
        }
        applied += 1;
    }
    applied
}

fn find_fold(
    vars: &VariableTable,
    temporaries: &FxHashSet<VarId>,
    instructions: &[Instruction],
) -> Option<Fold> {
    let foldable = |var: VarId, ty: &TargetType, store: bool| {
        let v = vars.get(var);
        let direct = if store {
            v.supports_store()
        } else {
            v.supports_load()
        };
        temporaries.contains(&var) && direct && v.ty.compatible_with(ty)
    };

    for (at, instruction) in instructions.iter().enumerate() {
        let previous = at.checked_sub(1).map(|p| &instructions[p]);
        match (previous, instruction) {
            (Some(Instruction::AddressOf(var)), Instruction::LoadIndirect(ty))
                if foldable(*var, ty, false) =>
            {
                return Some(Fold::Load {
                    at,
                    with: Instruction::Load(*var),
                });
            }
            (Some(Instruction::FieldAddress(field)), Instruction::LoadIndirect(ty))
                if field.ty.compatible_with(ty) =>
            {
                return Some(Fold::Load {
                    at,
                    with: Instruction::LoadField(field.clone()),
                });
            }
            (
                Some(Instruction::Load(_) | Instruction::AddressOf(_) | Instruction::SizeOf(_)),
                Instruction::Pop,
            ) => return Some(Fold::DeadPush { at }),
            (_, Instruction::StoreIndirect(ty)) => {
                let Some(producer) = address_producer(instructions, at) else {
                    continue;
                };
                let with = match &instructions[producer] {
                    Instruction::AddressOf(var) if foldable(*var, ty, true) => {
                        Instruction::Store(*var)
                    }
                    Instruction::FieldAddress(field) if field.ty.compatible_with(ty) => {
                        Instruction::StoreField(field.clone())
                    }
                    _ => continue,
                };
                return Some(Fold::Store { producer, at, with });
            }
            _ => {}
        }
    }
    None
}

/// Index of the instruction that pushed the address consumed by the
/// `StoreIndirect` at `at`: the value two slots down.
#[expect(clippy::cast_possible_wrap, reason = "stack counts are tiny")]
fn address_producer(instructions: &[Instruction], at: usize) -> Option<usize> {
    let mut depth: i32 = 2;
    for index in (0..at).rev() {
        let instruction = &instructions[index];
        if instruction.is_height_dependent() {
            return None;
        }
        depth -= instruction.push_count() as i32;
        if depth == 0 {
            return Some(index);
        }
        if depth < 0 {
            return None;
        }
        depth += instruction.pop_count() as i32;
    }
    None
}

/// Indirect accesses remaining in `blocks`.
pub(super) fn count_indirect(blocks: &[BasicBlock]) -> usize {
    blocks
        .iter()
        .flat_map(|b| &b.instructions)
        .filter(|i| matches!(i, Instruction::LoadIndirect(_) | Instruction::StoreIndirect(_)))
        .count()
}
