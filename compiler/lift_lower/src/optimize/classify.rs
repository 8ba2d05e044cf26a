//! Temporary classification.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::cil::{BasicBlock, VarId, VariableTable};

/// Variables eligible for folding: flagged as temporary candidates and
/// referenced from exactly one block.
pub(super) fn temporaries(vars: &VariableTable, blocks: &[BasicBlock]) -> FxHashSet<VarId> {
    // `None` once seen in a second block.
    let mut home: FxHashMap<VarId, Option<usize>> = FxHashMap::default();
    for (index, block) in blocks.iter().enumerate() {
        for var in block.instructions.iter().filter_map(|i| i.variable()) {
            home.entry(var)
                .and_modify(|h| {
                    if *h != Some(index) {
                        *h = None;
                    }
                })
                .or_insert(Some(index));
        }
    }

    home.into_iter()
        .filter(|&(var, h)| h.is_some() && vars.get(var).is_temporary_candidate())
        .map(|(var, _)| var)
        .collect()
}

