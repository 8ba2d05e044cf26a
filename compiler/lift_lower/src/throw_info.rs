//! Might-throw analysis.
//!
//! A function *may throw* if it can return with an exception in flight. The
//! seeds are runtime intrinsics the oracle marks as throwing. From there a
//! fixed point spreads the property to every function that calls a thrower
//! directly or calls anything through a pointer.
//!
//! A module with no throwing intrinsics and no `invoke` anywhere cannot
//! observe exceptions at all, so the analysis short-circuits to "nothing
//! throws".
//!
//! Lowering uses the result in two places: a call inside a throwing function
//! is followed by a pending-exception check, and a throwing function that
//! has stack allocations keeps them in a heap frame so handlers can still
//! reach them during unwinding.

use lift_ir::{FunctionId, Module, Opcode};
use rustc_hash::FxHashSet;

use crate::oracle::TypeOracle;

/// Per-module might-throw facts.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ThrowInfo {
    may_throw: FxHashSet<FunctionId>,
    has_alloca: FxHashSet<FunctionId>,
}

impl ThrowInfo {
    /// Analyze every function in `module`.
    pub fn compute<O: TypeOracle + ?Sized>(module: &Module, oracle: &O) -> Self {
        let has_alloca: FxHashSet<FunctionId> = module
            .functions()
            .filter(|f| {
                f.blocks.iter().any(|b| {
                    module.block_instructions(f.id, b.id).any(|(_, inst)| {
                        matches!(inst.opcode, Opcode::Alloca { .. })
                    })
                })
            })
            .map(|f| f.id)
            .collect();

        let mut may_throw: FxHashSet<FunctionId> = module
            .functions()
            .filter(|f| {
                oracle.is_intrinsic(module, f.id) && oracle.intrinsic_may_throw(module, f.id)
            })
            .map(|f| f.id)
            .collect();

        let any_invoke = module.functions().any(|f| {
            f.blocks.iter().any(|b| {
                module
                    .block_instructions(f.id, b.id)
                    .any(|(_, inst)| matches!(inst.opcode, Opcode::Invoke { .. }))
            })
        });

        if may_throw.is_empty() && !any_invoke {
            tracing::debug!(
                module = %module.name,
                "no exception sources; skipping might-throw analysis"
            );
            return Self {
                may_throw,
                has_alloca,
            };
        }

        let mut rounds = 0usize;
        loop {
            rounds += 1;
            let newly: Vec<FunctionId> = module
                .functions()
                .filter(|f| !f.is_declaration() && !may_throw.contains(&f.id))
                .filter(|f| calls_thrower(module, f.id, &may_throw))
                .map(|f| f.id)
                .collect();
            if newly.is_empty() {
                break;
            }
            may_throw.extend(newly);
        }

        tracing::debug!(
            module = %module.name,
            throwing = may_throw.len(),
            rounds,
            "might-throw analysis",
        );

        Self {
            may_throw,
            has_alloca,
        }
    }

    /// Whether `function` can return with an exception in flight.
    pub fn may_throw(&self, function: FunctionId) -> bool {
        self.may_throw.contains(&function)
    }

    /// Whether `function` keeps its stack allocations in a heap frame.
    pub fn needs_stack_frame(&self, function: FunctionId) -> bool {
        self.may_throw(function) && self.has_alloca.contains(&function)
    }

    pub fn throwing_count(&self) -> usize {
        self.may_throw.len()
    }
}

/// Whether any call or invoke in `function` reaches a known thrower or an
/// unknown callee.
fn calls_thrower(module: &Module, function: FunctionId, throwers: &FxHashSet<FunctionId>) -> bool {
    let f = module.function(function);
    f.blocks.iter().any(|b| {
        module.block_instructions(function, b.id).any(|(_, inst)| {
            if !matches!(inst.opcode, Opcode::Call { .. } | Opcode::Invoke { .. }) {
                return false;
            }
            let Some(callee) = inst.operands.last().and_then(|op| op.as_value()) else {
                return false;
            };
            match module.callee_function(callee) {
                Some(target) => throwers.contains(&target),
                None => true,
            }
        })
    })
}
