//! Phi resolution, branches, `switch`, and `ret`.

use lift_ir::{BlockId, FunctionId, Instruction as SourceInstruction, ValueId};
use smallvec::SmallVec;

use super::Lifter;
use crate::cil::{Instruction, LabelId};
use crate::error::LowerResult;
use crate::oracle::TypeOracle;

impl<O: TypeOracle + ?Sized> Lifter<'_, O> {
    pub(super) fn current_function(&self) -> LowerResult<FunctionId> {
        self.function
            .ok_or_else(|| self.invariant("control flow outside a function body".to_owned()))
    }

    /// Take over the phi operands left by the predecessor. The last operand
    /// pushed is on top, so results are stored in reverse declared order.
    pub(super) fn lower_phi_prologue(&mut self, phis: &[ValueId]) -> LowerResult<()> {
        for &phi in phis.iter().rev() {
            let ty = self.lower_type(self.module.type_of(phi), phi, "phi")?;
            let result = self.result_var(phi)?;
            self.emit(Instruction::PhiDequeue(ty));
            self.emit(Instruction::Store(result));
        }
        Ok(())
    }

    /// Unconditional edge to `target`: push the incoming value of each of
    /// its phis for the current source block, then jump.
    pub(super) fn branch_to(&mut self, target: BlockId) -> LowerResult<()> {
        let module = self.module;
        let function = self.current_function()?;
        for phi in module.leading_phis(function, target) {
            let incoming = module.phi_incoming(phi, self.source_block).ok_or_else(|| {
                self.invariant(format!(
                    "{} has no incoming value for block {}",
                    self.describe(phi),
                    self.source_block.raw(),
                ))
            })?;
            self.load_value(incoming)?;
            let ty = self.lower_type(module.type_of(phi), phi, "phi")?;
            self.emit(Instruction::PhiEnqueue(ty));
        }
        self.emit(Instruction::Branch(Self::label_of(target)));
        Ok(())
    }

    /// Two-way branch on the condition already on the stack.
    ///
    /// A conditional jump cannot carry phi operands, so it must target the
    /// side without phis and fall through into an inline edge to the other.
    /// When both sides have phis the taken side gets a synthesized block.
    pub(super) fn conditional_branch(
        &mut self,
        if_true: BlockId,
        if_false: BlockId,
    ) -> LowerResult<()> {
        let module = self.module;
        let function = self.current_function()?;

        if !module.starts_with_phi(function, if_true) {
            self.emit(Instruction::BranchIfTrue(Self::label_of(if_true)));
            self.branch_to(if_false)
        } else if !module.starts_with_phi(function, if_false) {
            self.emit(Instruction::BranchIfFalse(Self::label_of(if_false)));
            self.branch_to(if_true)
        } else {
            let detour = self.new_block();
            self.emit(Instruction::BranchIfTrue(detour));
            self.branch_to(if_false)?;
            self.position_at(detour);
            self.branch_to(if_true)
        }
    }

    /// `br label %t` or `br i1 %c, label %t, label %f`. The conditional form
    /// stores its operands as `[cond, if_false, if_true]`.
    pub(super) fn lower_br(&mut self, id: ValueId, inst: &SourceInstruction) -> LowerResult<()> {
        match inst.operands.len() {
            1 => {
                let target = inst
                    .block_operand(0)
                    .ok_or_else(|| self.invariant(format!("malformed {}", self.describe(id))))?;
                self.branch_to(target)
            }
            3 => {
                let (Some(cond), Some(if_false), Some(if_true)) = (
                    inst.value_operand(0),
                    inst.block_operand(1),
                    inst.block_operand(2),
                ) else {
                    return Err(self.invariant(format!("malformed {}", self.describe(id))));
                };
                if self.module.types.int_bits(self.module.type_of(cond)) != Some(1) {
                    return Err(self.unsupported("br", "non-boolean condition", id));
                }
                self.load_value(cond)?;
                self.conditional_branch(if_true, if_false)
            }
            n => Err(self.invariant(format!("br with {n} operands"))),
        }
    }

    /// `switch`: a jump table when the cases are exactly `0..n` in order,
    /// otherwise a compare chain. Case targets with phis are reached
    /// through one synthesized block each.
    pub(super) fn lower_switch(
        &mut self,
        id: ValueId,
        inst: &SourceInstruction,
    ) -> LowerResult<()> {
        let module = self.module;
        let function = self.current_function()?;
        let (Some(index), Some(default)) = (inst.value_operand(0), inst.block_operand(1)) else {
            return Err(self.invariant(format!("malformed {}", self.describe(id))));
        };
        let index_ty = module.type_of(index);
        let bits = module
            .types
            .int_bits(index_ty)
            .filter(|&b| b <= 64)
            .ok_or_else(|| self.unsupported("switch", "index type", id))?;

        let mut cases: Vec<(i128, LabelId)> = Vec::with_capacity(inst.operands.len() / 2);
        let mut detours: SmallVec<[(LabelId, BlockId); 2]> = SmallVec::new();
        for pair in inst.operands[2..].chunks(2) {
            let (Some(value), Some(target)) = (
                pair.first().and_then(|op| op.as_value()),
                pair.get(1).and_then(|op| op.as_block()),
            ) else {
                return Err(self.invariant(format!("malformed {}", self.describe(id))));
            };
            let value = module
                .value(value)
                .as_const_int()
                .ok_or_else(|| self.unsupported("switch", "non-constant case", id))?;
            let label = if module.starts_with_phi(function, target) {
                let detour = self.new_block();
                detours.push((detour, target));
                detour
            } else {
                Self::label_of(target)
            };
            cases.push((value, label));
        }

        let dense = bits < 64
            && !cases.is_empty()
            && (0i128..).zip(&cases).all(|(i, (value, _))| *value == i);

        if dense {
            self.load_value(index)?;
            self.emit(Instruction::Switch(cases.iter().map(|&(_, l)| l).collect()));
        } else {
            let tmp_ty = self.lower_type(index_ty, id, "switch")?;
            let tmp = self.vars.local(tmp_ty, None);
            self.load_value(index)?;
            self.emit(Instruction::Store(tmp));
            for (value, label) in cases {
                self.emit(Instruction::Load(tmp));
                self.load_int(value, index_ty, id)?;
                self.emit(Instruction::BranchIfEqual(label));
            }
        }
        self.branch_to(default)?;

        for (detour, target) in detours {
            self.position_at(detour);
            self.branch_to(target)?;
        }
        Ok(())
    }

    pub(super) fn lower_ret(&mut self, inst: &SourceInstruction) -> LowerResult<()> {
        let value = inst.value_operand(0);
        if let Some(value) = value {
            self.load_value(value)?;
        }
        self.emit_leave_frame();
        self.emit(Instruction::Return {
            has_value: value.is_some(),
        });
        Ok(())
    }
}
