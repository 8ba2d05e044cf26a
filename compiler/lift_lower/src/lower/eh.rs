//! Funclet-style exception handling.
//!
//! A `catchswitch` becomes a chain of personality tests, one synthesized
//! block per handler: the personality routine receives the handler's
//! `catchpad` arguments and returns zero to accept. Pads move the in-flight
//! exception out of the slot into their own variable and clear the slot;
//! `cleanupret` puts it back before unwinding further.

use lift_ir::{BlockId, Instruction as SourceInstruction, Opcode, ValueId};

use super::Lifter;
use crate::cil::{CallTarget, Constant, Helper, Instruction, Signature, TargetType};
use crate::error::LowerResult;
use crate::oracle::TypeOracle;

impl<O: TypeOracle + ?Sized> Lifter<'_, O> {
    pub(super) fn lower_catch_switch(
        &mut self,
        id: ValueId,
        inst: &SourceInstruction,
        has_unwind_dest: bool,
    ) -> LowerResult<()> {
        let module = self.module;
        let function = self.current_function()?;
        let personality = module
            .function(function)
            .personality
            .ok_or_else(|| self.unsupported("catchswitch", "function without personality", id))?;
        let sig = self
            .oracle
            .signature(module, module.function(personality).ty)
            .filter(|sig| *sig == Signature::new(vec![TargetType::ReadOnlySpan], TargetType::I32))
            .ok_or_else(|| self.unsupported("catchswitch", "personality signature", id))?;

        let n = inst.operands.len();
        let end = if has_unwind_dest { n.saturating_sub(1) } else { n };
        let handlers = inst
            .operands
            .get(1..end)
            .and_then(|ops| ops.iter().map(|op| op.as_block()).collect::<Option<Vec<BlockId>>>())
            .ok_or_else(|| self.invariant(format!("malformed {}", self.describe(id))))?;

        for handler in handlers {
            let (_, pad) = module
                .block_instructions(function, handler)
                .find(|(_, inst)| inst.opcode == Opcode::CatchPad)
                .ok_or_else(|| self.unsupported("catchswitch", "handler without catchpad", id))?;
            let args = pad
                .operands
                .split_last()
                .map(|(_, args)| args.iter().filter_map(|op| op.as_value()).collect::<Vec<_>>())
                .unwrap_or_default();

            let pack = self.load_variadic_arguments(&args, id)?;
            self.emit(Instruction::Load(pack));
            self.emit(Instruction::Call {
                target: CallTarget::Function(personality),
                sig: sig.clone(),
            });
            let next = self.new_block();
            self.emit(Instruction::BranchIfTrue(next));
            self.branch_to(handler)?;
            self.position_at(next);
        }

        match has_unwind_dest.then(|| n.checked_sub(1).and_then(|i| inst.block_operand(i))) {
            Some(Some(unwind)) => self.branch_to(unwind),
            Some(None) => Err(self.invariant(format!("malformed {}", self.describe(id)))),
            None => {
                self.emit_return_default();
                Ok(())
            }
        }
    }

    /// `catchpad` / `cleanuppad`: take ownership of the in-flight exception.
    pub(super) fn lower_pad(&mut self, id: ValueId) -> LowerResult<()> {
        let slot = self.exception_slot();
        let result = self.result_var(id)?;
        self.emit(Instruction::Load(slot));
        self.emit(Instruction::Store(result));
        let null = self.constant(Constant::Null, TargetType::ExceptionInfo);
        self.emit(Instruction::Load(null));
        self.emit(Instruction::Store(slot));
        Ok(())
    }

    /// `catchret`: the exception is handled; release it and continue.
    pub(super) fn lower_catch_ret(
        &mut self,
        id: ValueId,
        inst: &SourceInstruction,
    ) -> LowerResult<()> {
        let (Some(pad), Some(target)) = (inst.value_operand(0), inst.block_operand(1)) else {
            return Err(self.invariant(format!("malformed {}", self.describe(id))));
        };
        self.load_value(pad)?;
        self.call_helper(Helper::ExceptionDispose);
        self.branch_to(target)
    }

    /// `cleanupret`: restore the exception and keep unwinding, either to the
    /// next handler or out of the function.
    pub(super) fn lower_cleanup_ret(
        &mut self,
        id: ValueId,
        inst: &SourceInstruction,
    ) -> LowerResult<()> {
        let Some(pad) = inst.value_operand(0) else {
            return Err(self.invariant(format!("malformed {}", self.describe(id))));
        };
        let slot = self.exception_slot();
        self.load_value(pad)?;
        self.emit(Instruction::Store(slot));
        match inst.block_operand(1) {
            Some(dest) => self.branch_to(dest),
            None => {
                self.emit_return_default();
                Ok(())
            }
        }
    }
}
