//! Calls, `invoke`, and variadic argument packs.

use lift_ir::{Instruction as SourceInstruction, Module, TypeId, ValueId};

use super::Lifter;
use crate::cil::{CallTarget, Constant, Helper, Instruction, TargetType, VarId};
use crate::error::LowerResult;
use crate::oracle::TypeOracle;

/// Variadic-list intrinsics lowered inline rather than called.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum VarArgIntrinsic {
    /// Point a `va_list` at the function's own variadic arguments.
    Start,
    /// Nothing to release.
    End,
}

fn var_arg_intrinsic(module: &Module, callee: ValueId) -> Option<VarArgIntrinsic> {
    let f = module.function(module.callee_function(callee)?);
    if !f.is_declaration() {
        return None;
    }
    // Overloads carry a type suffix: `llvm.va_start.p0`.
    let named = |base: &str| {
        f.name
            .strip_prefix(base)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
    };
    if named("llvm.va_start") {
        Some(VarArgIntrinsic::Start)
    } else if named("llvm.va_end") {
        Some(VarArgIntrinsic::End)
    } else {
        None
    }
}

impl<O: TypeOracle + ?Sized> Lifter<'_, O> {
    /// Whether a call through `callee` can leave an exception pending.
    /// Unknown callees are assumed to throw.
    fn callee_may_throw(&self, callee: ValueId) -> bool {
        self.module
            .callee_function(callee)
            .is_none_or(|f| self.throw_info.may_throw(f))
    }

    pub(super) fn lower_call(
        &mut self,
        id: ValueId,
        inst: &SourceInstruction,
        function_type: TypeId,
    ) -> LowerResult<()> {
        let operands = inst
            .operands
            .iter()
            .map(|op| op.as_value())
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| self.invariant(format!("malformed {}", self.describe(id))))?;
        let Some((&callee, args)) = operands.split_last() else {
            return Err(self.invariant(format!("call without callee: {}", self.describe(id))));
        };

        match var_arg_intrinsic(self.module, callee) {
            Some(VarArgIntrinsic::Start) => return self.lower_va_start(id, args),
            Some(VarArgIntrinsic::End) => return Ok(()),
            None => {}
        }

        self.emit_call(id, callee, args, function_type)?;

        if self.may_throw && self.callee_may_throw(callee) {
            self.emit(Instruction::ReturnIfExceptionPending {
                ret: self.return_type.clone(),
                leave_frame: self.needs_frame,
            });
        }
        Ok(())
    }

    /// `va_start(list)`: store the address of the first variadic slot of
    /// this function into `list`.
    fn lower_va_start(&mut self, id: ValueId, args: &[ValueId]) -> LowerResult<()> {
        let &[list] = args else {
            return Err(self.invariant(format!(
                "va_start takes one argument: {}",
                self.describe(id)
            )));
        };
        let span = self.variadic_parameter(id)?;
        self.load_value(list)?;
        self.emit(Instruction::Load(span));
        self.call_helper(Helper::VAStart);
        Ok(())
    }

    /// `invoke`: call, then branch to the unwind destination if the call
    /// left an exception in the slot.
    pub(super) fn lower_invoke(
        &mut self,
        id: ValueId,
        inst: &SourceInstruction,
        function_type: TypeId,
    ) -> LowerResult<()> {
        let n = inst.operands.len();
        let malformed = || self.invariant(format!("malformed {}", self.describe(id)));
        if n < 3 {
            return Err(malformed());
        }
        let (Some(normal), Some(unwind), Some(callee)) = (
            inst.block_operand(n - 3),
            inst.block_operand(n - 2),
            inst.value_operand(n - 1),
        ) else {
            return Err(malformed());
        };
        let args = inst.operands[..n - 3]
            .iter()
            .map(|op| op.as_value())
            .collect::<Option<Vec<_>>>()
            .ok_or_else(malformed)?;

        self.emit_call(id, callee, &args, function_type)?;

        let slot = self.exception_slot();
        self.emit(Instruction::Load(slot));
        self.conditional_branch(unwind, normal)
    }

    /// Push arguments, call, and store the result if there is one.
    fn emit_call(
        &mut self,
        id: ValueId,
        callee: ValueId,
        args: &[ValueId],
        function_type: TypeId,
    ) -> LowerResult<()> {
        let module = self.module;
        let (_, params, variadic) = module
            .types
            .function_parts(function_type)
            .ok_or_else(|| self.unsupported("call", "callee type", id))?;
        let fixed = params.len();
        if args.len() < fixed || (!variadic && args.len() != fixed) {
            return Err(self.invariant(format!(
                "{} passes {} arguments to {fixed} parameters",
                self.describe(id),
                args.len(),
            )));
        }
        let sig = self
            .oracle
            .signature(module, function_type)
            .ok_or_else(|| self.unsupported("call", "signature", id))?;

        let pack = if variadic {
            Some(self.load_variadic_arguments(&args[fixed..], id)?)
        } else {
            None
        };
        for &arg in &args[..fixed] {
            self.load_value(arg)?;
        }
        if let Some(pack) = pack {
            self.emit(Instruction::Load(pack));
        }

        match module.callee_function(callee) {
            Some(function) => self.emit(Instruction::Call {
                target: CallTarget::Function(function),
                sig,
            }),
            None => {
                self.load_value(callee)?;
                self.emit(Instruction::CallIndirect(sig));
            }
        }

        if let Some(&result) = self.results.get(&id) {
            self.emit(Instruction::Store(result));
        }
        Ok(())
    }

    /// Pack `args` into a read-only view of native-int slots, each holding
    /// the address of one argument, and return the variable holding it.
    ///
    /// Must run with an empty stack: it stores into locals as it goes.
    pub(super) fn load_variadic_arguments(
        &mut self,
        args: &[ValueId],
        origin: ValueId,
    ) -> LowerResult<VarId> {
        let module = self.module;
        if args.is_empty() {
            let empty = self.vars.local(TargetType::ReadOnlySpan, None);
            self.emit(Instruction::Initialize(empty));
            return Ok(empty);
        }
        let len = u32::try_from(args.len())
            .map_err(|_| self.unsupported("call", "variadic argument count", origin))?;

        let buffer = self
            .vars
            .pinned_local(TargetType::inline_array(TargetType::NativeInt, u64::from(len)), None);
        let span = self.vars.local(TargetType::Span, None);
        let read_only = self.vars.local(TargetType::ReadOnlySpan, None);

        self.emit(Instruction::Initialize(buffer));
        let mut slots = Vec::with_capacity(args.len());
        for &arg in args {
            let ty = self.lower_type(module.type_of(arg), origin, "call")?;
            let slot = self.vars.pinned_local(ty, None);
            self.load_value(arg)?;
            self.emit(Instruction::Store(slot));
            slots.push(slot);
        }

        self.emit(Instruction::AddressOf(buffer));
        self.call_helper(Helper::InlineArrayAsSpan { len });
        self.emit(Instruction::Store(span));

        for (i, slot) in (0i32..).zip(slots) {
            self.emit(Instruction::AddressOf(span));
            let index = self.constant(Constant::I4(i), TargetType::I32);
            self.emit(Instruction::Load(index));
            self.call_helper(Helper::SpanGetItem);
            self.emit(Instruction::AddressOf(slot));
            self.emit(Instruction::StoreIndirect(TargetType::NativeInt));
        }

        self.emit(Instruction::Load(span));
        self.call_helper(Helper::SpanAsReadOnly);
        self.emit(Instruction::Store(read_only));
        Ok(read_only)
    }
}
