//! Shared test utilities for lowering, optimizer, and pipeline tests.
//! Only compiled in test builds.

use lift_ir::{BinaryOp, IntPredicate, Module, ModuleBuilder, ValueId};

use crate::cil::{Instruction, LabelId, VarId};
use crate::emit::verify_blocks;
use crate::error::LowerError;
use crate::lower::{lift_function, LiftedFunction};
use crate::optimize::{optimize_function, OptimizeStats};
use crate::options::{LowerOptions, PeepholeLevel};
use crate::oracle::NaturalLayout;
use crate::pipeline::{lift_module, LiftedModule};
use crate::throw_info::ThrowInfo;

/// Shorthand for `VarId::new(n)`.
pub(crate) fn v(n: u32) -> VarId {
    VarId::new(n)
}

/// Shorthand for `LabelId::new(n)`.
pub(crate) fn l(n: u32) -> LabelId {
    LabelId::new(n)
}

fn try_lift(module: &Module, name: &str) -> Result<LiftedFunction, LowerError> {
    let function = module
        .function_named(name)
        .unwrap_or_else(|| panic!("no function `{name}`"));
    let info = ThrowInfo::compute(module, &NaturalLayout);
    lift_function(module, &NaturalLayout, &info, function)
}

/// Lower `name` without optimizing. Panics if lowering fails or the result
/// does not verify.
pub(crate) fn lift(module: &Module, name: &str) -> LiftedFunction {
    let lifted = try_lift(module, name).unwrap_or_else(|e| panic!("lowering `{name}` failed: {e}"));
    verify_blocks(&lifted.name, &lifted.blocks).unwrap_or_else(|e| panic!("{e}"));
    lifted
}

/// Lower `name` and expect an error.
pub(crate) fn lift_err(module: &Module, name: &str) -> LowerError {
    match try_lift(module, name) {
        Ok(_) => panic!("lowering `{name}` unexpectedly succeeded"),
        Err(e) => e,
    }
}

/// Lower and optimize `name`, verifying the result.
pub(crate) fn lift_optimized(
    module: &Module,
    name: &str,
    level: PeepholeLevel,
) -> (LiftedFunction, OptimizeStats) {
    let mut lifted = lift(module, name);
    let stats = optimize_function(&mut lifted, level);
    verify_blocks(&lifted.name, &lifted.blocks).unwrap_or_else(|e| panic!("{e}"));
    (lifted, stats)
}

pub(crate) fn lift_module_with(module: &Module, options: LowerOptions) -> LiftedModule {
    lift_module(module, &NaturalLayout, options).unwrap_or_else(|e| panic!("lowering failed: {e}"))
}

/// Instructions of block `n`.
pub(crate) fn block(function: &LiftedFunction, n: u32) -> &[Instruction] {
    &function.block(l(n)).instructions
}

/// Variable created for source value `value`.
pub(crate) fn var_of(function: &LiftedFunction, value: ValueId) -> VarId {
    function
        .variables
        .for_origin(value)
        .unwrap_or_else(|| panic!("no variable for value {}", value.raw()))
}

/// A module with one loop and one initialized global:
///
/// ```text
/// @limit = global i32 10
///
/// define i32 @count(i32 %n) {
/// entry:
///   br label %loop
/// loop:
///   %i = phi i32 [0, %entry], [%next, %loop]
///   %next = add i32 %i, 1
///   %done = icmp sge i32 %next, %n
///   br i1 %done, label %exit, label %loop
/// exit:
///   ret i32 %next
/// }
/// ```
pub(crate) fn counting_loop() -> Module {
    let mut mb = ModuleBuilder::new("counting");
    let i32_ty = mb.types().int(32);
    let fn_ty = mb.types().function(i32_ty, vec![i32_ty], false);
    let ten = mb.const_int(i32_ty, 10);
    mb.add_global("limit", i32_ty, Some(ten));

    let f = mb.add_function("count", fn_ty);
    let entry = mb.append_block(f, "entry");
    let body = mb.append_block(f, "loop");
    let exit = mb.append_block(f, "exit");
    let n = mb.param(f, 0);
    let zero = mb.const_int(i32_ty, 0);
    let one = mb.const_int(i32_ty, 1);

    mb.position_at(f, entry);
    mb.br(body);

    mb.position_at(f, body);
    let i = mb.phi(i32_ty, &[(zero, entry)]);
    let next = mb.binary(BinaryOp::Add, i, one);
    mb.add_incoming(i, next, body);
    let done = mb.icmp(IntPredicate::Sge, next, n);
    mb.cond_br(done, exit, body);

    mb.position_at(f, exit);
    mb.ret(Some(next));

    mb.finish()
}

/// `@f` stores 7 into a 4-byte stack slot and returns it reloaded:
///
/// ```text
/// define i32 @f() {
/// entry:
///   %slot = alloca i32 1
///   store i32 7, ptr %slot
///   %v = load i32, ptr %slot
///   ret i32 %v
/// }
/// ```
pub(crate) fn alloca_roundtrip() -> Module {
    let mut mb = ModuleBuilder::new("m");
    let i32_ty = mb.types().int(32);
    let fn_ty = mb.types().function(i32_ty, vec![], false);
    let f = mb.add_function("f", fn_ty);
    let entry = mb.append_block(f, "entry");
    let seven = mb.const_int(i32_ty, 7);

    mb.position_at(f, entry);
    let slot = mb.alloca(i32_ty, None);
    mb.store(seven, slot);
    let value = mb.load(i32_ty, slot);
    mb.ret(Some(value));

    mb.finish()
}
