use lift_ir::{
    BinaryOp, BlockId, CastOp, FunctionId, IntPredicate, Module, ModuleBuilder, Opcode, Operand,
    OperandList, TypeId, ValueId,
};
use pretty_assertions::assert_eq;

use super::initialize_global;
use crate::cil::{
    BinaryOp as Op, CallTarget, Comparison, Constant, FieldRef, Helper, Instruction, Signature,
    TargetType, VarId, VariableKind,
};
use crate::error::LowerError;
use crate::oracle::NaturalLayout;
use crate::test_helpers::{alloca_roundtrip, block, counting_loop, l, lift, lift_err, v, var_of};

fn exception_slot(function: &super::LiftedFunction) -> VarId {
    function
        .variables
        .iter()
        .find(|(_, var)| var.kind == VariableKind::ExceptionSlot)
        .map(|(id, _)| id)
        .unwrap_or_else(|| panic!("no exception slot"))
}

fn constant_var(function: &super::LiftedFunction, constant: Constant) -> VarId {
    function
        .variables
        .iter()
        .find(|(_, var)| var.kind == VariableKind::Constant(constant.clone()))
        .map(|(id, _)| id)
        .unwrap_or_else(|| panic!("no constant {constant:?}"))
}

fn calls_to(instructions: &[Instruction], function: FunctionId) -> usize {
    instructions
        .iter()
        .filter(|i| {
            matches!(i, Instruction::Call { target: CallTarget::Function(f), .. } if *f == function)
        })
        .count()
}

// ── Memory ──────────────────────────────────────────────────────────

/// Every access goes through the slot's address before optimization.
#[test]
fn alloca_store_load_goes_through_addresses() {
    let module = alloca_roundtrip();
    let f = lift(&module, "f");

    // v0 = slot, v1 = loaded value, v2 = constant 7
    assert_eq!(
        block(&f, 0),
        &[
            Instruction::Initialize(v(0)),
            Instruction::AddressOf(v(0)),
            Instruction::Load(v(2)),
            Instruction::StoreIndirect(TargetType::I32),
            Instruction::AddressOf(v(0)),
            Instruction::LoadIndirect(TargetType::I32),
            Instruction::Store(v(1)),
            Instruction::Load(v(1)),
            Instruction::Return { has_value: true },
        ]
    );
    assert_eq!(f.variables.get(v(2)).kind, VariableKind::Constant(Constant::I4(7)));
    assert_eq!(f.variables.get(v(0)).kind, VariableKind::Local);
    assert!(!f.needs_frame);
}

/// A dynamic allocation count has no fixed-size storage.
#[test]
fn dynamic_alloca_count_is_unsupported() {
    let mut mb = ModuleBuilder::new("m");
    let i32_ty = mb.types().int(32);
    let void = mb.types().void();
    let fn_ty = mb.types().function(void, vec![i32_ty], false);
    let f = mb.add_function("f", fn_ty);
    let entry = mb.append_block(f, "entry");
    let n = mb.param(f, 0);
    mb.position_at(f, entry);
    mb.alloca(i32_ty, Some(n));
    mb.ret(None);
    let module = mb.finish();

    let err = lift_err(&module, "f");
    assert!(
        matches!(
            err,
            LowerError::Unsupported {
                opcode: "alloca",
                construct: "dynamic allocation count",
                ..
            }
        ),
        "{err}"
    );
}

/// An array allocation becomes one inline-array variable.
#[test]
fn counted_alloca_is_inline_array() {
    let mut mb = ModuleBuilder::new("m");
    let i64_ty = mb.types().int(64);
    let i32_ty = mb.types().int(32);
    let void = mb.types().void();
    let fn_ty = mb.types().function(void, vec![], false);
    let f = mb.add_function("f", fn_ty);
    let entry = mb.append_block(f, "entry");
    let four = mb.const_int(i32_ty, 4);
    mb.position_at(f, entry);
    let slot = mb.alloca(i64_ty, Some(four));
    mb.ret(None);
    let module = mb.finish();

    let lifted = lift(&module, "f");
    let storage = var_of(&lifted, slot);
    assert_eq!(
        lifted.variables.get(storage).ty,
        TargetType::inline_array(TargetType::I64, 4)
    );
}

/// `define ptr @name(ptr %base[, i64 %i])` returning `gep elem, %base, indices`.
/// Without a constant `first` index the second parameter is used.
fn gep_function(
    mb: &mut ModuleBuilder,
    name: &str,
    ty: TypeId,
    elem: TypeId,
    first: Option<ValueId>,
    rest: &[ValueId],
) {
    let f = mb.add_function(name, ty);
    let entry = mb.append_block(f, "entry");
    let base = mb.param(f, 0);
    let first = first.unwrap_or_else(|| mb.param(f, 1));
    mb.position_at(f, entry);
    let mut indices = vec![first];
    indices.extend_from_slice(rest);
    let r = mb.gep(elem, base, &indices);
    mb.ret(Some(r));
}

/// Struct member access and the three index scalings of `getelementptr`.
#[test]
fn gep_addressing() {
    let mut mb = ModuleBuilder::new("m");
    let i32_ty = mb.types().int(32);
    let i64_ty = mb.types().int(64);
    let ptr = mb.types().ptr();
    let pair = mb.types().structure(vec![i32_ty, i64_ty]);
    let unary = mb.types().function(ptr, vec![ptr], false);
    let binary = mb.types().function(ptr, vec![ptr, i64_ty], false);
    let zero = mb.const_int(i64_ty, 0);
    let one = mb.const_int(i64_ty, 1);
    let three = mb.const_int(i64_ty, 3);
    let field = mb.const_int(i32_ty, 1);

    gep_function(&mut mb, "member", unary, pair, Some(zero), &[field]);
    gep_function(&mut mb, "scaled", binary, i32_ty, None, &[]);
    gep_function(&mut mb, "constant", unary, i64_ty, Some(three), &[]);
    gep_function(&mut mb, "runtime", unary, ptr, Some(one), &[]);
    let module = mb.finish();

    // v0 = result, v1 = base pointer
    let member = lift(&module, "member");
    assert_eq!(
        block(&member, 0),
        &[
            Instruction::Load(v(1)),
            Instruction::FieldAddress(FieldRef {
                owner: TargetType::Struct(pair),
                index: 1,
                ty: TargetType::I64,
            }),
            Instruction::Store(v(0)),
            Instruction::Load(v(0)),
            Instruction::Return { has_value: true },
        ]
    );

    let scaled = lift(&module, "scaled");
    assert_eq!(
        &block(&scaled, 0)[..6],
        &[
            Instruction::Load(v(1)),
            Instruction::Load(v(2)),
            Instruction::Convert {
                to: TargetType::NativeInt,
                unsigned: false
            },
            Instruction::Load(v(3)),
            Instruction::Binary(Op::Mul),
            Instruction::Binary(Op::Add),
        ]
    );
    assert_eq!(scaled.variables.get(v(3)).kind, VariableKind::Constant(Constant::I8(4)));

    let constant = lift(&module, "constant");
    assert_eq!(
        &block(&constant, 0)[..4],
        &[
            Instruction::Load(v(1)),
            Instruction::Load(v(2)),
            Instruction::Convert {
                to: TargetType::NativeInt,
                unsigned: false
            },
            Instruction::Binary(Op::Add),
        ]
    );
    assert_eq!(
        constant.variables.get(v(2)).kind,
        VariableKind::Constant(Constant::I8(24))
    );

    let runtime = lift(&module, "runtime");
    assert_eq!(
        &block(&runtime, 0)[..3],
        &[
            Instruction::Load(v(1)),
            Instruction::SizeOf(TargetType::Pointer),
            Instruction::Binary(Op::Add),
        ]
    );
}

/// `extractvalue` copies the aggregate to a temporary and reads the member
/// through its address.
#[test]
fn extract_value_through_temporary() {
    let mut mb = ModuleBuilder::new("m");
    let i32_ty = mb.types().int(32);
    let i64_ty = mb.types().int(64);
    let pair = mb.types().structure(vec![i32_ty, i64_ty]);
    let fn_ty = mb.types().function(i64_ty, vec![pair], false);
    let f = mb.add_function("f", fn_ty);
    let entry = mb.append_block(f, "entry");
    let agg = mb.param(f, 0);
    mb.position_at(f, entry);
    let e = mb.extract_value(agg, &[1]);
    mb.ret(Some(e));
    let module = mb.finish();

    // v0 = result, v1 = temporary, v2 = parameter
    let lifted = lift(&module, "f");
    assert_eq!(
        block(&lifted, 0),
        &[
            Instruction::Load(v(2)),
            Instruction::Store(v(1)),
            Instruction::AddressOf(v(1)),
            Instruction::FieldAddress(FieldRef {
                owner: TargetType::Struct(pair),
                index: 1,
                ty: TargetType::I64,
            }),
            Instruction::LoadIndirect(TargetType::I64),
            Instruction::Store(v(0)),
            Instruction::Load(v(0)),
            Instruction::Return { has_value: true },
        ]
    );
}

// ── Values ──────────────────────────────────────────────────────────

/// Zero members of a constant aggregate are left to the initialization.
#[test]
fn constant_aggregate_skips_zero_members() {
    let mut mb = ModuleBuilder::new("m");
    let i32_ty = mb.types().int(32);
    let pair = mb.types().structure(vec![i32_ty, i32_ty]);
    let fn_ty = mb.types().function(pair, vec![], false);
    let f = mb.add_function("f", fn_ty);
    let entry = mb.append_block(f, "entry");
    let one = mb.const_int(i32_ty, 1);
    let zero = mb.zero(i32_ty);
    let agg = mb.const_aggregate(pair, vec![one, zero]);
    mb.position_at(f, entry);
    mb.ret(Some(agg));
    let module = mb.finish();

    let lifted = lift(&module, "f");
    assert_eq!(
        block(&lifted, 0),
        &[
            Instruction::Initialize(v(0)),
            Instruction::AddressOf(v(0)),
            Instruction::FieldAddress(FieldRef {
                owner: TargetType::Struct(pair),
                index: 0,
                ty: TargetType::I32,
            }),
            Instruction::Load(v(1)),
            Instruction::StoreIndirect(TargetType::I32),
            Instruction::Load(v(0)),
            Instruction::Return { has_value: true },
        ]
    );
}

/// A constant expression is evaluated into a temporary at its use.
#[test]
fn constant_expression_lowers_inline() {
    let mut mb = ModuleBuilder::new("m");
    let i32_ty = mb.types().int(32);
    let i64_ty = mb.types().int(64);
    let fn_ty = mb.types().function(i64_ty, vec![], false);
    let table = mb.add_global("table", i32_ty, None);
    let table_value = mb.global_value(table);
    let address = mb.const_expr(i64_ty, Opcode::Cast(CastOp::PtrToInt), vec![table_value]);
    let f = mb.add_function("f", fn_ty);
    let entry = mb.append_block(f, "entry");
    mb.position_at(f, entry);
    mb.ret(Some(address));
    let module = mb.finish();

    // v0 = temporary, v1 = the global
    let lifted = lift(&module, "f");
    assert_eq!(
        block(&lifted, 0),
        &[
            Instruction::AddressOf(v(1)),
            Instruction::Convert {
                to: TargetType::I64,
                unsigned: false
            },
            Instruction::Store(v(0)),
            Instruction::Load(v(0)),
            Instruction::Return { has_value: true },
        ]
    );
    assert_eq!(lifted.variables.get(v(1)).kind, VariableKind::Global(table));
}

/// `icmp sge` is `clt` followed by a logical not.
#[test]
fn signed_greater_or_equal_inverts_less_than() {
    let mut mb = ModuleBuilder::new("m");
    let i32_ty = mb.types().int(32);
    let i1 = mb.types().int(1);
    let fn_ty = mb.types().function(i1, vec![i32_ty, i32_ty], false);
    let f = mb.add_function("f", fn_ty);
    let entry = mb.append_block(f, "entry");
    let (a, b) = (mb.param(f, 0), mb.param(f, 1));
    mb.position_at(f, entry);
    let c = mb.icmp(IntPredicate::Sge, a, b);
    mb.ret(Some(c));
    let module = mb.finish();

    let lifted = lift(&module, "f");
    assert_eq!(
        block(&lifted, 0),
        &[
            Instruction::Load(v(1)),
            Instruction::Load(v(2)),
            Instruction::Compare(Comparison::Lt),
            Instruction::Load(v(3)),
            Instruction::Compare(Comparison::Eq),
            Instruction::Store(v(0)),
            Instruction::Load(v(0)),
            Instruction::Return { has_value: true },
        ]
    );
    assert_eq!(lifted.variables.get(v(0)).ty, TargetType::Bool);
}

/// `select` calls the runtime helper for the result type.
#[test]
fn select_uses_helper() {
    let mut mb = ModuleBuilder::new("m");
    let i32_ty = mb.types().int(32);
    let i1 = mb.types().int(1);
    let fn_ty = mb.types().function(i32_ty, vec![i1, i32_ty, i32_ty], false);
    let f = mb.add_function("f", fn_ty);
    let entry = mb.append_block(f, "entry");
    let (c, a, b) = (mb.param(f, 0), mb.param(f, 1), mb.param(f, 2));
    mb.position_at(f, entry);
    let s = mb.select(c, a, b);
    mb.ret(Some(s));
    let module = mb.finish();

    let lifted = lift(&module, "f");
    let helper = Helper::Select(TargetType::I32);
    assert_eq!(
        block(&lifted, 0)[3],
        Instruction::Call {
            sig: helper.signature(),
            target: CallTarget::Helper(helper),
        }
    );
}

// ── Control flow ────────────────────────────────────────────────────

/// Phi operands are pushed in declared order and stored in reverse.
#[test]
fn phi_operands_cross_the_edge_in_order() {
    let mut mb = ModuleBuilder::new("m");
    let i32_ty = mb.types().int(32);
    let fn_ty = mb.types().function(i32_ty, vec![i32_ty, i32_ty], false);
    let f = mb.add_function("f", fn_ty);
    let entry = mb.append_block(f, "entry");
    let join = mb.append_block(f, "join");
    let (a, b) = (mb.param(f, 0), mb.param(f, 1));
    mb.position_at(f, entry);
    mb.br(join);
    mb.position_at(f, join);
    let x = mb.phi(i32_ty, &[(a, entry)]);
    let y = mb.phi(i32_ty, &[(b, entry)]);
    let s = mb.binary(BinaryOp::Add, x, y);
    mb.ret(Some(s));
    let module = mb.finish();

    // v0 = x, v1 = y, v2 = sum, v3 = a, v4 = b
    let lifted = lift(&module, "f");
    assert_eq!(
        block(&lifted, 0),
        &[
            Instruction::Load(v(3)),
            Instruction::PhiEnqueue(TargetType::I32),
            Instruction::Load(v(4)),
            Instruction::PhiEnqueue(TargetType::I32),
            Instruction::Branch(l(1)),
        ]
    );
    assert_eq!(
        &block(&lifted, 1)[..4],
        &[
            Instruction::PhiDequeue(TargetType::I32),
            Instruction::Store(v(1)),
            Instruction::PhiDequeue(TargetType::I32),
            Instruction::Store(v(0)),
        ]
    );
}

/// A loop back edge carries its phi operand; the exit does not.
#[test]
fn loop_back_edge_carries_phi() {
    let module = counting_loop();
    let lifted = lift(&module, "count");

    // v0 = i, v1 = next, v2 = done
    assert_eq!(
        block(&lifted, 0),
        &[
            Instruction::Load(v(3)),
            Instruction::PhiEnqueue(TargetType::I32),
            Instruction::Branch(l(1)),
        ]
    );
    let body = block(&lifted, 1);
    assert_eq!(
        &body[body.len() - 5..],
        &[
            Instruction::Load(v(2)),
            Instruction::BranchIfTrue(l(2)),
            Instruction::Load(v(1)),
            Instruction::PhiEnqueue(TargetType::I32),
            Instruction::Branch(l(1)),
        ]
    );
    assert_eq!(lifted.blocks.len(), 3);
}

fn diamond(phi_on_true: bool, phi_on_false: bool) -> Module {
    let mut mb = ModuleBuilder::new("m");
    let i32_ty = mb.types().int(32);
    let i1 = mb.types().int(1);
    let fn_ty = mb.types().function(i32_ty, vec![i1, i32_ty], false);
    let f = mb.add_function("f", fn_ty);
    let entry = mb.append_block(f, "entry");
    let yes = mb.append_block(f, "yes");
    let no = mb.append_block(f, "no");
    let (c, a) = (mb.param(f, 0), mb.param(f, 1));
    mb.position_at(f, entry);
    mb.cond_br(c, yes, no);
    for (target, has_phi) in [(yes, phi_on_true), (no, phi_on_false)] {
        mb.position_at(f, target);
        let value = if has_phi {
            mb.phi(i32_ty, &[(a, entry)])
        } else {
            a
        };
        mb.ret(Some(value));
    }
    mb.finish()
}

/// The side without phis takes the conditional jump.
#[test]
fn conditional_branch_jumps_to_the_phi_free_side() {
    let neither = lift(&diamond(false, false), "f");
    assert_eq!(
        block(&neither, 0),
        &[
            Instruction::Load(v(0)),
            Instruction::BranchIfTrue(l(1)),
            Instruction::Branch(l(2)),
        ]
    );

    // v0 = phi in `yes`, v1 = c, v2 = a
    let true_side = lift(&diamond(true, false), "f");
    assert_eq!(
        block(&true_side, 0),
        &[
            Instruction::Load(v(1)),
            Instruction::BranchIfFalse(l(2)),
            Instruction::Load(v(2)),
            Instruction::PhiEnqueue(TargetType::I32),
            Instruction::Branch(l(1)),
        ]
    );
    assert_eq!(true_side.blocks.len(), 3);
}

/// With phis on both sides the taken side goes through a new block.
#[test]
fn conditional_branch_detours_when_both_sides_have_phis() {
    // v0, v1 = phis, v2 = c, v3 = a
    let lifted = lift(&diamond(true, true), "f");
    assert_eq!(
        block(&lifted, 0),
        &[
            Instruction::Load(v(2)),
            Instruction::BranchIfTrue(l(3)),
            Instruction::Load(v(3)),
            Instruction::PhiEnqueue(TargetType::I32),
            Instruction::Branch(l(2)),
        ]
    );
    assert!(lifted.block(l(3)).is_synthesized());
    assert_eq!(
        block(&lifted, 3),
        &[
            Instruction::Load(v(3)),
            Instruction::PhiEnqueue(TargetType::I32),
            Instruction::Branch(l(1)),
        ]
    );
}

/// A raw `br` with operands `[cond, A, B]` jumps to `B` when true.
#[test]
fn conditional_br_operand_order() {
    let mut mb = ModuleBuilder::new("m");
    let void = mb.types().void();
    let i1 = mb.types().int(1);
    let fn_ty = mb.types().function(void, vec![i1], false);
    let f = mb.add_function("f", fn_ty);
    let entry = mb.append_block(f, "entry");
    let a = mb.append_block(f, "a");
    let b = mb.append_block(f, "b");
    let c = mb.param(f, 0);
    mb.position_at(f, entry);
    let operands: OperandList = [Operand::Value(c), Operand::Block(a), Operand::Block(b)]
        .into_iter()
        .collect();
    mb.build(Opcode::Br, void, operands);
    for target in [a, b] {
        mb.position_at(f, target);
        mb.ret(None);
    }
    let module = mb.finish();

    let lifted = lift(&module, "f");
    assert_eq!(
        block(&lifted, 0),
        &[
            Instruction::Load(v(0)),
            Instruction::BranchIfTrue(l(2)),
            Instruction::Branch(l(1)),
        ]
    );
}

fn switch_over(cases: &[i128], phi_on_first: bool) -> Module {
    let mut mb = ModuleBuilder::new("m");
    let void = mb.types().void();
    let i32_ty = mb.types().int(32);
    let fn_ty = mb.types().function(void, vec![i32_ty], false);
    let f = mb.add_function("f", fn_ty);
    let entry = mb.append_block(f, "entry");
    let k = mb.param(f, 0);
    let targets: Vec<BlockId> = (0..cases.len())
        .map(|i| mb.append_block(f, &format!("case{i}")))
        .collect();
    let default = mb.append_block(f, "default");
    let arms: Vec<_> = cases
        .iter()
        .zip(&targets)
        .map(|(&value, &target)| (mb.const_int(i32_ty, value), target))
        .collect();

    mb.position_at(f, entry);
    mb.switch(k, default, &arms);
    for (i, &target) in targets.iter().enumerate() {
        mb.position_at(f, target);
        if i == 0 && phi_on_first {
            mb.phi(i32_ty, &[(k, entry)]);
        }
        mb.ret(None);
    }
    mb.position_at(f, default);
    mb.ret(None);
    mb.finish()
}

/// Cases `0, 1, 2` form a jump table.
#[test]
fn dense_switch_uses_table() {
    let lifted = lift(&switch_over(&[0, 1, 2], false), "f");
    assert_eq!(
        block(&lifted, 0),
        &[
            Instruction::Load(v(0)),
            Instruction::Switch(vec![l(1), l(2), l(3)]),
            Instruction::Branch(l(4)),
        ]
    );
}

/// Cases `0, 2, 5` compare one at a time.
#[test]
fn sparse_switch_uses_compare_chain() {
    // v0 = index temporary, v1 = k, v2..v4 = case constants
    let lifted = lift(&switch_over(&[0, 2, 5], false), "f");
    assert_eq!(
        block(&lifted, 0),
        &[
            Instruction::Load(v(1)),
            Instruction::Store(v(0)),
            Instruction::Load(v(0)),
            Instruction::Load(v(2)),
            Instruction::BranchIfEqual(l(1)),
            Instruction::Load(v(0)),
            Instruction::Load(v(3)),
            Instruction::BranchIfEqual(l(2)),
            Instruction::Load(v(0)),
            Instruction::Load(v(4)),
            Instruction::BranchIfEqual(l(3)),
            Instruction::Branch(l(4)),
        ]
    );
    assert_eq!(lifted.variables.get(v(4)).kind, VariableKind::Constant(Constant::I4(5)));
}

/// A case target with phis is reached through its own block.
#[test]
fn switch_case_with_phi_detours() {
    // v0 = phi, v1 = k; blocks: entry, case0, default, detour
    let lifted = lift(&switch_over(&[0], true), "f");
    assert_eq!(
        block(&lifted, 0),
        &[
            Instruction::Load(v(1)),
            Instruction::Switch(vec![l(3)]),
            Instruction::Branch(l(2)),
        ]
    );
    assert_eq!(
        block(&lifted, 3),
        &[
            Instruction::Load(v(1)),
            Instruction::PhiEnqueue(TargetType::I32),
            Instruction::Branch(l(1)),
        ]
    );
}

/// A phi after the first non-phi instruction is rejected.
#[test]
fn late_phi_is_unsupported() {
    let mut mb = ModuleBuilder::new("m");
    let i32_ty = mb.types().int(32);
    let fn_ty = mb.types().function(i32_ty, vec![i32_ty], false);
    let f = mb.add_function("f", fn_ty);
    let entry = mb.append_block(f, "entry");
    let next = mb.append_block(f, "next");
    let p = mb.param(f, 0);
    mb.position_at(f, entry);
    mb.br(next);
    mb.position_at(f, next);
    mb.binary(BinaryOp::Add, p, p);
    let late = mb.phi(i32_ty, &[(p, entry)]);
    mb.ret(Some(late));
    let module = mb.finish();

    let err = lift_err(&module, "f");
    assert!(matches!(err, LowerError::Unsupported { opcode: "phi", .. }), "{err}");
}

/// `resume` belongs to landing-pad exception handling, which has no
/// lowering.
#[test]
fn resume_is_unsupported() {
    let mut mb = ModuleBuilder::new("m");
    let void = mb.types().void();
    let ptr = mb.types().ptr();
    let fn_ty = mb.types().function(void, vec![ptr], false);
    let f = mb.add_function("f", fn_ty);
    let entry = mb.append_block(f, "entry");
    let exn = mb.param(f, 0);
    mb.position_at(f, entry);
    mb.build(Opcode::Resume, void, [Operand::Value(exn)].into_iter().collect());
    let module = mb.finish();

    let err = lift_err(&module, "f");
    assert!(matches!(err, LowerError::Unsupported { opcode: "resume", .. }), "{err}");
}

fn helper_call(helper: Helper) -> Instruction {
    Instruction::Call {
        sig: helper.signature(),
        target: CallTarget::Helper(helper),
    }
}

/// `va_arg` takes the slot address from the list, then reads through the
/// argument address stored in it.
#[test]
fn va_arg_reads_through_the_slot() {
    let mut mb = ModuleBuilder::new("m");
    let i32_ty = mb.types().int(32);
    let ptr = mb.types().ptr();
    let fn_ty = mb.types().function(i32_ty, vec![ptr], false);
    let f = mb.add_function("f", fn_ty);
    let entry = mb.append_block(f, "entry");
    let list = mb.param(f, 0);
    mb.position_at(f, entry);
    let arg = mb.va_arg(i32_ty, list);
    mb.ret(Some(arg));
    let module = mb.finish();

    // v0 = %arg, v1 = %list
    let lifted = lift(&module, "f");
    assert_eq!(
        block(&lifted, 0),
        &[
            Instruction::Load(v(1)),
            helper_call(Helper::VAArg),
            Instruction::LoadIndirect(TargetType::Pointer),
            Instruction::LoadIndirect(TargetType::I32),
            Instruction::Store(v(0)),
            Instruction::Load(v(0)),
            Instruction::Return { has_value: true },
        ]
    );
}

/// `define i32 @sum(i32 %n, ...)` walking its own variadic arguments with
/// `va_start`/`va_arg`/`va_end`. With `variadic` unset the same body sits
/// in a fixed-arity function.
fn variadic_definition(variadic: bool) -> Module {
    let mut mb = ModuleBuilder::new("m");
    let void = mb.types().void();
    let i32_ty = mb.types().int(32);
    let ptr = mb.types().ptr();
    let list_fn = mb.types().function(void, vec![ptr], false);
    let va_start = mb.add_function("llvm.va_start.p0", list_fn);
    let va_end = mb.add_function("llvm.va_end", list_fn);
    let (start_value, end_value) = (mb.function_value(va_start), mb.function_value(va_end));

    let fn_ty = mb.types().function(i32_ty, vec![i32_ty], variadic);
    let f = mb.add_function("sum", fn_ty);
    let entry = mb.append_block(f, "entry");
    mb.position_at(f, entry);
    let list = mb.alloca(ptr, None);
    mb.call(list_fn, start_value, &[list]);
    let first = mb.va_arg(i32_ty, list);
    mb.call(list_fn, end_value, &[list]);
    mb.ret(Some(first));
    mb.finish()
}

/// `va_start` hands the trailing parameter to the list; `va_end` vanishes.
#[test]
fn va_start_reads_the_variadic_parameter() {
    let lifted = lift(&variadic_definition(true), "sum");

    // v0 = list storage, v1 = %first, v2 = trailing parameter
    assert_eq!(
        block(&lifted, 0),
        &[
            Instruction::Initialize(v(0)),
            Instruction::AddressOf(v(0)),
            Instruction::Load(v(2)),
            helper_call(Helper::VAStart),
            Instruction::AddressOf(v(0)),
            helper_call(Helper::VAArg),
            Instruction::LoadIndirect(TargetType::Pointer),
            Instruction::LoadIndirect(TargetType::I32),
            Instruction::Store(v(1)),
            Instruction::Load(v(1)),
            Instruction::Return { has_value: true },
        ]
    );
    let span = lifted.variables.get(v(2));
    assert_eq!(span.kind, VariableKind::Parameter { index: 1 });
    assert_eq!(span.ty, TargetType::ReadOnlySpan);
    assert_eq!(
        lifted.signature.params,
        vec![TargetType::I32, TargetType::ReadOnlySpan]
    );
}

#[test]
fn va_start_needs_a_variadic_function() {
    let err = lift_err(&variadic_definition(false), "sum");
    assert!(
        matches!(
            err,
            LowerError::Unsupported {
                construct: "va_start outside a variadic function",
                ..
            }
        ),
        "{err}"
    );
}

/// Element access, insertion, and shuffles call helpers typed by the
/// vector; a 64-bit index is narrowed first.
#[test]
fn vector_operations_use_helpers() {
    let mut mb = ModuleBuilder::new("m");
    let i32_ty = mb.types().int(32);
    let i64_ty = mb.types().int(64);
    let v4 = mb.types().vector(i32_ty, 4);
    let v2 = mb.types().vector(i32_ty, 2);
    let fn_ty = mb.types().function(i32_ty, vec![v4, i64_ty], false);
    let f = mb.add_function("f", fn_ty);
    let entry = mb.append_block(f, "entry");
    let (vector, index) = (mb.param(f, 0), mb.param(f, 1));
    let zero = mb.const_int(i32_ty, 0);
    let one = mb.const_int(i32_ty, 1);
    let mask = mb.zero(v2);
    mb.position_at(f, entry);
    let e = mb.extract_element(vector, index);
    let w = mb.insert_element(vector, e, zero);
    let s = mb.shuffle_vector(w, w, mask);
    let r = mb.extract_element(s, one);
    mb.ret(Some(r));
    let module = mb.finish();

    let wide = TargetType::inline_array(TargetType::I32, 4);
    let narrow = TargetType::inline_array(TargetType::I32, 2);
    // v0..v3 = %e %w %s %r, v4 = %vector, v5 = %index, v6 = 0, v7 = mask,
    // v8 = 1
    let lifted = lift(&module, "f");
    assert_eq!(
        block(&lifted, 0),
        &[
            Instruction::Load(v(4)),
            Instruction::Load(v(5)),
            Instruction::Convert {
                to: TargetType::I32,
                unsigned: false,
            },
            helper_call(Helper::ExtractElement {
                vector: wide.clone(),
                element: TargetType::I32,
            }),
            Instruction::Store(v(0)),
            Instruction::Load(v(4)),
            Instruction::Load(v(0)),
            Instruction::Load(v(6)),
            helper_call(Helper::InsertElement {
                vector: wide.clone(),
                element: TargetType::I32,
            }),
            Instruction::Store(v(1)),
            Instruction::Load(v(1)),
            Instruction::Load(v(1)),
            Instruction::Load(v(7)),
            helper_call(Helper::ShuffleVector {
                vector: wide,
                mask: narrow.clone(),
                result: narrow.clone(),
            }),
            Instruction::Store(v(2)),
            Instruction::Load(v(2)),
            Instruction::Load(v(8)),
            helper_call(Helper::ExtractElement {
                vector: narrow,
                element: TargetType::I32,
            }),
            Instruction::Store(v(3)),
            Instruction::Load(v(3)),
            Instruction::Return { has_value: true },
        ]
    );
    assert_eq!(lifted.variables.get(v(7)).kind, VariableKind::Constant(Constant::Default));
}

// ── Calls and exceptions ────────────────────────────────────────────

/// Only calls that can throw are followed by a pending-exception check.
#[test]
fn throwing_call_checks_pending_exception() {
    let mut mb = ModuleBuilder::new("m");
    let void = mb.types().void();
    let fn_ty = mb.types().function(void, vec![], false);
    let thrower = mb.add_function("_CxxThrowException", fn_ty);
    let quiet = mb.add_function("quiet", fn_ty);
    let (thrower_value, quiet_value) = (mb.function_value(thrower), mb.function_value(quiet));
    let f = mb.add_function("f", fn_ty);
    let entry = mb.append_block(f, "entry");
    mb.position_at(f, entry);
    mb.call(fn_ty, thrower_value, &[]);
    mb.call(fn_ty, quiet_value, &[]);
    mb.ret(None);
    let module = mb.finish();

    let lifted = lift(&module, "f");
    let sig = Signature::new(vec![], TargetType::Void);
    assert_eq!(
        block(&lifted, 0),
        &[
            Instruction::Call {
                target: CallTarget::Function(thrower),
                sig: sig.clone(),
            },
            Instruction::ReturnIfExceptionPending {
                ret: TargetType::Void,
                leave_frame: false,
            },
            Instruction::Call {
                target: CallTarget::Function(quiet),
                sig,
            },
            Instruction::Return { has_value: false },
        ]
    );
}

/// A throwing function with stack allocations keeps them in its frame and
/// reads them directly.
#[test]
fn throwing_function_uses_frame() {
    let mut mb = ModuleBuilder::new("m");
    let void = mb.types().void();
    let i32_ty = mb.types().int(32);
    let thrower_ty = mb.types().function(void, vec![], false);
    let fn_ty = mb.types().function(i32_ty, vec![], false);
    let thrower = mb.add_function("_CxxThrowException", thrower_ty);
    let thrower_value = mb.function_value(thrower);
    let f = mb.add_function("f", fn_ty);
    let entry = mb.append_block(f, "entry");
    let five = mb.const_int(i32_ty, 5);
    mb.position_at(f, entry);
    let slot = mb.alloca(i32_ty, None);
    mb.store(five, slot);
    mb.call(thrower_ty, thrower_value, &[]);
    let value = mb.load(i32_ty, slot);
    mb.ret(Some(value));
    let module = mb.finish();

    // v0 = frame slot, v1 = loaded value, v2 = constant 5
    let lifted = lift(&module, "f");
    assert!(lifted.needs_frame);
    assert_eq!(lifted.variables.get(v(0)).kind, VariableKind::FrameField { slot: 0 });
    assert_eq!(
        block(&lifted, 0),
        &[
            Instruction::EnterFrame,
            Instruction::Initialize(v(0)),
            Instruction::Load(v(2)),
            Instruction::Store(v(0)),
            Instruction::Call {
                target: CallTarget::Function(thrower),
                sig: Signature::new(vec![], TargetType::Void),
            },
            Instruction::ReturnIfExceptionPending {
                ret: TargetType::I32,
                leave_frame: true,
            },
            Instruction::Load(v(0)),
            Instruction::Store(v(1)),
            Instruction::Load(v(1)),
            Instruction::LeaveFrame,
            Instruction::Return { has_value: true },
        ]
    );
}

/// Trailing variadic arguments are packed into a read-only span.
#[test]
fn variadic_call_packs_arguments() {
    let mut mb = ModuleBuilder::new("m");
    let void = mb.types().void();
    let i32_ty = mb.types().int(32);
    let ptr = mb.types().ptr();
    let printf_ty = mb.types().function(i32_ty, vec![ptr], true);
    let fn_ty = mb.types().function(void, vec![ptr, i32_ty], false);
    let printf = mb.add_function("printf", printf_ty);
    let printf_value = mb.function_value(printf);
    let f = mb.add_function("f", fn_ty);
    let entry = mb.append_block(f, "entry");
    let (format, x) = (mb.param(f, 0), mb.param(f, 1));
    mb.position_at(f, entry);
    mb.call(printf_ty, printf_value, &[format, x]);
    mb.ret(None);
    let module = mb.finish();

    let lifted = lift(&module, "f");
    let targets: Vec<&CallTarget> = block(&lifted, 0)
        .iter()
        .filter_map(|i| match i {
            Instruction::Call { target, .. } => Some(target),
            _ => None,
        })
        .collect();
    assert_eq!(
        targets,
        vec![
            &CallTarget::Helper(Helper::InlineArrayAsSpan { len: 1 }),
            &CallTarget::Helper(Helper::SpanGetItem),
            &CallTarget::Helper(Helper::SpanAsReadOnly),
            &CallTarget::Function(printf),
        ]
    );
    let call = block(&lifted, 0)
        .iter()
        .find(|i| matches!(i, Instruction::Call { target: CallTarget::Function(_), .. }));
    assert_eq!(
        call,
        Some(&Instruction::Call {
            target: CallTarget::Function(printf),
            sig: Signature::new(
                vec![TargetType::Pointer, TargetType::ReadOnlySpan],
                TargetType::I32
            ),
        })
    );
}

/// Handlers are tried in order, each in its own block, and an exhausted
/// dispatch returns with the exception still pending.
#[test]
fn catch_switch_tests_handlers_in_order() {
    let mut mb = ModuleBuilder::new("m");
    let void = mb.types().void();
    let i32_ty = mb.types().int(32);
    let fn_ty = mb.types().function(void, vec![], false);
    let personality_ty = mb.types().function(i32_ty, vec![], true);
    let personality = mb.add_function("__CxxFrameHandler3", personality_ty);
    let thrower = mb.add_function("_CxxThrowException", fn_ty);
    let thrower_value = mb.function_value(thrower);
    let f = mb.add_function("f", fn_ty);
    mb.set_personality(f, personality);
    let entry = mb.append_block(f, "entry");
    let ok = mb.append_block(f, "ok");
    let dispatch = mb.append_block(f, "dispatch");
    let h1 = mb.append_block(f, "h1");
    let h2 = mb.append_block(f, "h2");
    let one = mb.const_int(i32_ty, 1);
    let two = mb.const_int(i32_ty, 2);

    mb.position_at(f, entry);
    mb.invoke(fn_ty, thrower_value, &[], ok, dispatch);
    mb.position_at(f, ok);
    mb.ret(None);
    mb.position_at(f, dispatch);
    let none = mb.none_token();
    let cs = mb.catch_switch(none, &[h1, h2], None);
    mb.position_at(f, h1);
    let p1 = mb.catch_pad(cs, &[one]);
    mb.catch_ret(p1, ok);
    mb.position_at(f, h2);
    let p2 = mb.catch_pad(cs, &[two]);
    mb.catch_ret(p2, ok);
    let module = mb.finish();

    let lifted = lift(&module, "f");
    let slot = exception_slot(&lifted);
    assert_eq!(lifted.blocks.len(), 7);

    assert_eq!(
        &block(&lifted, 0)[1..],
        &[
            Instruction::Load(slot),
            Instruction::BranchIfTrue(l(2)),
            Instruction::Branch(l(1)),
        ]
    );

    // dispatch tests h1, then falls to L5 which tests h2, then L6 gives up
    let first = block(&lifted, 2);
    assert_eq!(calls_to(first, personality), 1);
    assert_eq!(
        &first[first.len() - 2..],
        &[Instruction::BranchIfTrue(l(5)), Instruction::Branch(l(3))]
    );
    let second = block(&lifted, 5);
    assert_eq!(calls_to(second, personality), 1);
    assert_eq!(
        &second[second.len() - 2..],
        &[Instruction::BranchIfTrue(l(6)), Instruction::Branch(l(4))]
    );
    assert_eq!(
        block(&lifted, 6),
        &[Instruction::ReturnDefault(TargetType::Void)]
    );
    let total: usize = lifted.blocks.iter().map(|b| calls_to(&b.instructions, personality)).sum();
    assert_eq!(total, 2);

    let pad = var_of(&lifted, p1);
    let null = lifted
        .variables
        .iter()
        .find(|(_, var)| var.kind == VariableKind::Constant(Constant::Null))
        .map(|(id, _)| id)
        .unwrap_or_else(|| panic!("no null constant"));
    let dispose = Helper::ExceptionDispose;
    assert_eq!(
        block(&lifted, 3),
        &[
            Instruction::Load(slot),
            Instruction::Store(pad),
            Instruction::Load(null),
            Instruction::Store(slot),
            Instruction::Load(pad),
            Instruction::Call {
                sig: dispose.signature(),
                target: CallTarget::Helper(dispose),
            },
            Instruction::Branch(l(1)),
        ]
    );
}

/// `catchswitch` needs a personality routine to consult.
#[test]
fn catch_switch_without_personality_is_unsupported() {
    let mut mb = ModuleBuilder::new("m");
    let void = mb.types().void();
    let fn_ty = mb.types().function(void, vec![], false);
    let f = mb.add_function("f", fn_ty);
    let dispatch = mb.append_block(f, "dispatch");
    let handler = mb.append_block(f, "handler");
    mb.position_at(f, dispatch);
    let none = mb.none_token();
    let cs = mb.catch_switch(none, &[handler], None);
    mb.position_at(f, handler);
    let pad = mb.catch_pad(cs, &[]);
    mb.catch_ret(pad, dispatch);
    let module = mb.finish();

    let err = lift_err(&module, "f");
    assert!(
        matches!(err, LowerError::Unsupported { opcode: "catchswitch", .. }),
        "{err}"
    );
}

/// `cleanupret` without a destination puts the exception back and leaves.
#[test]
fn cleanup_ret_restores_exception() {
    let mut mb = ModuleBuilder::new("m");
    let void = mb.types().void();
    let fn_ty = mb.types().function(void, vec![], false);
    let f = mb.add_function("f", fn_ty);
    let entry = mb.append_block(f, "entry");
    mb.position_at(f, entry);
    let none = mb.none_token();
    let pad = mb.cleanup_pad(none, &[]);
    mb.cleanup_ret(pad, None);
    let module = mb.finish();

    let lifted = lift(&module, "f");
    let slot = exception_slot(&lifted);
    let pad_var = var_of(&lifted, pad);
    assert_eq!(
        &block(&lifted, 0)[4..],
        &[
            Instruction::Load(pad_var),
            Instruction::Store(slot),
            Instruction::ReturnDefault(TargetType::Void),
        ]
    );
}

/// An exhausted dispatch with an unwind destination keeps unwinding there.
#[test]
fn catch_switch_falls_through_to_unwind_dest() {
    let mut mb = ModuleBuilder::new("m");
    let void = mb.types().void();
    let i32_ty = mb.types().int(32);
    let fn_ty = mb.types().function(void, vec![], false);
    let personality_ty = mb.types().function(i32_ty, vec![], true);
    let personality = mb.add_function("__CxxFrameHandler3", personality_ty);
    let thrower = mb.add_function("_CxxThrowException", fn_ty);
    let thrower_value = mb.function_value(thrower);
    let f = mb.add_function("f", fn_ty);
    mb.set_personality(f, personality);
    let entry = mb.append_block(f, "entry");
    let ok = mb.append_block(f, "ok");
    let dispatch = mb.append_block(f, "dispatch");
    let handler = mb.append_block(f, "handler");
    let outer = mb.append_block(f, "outer");

    mb.position_at(f, entry);
    mb.invoke(fn_ty, thrower_value, &[], ok, dispatch);
    mb.position_at(f, ok);
    mb.ret(None);
    mb.position_at(f, dispatch);
    let none = mb.none_token();
    let cs = mb.catch_switch(none, &[handler], Some(outer));
    mb.position_at(f, handler);
    let pad = mb.catch_pad(cs, &[]);
    mb.catch_ret(pad, ok);
    mb.position_at(f, outer);
    let cleanup = mb.cleanup_pad(none, &[]);
    mb.cleanup_ret(cleanup, None);
    let module = mb.finish();

    let lifted = lift(&module, "f");
    assert_eq!(lifted.blocks.len(), 6);
    let dispatch_block = block(&lifted, 2);
    assert_eq!(calls_to(dispatch_block, personality), 1);
    assert_eq!(
        &dispatch_block[dispatch_block.len() - 2..],
        &[Instruction::BranchIfTrue(l(5)), Instruction::Branch(l(3))]
    );
    assert_eq!(block(&lifted, 5), &[Instruction::Branch(l(4))]);
}

/// `cleanupret` with a destination puts the exception back and jumps.
#[test]
fn cleanup_ret_unwinds_to_destination() {
    let mut mb = ModuleBuilder::new("m");
    let void = mb.types().void();
    let fn_ty = mb.types().function(void, vec![], false);
    let f = mb.add_function("f", fn_ty);
    let entry = mb.append_block(f, "entry");
    let outer = mb.append_block(f, "outer");
    mb.position_at(f, entry);
    let none = mb.none_token();
    let inner_pad = mb.cleanup_pad(none, &[]);
    mb.cleanup_ret(inner_pad, Some(outer));
    mb.position_at(f, outer);
    let outer_pad = mb.cleanup_pad(none, &[]);
    mb.cleanup_ret(outer_pad, None);
    let module = mb.finish();

    let lifted = lift(&module, "f");
    let slot = exception_slot(&lifted);
    let pad_var = var_of(&lifted, inner_pad);
    assert_eq!(
        &block(&lifted, 0)[4..],
        &[
            Instruction::Load(pad_var),
            Instruction::Store(slot),
            Instruction::Branch(l(1)),
        ]
    );
    assert_eq!(
        block(&lifted, 1).last(),
        Some(&Instruction::ReturnDefault(TargetType::Void))
    );
}

/// When both `invoke` successors open with phis, the unwind edge goes
/// through a synthesized block and each edge carries its own operand.
#[test]
fn invoke_detours_when_both_successors_have_phis() {
    let mut mb = ModuleBuilder::new("m");
    let void = mb.types().void();
    let i32_ty = mb.types().int(32);
    let thrower_ty = mb.types().function(void, vec![], false);
    let fn_ty = mb.types().function(i32_ty, vec![], false);
    let thrower = mb.add_function("_CxxThrowException", thrower_ty);
    let thrower_value = mb.function_value(thrower);
    let f = mb.add_function("f", fn_ty);
    let entry = mb.append_block(f, "entry");
    let ok = mb.append_block(f, "ok");
    let cleanup = mb.append_block(f, "cleanup");
    let one = mb.const_int(i32_ty, 1);
    let two = mb.const_int(i32_ty, 2);

    mb.position_at(f, entry);
    mb.invoke(thrower_ty, thrower_value, &[], ok, cleanup);
    mb.position_at(f, ok);
    let normal = mb.phi(i32_ty, &[(one, entry)]);
    mb.ret(Some(normal));
    mb.position_at(f, cleanup);
    let unwound = mb.phi(i32_ty, &[(two, entry)]);
    let none = mb.none_token();
    let pad = mb.cleanup_pad(none, &[]);
    mb.cleanup_ret(pad, None);
    let module = mb.finish();

    let lifted = lift(&module, "f");
    let slot = exception_slot(&lifted);
    let (c1, c2) = (
        constant_var(&lifted, Constant::I4(1)),
        constant_var(&lifted, Constant::I4(2)),
    );
    assert_eq!(lifted.blocks.len(), 4);
    assert_eq!(
        &block(&lifted, 0)[1..],
        &[
            Instruction::Load(slot),
            Instruction::BranchIfTrue(l(3)),
            Instruction::Load(c1),
            Instruction::PhiEnqueue(TargetType::I32),
            Instruction::Branch(l(1)),
        ]
    );
    assert_eq!(
        block(&lifted, 3),
        &[
            Instruction::Load(c2),
            Instruction::PhiEnqueue(TargetType::I32),
            Instruction::Branch(l(2)),
        ]
    );
    assert_eq!(
        &block(&lifted, 1)[..2],
        &[
            Instruction::PhiDequeue(TargetType::I32),
            Instruction::Store(var_of(&lifted, normal)),
        ]
    );
    assert_eq!(
        &block(&lifted, 2)[..2],
        &[
            Instruction::PhiDequeue(TargetType::I32),
            Instruction::Store(var_of(&lifted, unwound)),
        ]
    );
}

/// `catchret` into a join block carries the handler's phi operand.
#[test]
fn catch_ret_carries_phi_operand() {
    let mut mb = ModuleBuilder::new("m");
    let void = mb.types().void();
    let i32_ty = mb.types().int(32);
    let thrower_ty = mb.types().function(void, vec![], false);
    let fn_ty = mb.types().function(i32_ty, vec![], false);
    let personality_ty = mb.types().function(i32_ty, vec![], true);
    let personality = mb.add_function("__CxxFrameHandler3", personality_ty);
    let thrower = mb.add_function("_CxxThrowException", thrower_ty);
    let thrower_value = mb.function_value(thrower);
    let f = mb.add_function("f", fn_ty);
    mb.set_personality(f, personality);
    let entry = mb.append_block(f, "entry");
    let ok = mb.append_block(f, "ok");
    let dispatch = mb.append_block(f, "dispatch");
    let handler = mb.append_block(f, "handler");
    let join = mb.append_block(f, "join");
    let one = mb.const_int(i32_ty, 1);
    let two = mb.const_int(i32_ty, 2);

    mb.position_at(f, entry);
    mb.invoke(thrower_ty, thrower_value, &[], ok, dispatch);
    mb.position_at(f, ok);
    mb.br(join);
    mb.position_at(f, dispatch);
    let none = mb.none_token();
    let cs = mb.catch_switch(none, &[handler], None);
    mb.position_at(f, handler);
    let pad = mb.catch_pad(cs, &[]);
    mb.catch_ret(pad, join);
    mb.position_at(f, join);
    let r = mb.phi(i32_ty, &[(one, ok), (two, handler)]);
    mb.ret(Some(r));
    let module = mb.finish();

    let lifted = lift(&module, "f");
    let pad_var = var_of(&lifted, pad);
    let (c1, c2) = (
        constant_var(&lifted, Constant::I4(1)),
        constant_var(&lifted, Constant::I4(2)),
    );
    let dispose = Helper::ExceptionDispose;
    assert_eq!(
        &block(&lifted, 3)[4..],
        &[
            Instruction::Load(pad_var),
            Instruction::Call {
                sig: dispose.signature(),
                target: CallTarget::Helper(dispose),
            },
            Instruction::Load(c2),
            Instruction::PhiEnqueue(TargetType::I32),
            Instruction::Branch(l(4)),
        ]
    );
    assert_eq!(
        block(&lifted, 1),
        &[
            Instruction::Load(c1),
            Instruction::PhiEnqueue(TargetType::I32),
            Instruction::Branch(l(4)),
        ]
    );
}

// ── Global initializers ─────────────────────────────────────────────

#[test]
fn global_initializer_stores_and_returns() {
    let module = counting_loop();
    let global = module
        .globals()
        .next()
        .map(|g| g.id)
        .unwrap_or_else(|| panic!("no global"));

    let init = initialize_global(&module, &NaturalLayout, global)
        .unwrap_or_else(|e| panic!("initializer failed: {e}"));
    assert_eq!(init.name, "limit");
    assert_eq!(
        init.block.instructions,
        vec![
            Instruction::Load(v(1)),
            Instruction::Store(v(0)),
            Instruction::Return { has_value: false },
        ]
    );
    assert_eq!(init.variables.get(v(0)).kind, VariableKind::Global(global));
}
