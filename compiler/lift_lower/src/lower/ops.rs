//! Arithmetic, comparisons, conversions, and other value-producing
//! operations. Shared by instructions and constant expressions: each
//! operation pushes its operands, computes, and stores into `result`.

use lift_ir::{
    BinaryOp as SourceBinaryOp, CastOp, FloatPredicate, IntPredicate, Opcode, TypeId, ValueId,
};

use super::Lifter;
use crate::cil::{
    BinaryOp, CallTarget, Comparison, Constant, Helper, Instruction, TargetType, VarId,
};
use crate::error::LowerResult;
use crate::oracle::TypeOracle;

fn binary_op(op: SourceBinaryOp) -> BinaryOp {
    match op {
        SourceBinaryOp::Add | SourceBinaryOp::FAdd => BinaryOp::Add,
        SourceBinaryOp::Sub | SourceBinaryOp::FSub => BinaryOp::Sub,
        SourceBinaryOp::Mul | SourceBinaryOp::FMul => BinaryOp::Mul,
        SourceBinaryOp::SDiv | SourceBinaryOp::FDiv => BinaryOp::Div,
        SourceBinaryOp::UDiv => BinaryOp::DivUn,
        SourceBinaryOp::SRem | SourceBinaryOp::FRem => BinaryOp::Rem,
        SourceBinaryOp::URem => BinaryOp::RemUn,
        SourceBinaryOp::Shl => BinaryOp::Shl,
        SourceBinaryOp::LShr => BinaryOp::ShrUn,
        SourceBinaryOp::AShr => BinaryOp::Shr,
        SourceBinaryOp::And => BinaryOp::And,
        SourceBinaryOp::Or => BinaryOp::Or,
        SourceBinaryOp::Xor => BinaryOp::Xor,
    }
}

/// Comparison to emit and whether its result is inverted afterwards.
fn int_comparison(pred: IntPredicate) -> (Comparison, bool) {
    match pred {
        IntPredicate::Eq => (Comparison::Eq, false),
        IntPredicate::Ne => (Comparison::Eq, true),
        IntPredicate::Ugt => (Comparison::GtUn, false),
        IntPredicate::Uge => (Comparison::LtUn, true),
        IntPredicate::Ult => (Comparison::LtUn, false),
        IntPredicate::Ule => (Comparison::GtUn, true),
        IntPredicate::Sgt => (Comparison::Gt, false),
        IntPredicate::Sge => (Comparison::Lt, true),
        IntPredicate::Slt => (Comparison::Lt, false),
        IntPredicate::Sle => (Comparison::Gt, true),
    }
}

/// Unsigned (`.un`) float comparisons are true when either side is NaN,
/// ordered ones are false.
fn float_comparison(pred: FloatPredicate) -> Option<(Comparison, bool)> {
    Some(match pred {
        FloatPredicate::Oeq | FloatPredicate::Ueq => (Comparison::Eq, false),
        FloatPredicate::Ogt => (Comparison::Gt, false),
        FloatPredicate::Oge => (Comparison::LtUn, true),
        FloatPredicate::Olt => (Comparison::Lt, false),
        FloatPredicate::Ole => (Comparison::GtUn, true),
        FloatPredicate::One | FloatPredicate::Une => (Comparison::Eq, true),
        FloatPredicate::Ugt => (Comparison::GtUn, false),
        FloatPredicate::Uge => (Comparison::Lt, true),
        FloatPredicate::Ult => (Comparison::LtUn, false),
        FloatPredicate::Ule => (Comparison::Gt, true),
        FloatPredicate::False
        | FloatPredicate::True
        | FloatPredicate::Ord
        | FloatPredicate::Uno => return None,
    })
}

impl<O: TypeOracle + ?Sized> Lifter<'_, O> {
    pub(super) fn lower_operation(
        &mut self,
        opcode: &Opcode,
        operands: &[ValueId],
        ty: TypeId,
        result: VarId,
        origin: ValueId,
    ) -> LowerResult<()> {
        let name = opcode.name();
        let operand = |i: usize| {
            operands.get(i).copied().ok_or_else(|| {
                self.invariant(format!("missing operand {i} of {}", self.describe(origin)))
            })
        };
        let (a, b, c) = (operand(0), operand(1), operand(2));

        match opcode {
            Opcode::Binary(op) => {
                self.load_value(a?)?;
                self.load_value(b?)?;
                self.emit(Instruction::Binary(binary_op(*op)));
            }
            Opcode::FNeg => {
                self.load_value(a?)?;
                self.emit(Instruction::Negate);
            }
            Opcode::ICmp(pred) => {
                self.load_value(a?)?;
                self.load_value(b?)?;
                let (cmp, invert) = int_comparison(*pred);
                self.emit_compare(cmp, invert);
            }
            Opcode::FCmp(pred) => {
                self.load_value(a?)?;
                self.load_value(b?)?;
                match (pred, float_comparison(*pred)) {
                    (_, Some((cmp, invert))) => self.emit_compare(cmp, invert),
                    (FloatPredicate::False | FloatPredicate::True, None) => {
                        self.emit(Instruction::Pop);
                        self.emit(Instruction::Pop);
                        let value = i32::from(*pred == FloatPredicate::True);
                        let var = self.constant(Constant::I4(value), TargetType::Bool);
                        self.emit(Instruction::Load(var));
                    }
                    _ => return Err(self.unsupported(name, "predicate", origin)),
                }
            }
            Opcode::Cast(op) => self.lower_cast(*op, a?, ty, origin)?,
            Opcode::GetElementPtr { source_element } => {
                self.lower_gep(operands, *source_element, origin)?;
            }
            Opcode::Select => {
                let cond = a?;
                if self.module.types.int_bits(self.module.type_of(cond)) != Some(1) {
                    return Err(self.unsupported(name, "non-boolean condition", origin));
                }
                let target = self.lower_type(ty, origin, name)?;
                self.load_value(cond)?;
                self.load_value(b?)?;
                self.load_value(c?)?;
                self.call_helper(Helper::Select(target));
            }
            Opcode::Freeze => self.load_value(a?)?,
            Opcode::ExtractValue { indices } => {
                return self.lower_extract_value(a?, indices, result, origin);
            }
            Opcode::InsertValue { indices } => {
                return self.lower_insert_value(a?, b?, indices, result, origin);
            }
            Opcode::VAArg => {
                let target = self.lower_type(ty, origin, name)?;
                self.load_value(a?)?;
                self.call_helper(Helper::VAArg);
                // Each slot of a variadic pack holds the address of its argument.
                self.emit(Instruction::LoadIndirect(TargetType::Pointer));
                self.emit(Instruction::LoadIndirect(target));
            }
            Opcode::ExtractElement => {
                let vector_value = a?;
                let vector = self.lower_type(self.module.type_of(vector_value), origin, name)?;
                let element = self.vector_element(&vector, origin, name)?;
                self.load_value(vector_value)?;
                self.load_element_index(b?, origin, name)?;
                self.call_helper(Helper::ExtractElement { vector, element });
            }
            Opcode::InsertElement => {
                let vector_value = a?;
                let vector = self.lower_type(self.module.type_of(vector_value), origin, name)?;
                let element = self.vector_element(&vector, origin, name)?;
                self.load_value(vector_value)?;
                self.load_value(b?)?;
                self.load_element_index(c?, origin, name)?;
                self.call_helper(Helper::InsertElement { vector, element });
            }
            Opcode::ShuffleVector => {
                let (first, second, mask_value) = (a?, b?, c?);
                let vector = self.lower_type(self.module.type_of(first), origin, name)?;
                self.vector_element(&vector, origin, name)?;
                let mask = self.lower_type(self.module.type_of(mask_value), origin, name)?;
                let result_ty = self.lower_type(ty, origin, name)?;
                self.load_value(first)?;
                self.load_value(second)?;
                self.load_value(mask_value)?;
                self.call_helper(Helper::ShuffleVector {
                    vector,
                    mask,
                    result: result_ty,
                });
            }
            _ => return Err(self.unsupported(name, "operation", origin)),
        }

        self.emit(Instruction::Store(result));
        Ok(())
    }

    fn vector_element(
        &self,
        vector: &TargetType,
        origin: ValueId,
        name: &'static str,
    ) -> LowerResult<TargetType> {
        match vector {
            TargetType::InlineArray { element, .. } => Ok((**element).clone()),
            _ => Err(self.unsupported(name, "non-vector operand", origin)),
        }
    }

    /// Push a vector index as an `int32`.
    fn load_element_index(
        &mut self,
        index: ValueId,
        origin: ValueId,
        name: &'static str,
    ) -> LowerResult<()> {
        let bits = self
            .module
            .types
            .int_bits(self.module.type_of(index))
            .ok_or_else(|| self.unsupported(name, "non-integer index", origin))?;
        self.load_value(index)?;
        if bits > 32 {
            self.emit(Instruction::Convert {
                to: TargetType::I32,
                unsigned: false,
            });
        }
        Ok(())
    }

    /// Emit `cmp`, followed by a logical not when `invert` is set.
    fn emit_compare(&mut self, cmp: Comparison, invert: bool) {
        self.emit(Instruction::Compare(cmp));
        if invert {
            let zero = self.constant(Constant::I4(0), TargetType::I32);
            self.emit(Instruction::Load(zero));
            self.emit(Instruction::Compare(Comparison::Eq));
        }
    }

    fn lower_cast(
        &mut self,
        op: CastOp,
        value: ValueId,
        ty: TypeId,
        origin: ValueId,
    ) -> LowerResult<()> {
        let name = op.name();
        let from = self.lower_type(self.module.type_of(value), origin, name)?;
        let to = self.lower_type(ty, origin, name)?;
        self.load_value(value)?;

        match op {
            CastOp::BitCast | CastOp::AddrSpaceCast => {
                if !from.compatible_with(&to) {
                    self.call_helper(Helper::BitCast { from, to });
                }
            }
            CastOp::Trunc
            | CastOp::SExt
            | CastOp::FPToSI
            | CastOp::SIToFP
            | CastOp::FPTrunc
            | CastOp::FPExt
            | CastOp::PtrToInt => {
                self.emit(Instruction::Convert { to, unsigned: false });
            }
            CastOp::ZExt | CastOp::FPToUI | CastOp::UIToFP => {
                self.emit(Instruction::Convert { to, unsigned: true });
            }
            CastOp::IntToPtr => {
                self.emit(Instruction::Convert {
                    to: TargetType::NativeInt,
                    unsigned: true,
                });
            }
        }
        Ok(())
    }

    pub(super) fn call_helper(&mut self, helper: Helper) {
        let sig = helper.signature();
        self.emit(Instruction::Call {
            target: CallTarget::Helper(helper),
            sig,
        });
    }
}
