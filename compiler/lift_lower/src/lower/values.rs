//! Pushing source operands onto the evaluation stack.

use lift_ir::{GlobalId, Type, TypeId, ValueId, ValueKind};

use super::{Lifter, SharedVar};
use crate::cil::{Constant, Instruction, TargetType, VarId, VariableKind};
use crate::error::LowerResult;
use crate::oracle::TypeOracle;

impl<O: TypeOracle + ?Sized> Lifter<'_, O> {
    /// Push `value`. Constant aggregates and constant expressions recurse,
    /// so the walk runs on a guaranteed stack segment.
    pub(super) fn load_value(&mut self, value: ValueId) -> LowerResult<()> {
        lift_stack::ensure_sufficient_stack(|| self.load_value_inner(value))
    }

    fn load_value_inner(&mut self, value: ValueId) -> LowerResult<()> {
        let module = self.module;
        let v = module.value(value);
        match &v.kind {
            ValueKind::ConstInt(n) => self.load_int(*n, v.ty, value),
            ValueKind::ConstFloat(bits) => self.load_float(*bits, v.ty, value),
            ValueKind::Null => {
                let null = self.constant(Constant::Null, TargetType::Pointer);
                self.emit(Instruction::Load(null));
                Ok(())
            }
            ValueKind::Zero | ValueKind::Undef | ValueKind::Poison => {
                let ty = self.lower_type(v.ty, value, "constant")?;
                let constant = if ty.is_pointer() {
                    Constant::Null
                } else {
                    Constant::Default
                };
                let var = self.constant(constant, ty);
                self.emit(Instruction::Load(var));
                Ok(())
            }
            ValueKind::ConstAggregate(elements) => self.load_aggregate(v.ty, elements, value),
            ValueKind::ConstExpr(expr) => {
                let ty = self.lower_type(v.ty, value, expr.opcode.name())?;
                let tmp = self.vars.local(ty, Some(value));
                self.lower_operation(&expr.opcode, &expr.operands, v.ty, tmp, value)?;
                self.emit(Instruction::Load(tmp));
                Ok(())
            }
            ValueKind::Global(global) => {
                let var = self.global_var(*global)?;
                self.emit(Instruction::AddressOf(var));
                Ok(())
            }
            ValueKind::Function(function) => {
                let var = self.shared_var(
                    SharedVar::Function(*function),
                    VariableKind::FunctionPointer(*function),
                    TargetType::Pointer,
                );
                self.emit(Instruction::Load(var));
                Ok(())
            }
            ValueKind::Argument { function, index } => {
                if self.function != Some(*function) {
                    return Err(self.invariant(format!(
                        "argument {} of another function",
                        self.describe(value)
                    )));
                }
                let ty = self.lower_type(v.ty, value, "argument")?;
                let var = self.shared_var(
                    SharedVar::Parameter(*index),
                    VariableKind::Parameter { index: *index },
                    ty,
                );
                self.emit(Instruction::Load(var));
                Ok(())
            }
            ValueKind::Instruction(_) => {
                if let Some(&storage) = self.storage.get(&value) {
                    self.emit(Instruction::AddressOf(storage));
                } else {
                    let result = self.result_var(value)?;
                    self.emit(Instruction::Load(result));
                }
                Ok(())
            }
            ValueKind::Metadata => {
                let var = self.constant(Constant::Default, TargetType::Object);
                self.emit(Instruction::Load(var));
                Ok(())
            }
        }
    }

    pub(super) fn global_var(&mut self, global: GlobalId) -> LowerResult<VarId> {
        let g = self.module.global(global);
        let ty = self.lower_type(g.value_type, g.value, "global")?;
        Ok(self.shared_var(SharedVar::Global(global), VariableKind::Global(global), ty))
    }

    /// Push an integer constant of source type `ty`.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "narrow integers wrap to their stored width"
    )]
    pub(super) fn load_int(&mut self, n: i128, ty: TypeId, origin: ValueId) -> LowerResult<()> {
        let bits = self
            .module
            .types
            .int_bits(ty)
            .ok_or_else(|| self.unsupported("constant", "integer type", origin))?;
        match bits {
            1 => {
                let var = self.constant(Constant::I4(i32::from(n != 0)), TargetType::Bool);
                self.emit(Instruction::Load(var));
            }
            2..=32 => {
                let target = self.lower_type(ty, origin, "constant")?;
                let var = self.constant(Constant::I4(n as i32), target);
                self.emit(Instruction::Load(var));
            }
            33..=64 => {
                let target = self.lower_type(ty, origin, "constant")?;
                let var = self.constant(Constant::I8(n as i64), target);
                self.emit(Instruction::Load(var));
            }
            128 => {
                let narrow = i64::try_from(n)
                    .map_err(|_| self.unsupported("constant", "128-bit constant", origin))?;
                let var = self.constant(Constant::I8(narrow), TargetType::I64);
                self.emit(Instruction::Load(var));
                self.emit(Instruction::Convert {
                    to: TargetType::I128,
                    unsigned: false,
                });
            }
            _ => return Err(self.unsupported("constant", "integer width", origin)),
        }
        Ok(())
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "float constants are stored as f64 and narrowed on use"
    )]
    fn load_float(&mut self, bits: u64, ty: TypeId, origin: ValueId) -> LowerResult<()> {
        let (constant, target) = match self.module.types.get(ty) {
            Type::Float => (
                Constant::R4((f64::from_bits(bits) as f32).to_bits()),
                TargetType::F32,
            ),
            Type::Double => (Constant::R8(bits), TargetType::F64),
            _ => return Err(self.unsupported("constant", "floating-point type", origin)),
        };
        let var = self.constant(constant, target);
        self.emit(Instruction::Load(var));
        Ok(())
    }

    /// Build a constant aggregate in a zeroed temporary, writing only the
    /// members that are not already zero.
    fn load_aggregate(
        &mut self,
        ty: TypeId,
        elements: &[ValueId],
        origin: ValueId,
    ) -> LowerResult<()> {
        let module = self.module;
        let target = self.lower_type(ty, origin, "constant")?;
        let tmp = self.vars.local(target, Some(origin));
        self.emit(Instruction::Initialize(tmp));

        for (index, &element) in (0u32..).zip(elements) {
            if matches!(
                module.value(element).kind,
                ValueKind::Zero | ValueKind::Undef | ValueKind::Poison
            ) {
                continue;
            }
            self.emit(Instruction::AddressOf(tmp));
            let member = self.member_address(ty, index, origin)?;
            self.load_value(element)?;
            let member_ty = self.lower_type(member, element, "constant")?;
            self.emit(Instruction::StoreIndirect(member_ty));
        }

        self.emit(Instruction::Load(tmp));
        Ok(())
    }
}
