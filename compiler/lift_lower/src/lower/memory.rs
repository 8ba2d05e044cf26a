//! Stack allocations, loads and stores, and address arithmetic.

use lift_ir::{Instruction as SourceInstruction, Module, Type, TypeId, ValueId};

use super::Lifter;
use crate::cil::{BinaryOp, Constant, FieldRef, Instruction, TargetType, VarId};
use crate::error::LowerResult;
use crate::oracle::TypeOracle;

/// An element index, folded to a constant when the source operand is one.
#[derive(Clone, Copy, Debug)]
pub(super) enum Index {
    Const(i128),
    Value(ValueId),
}

impl Index {
    pub(super) fn of(module: &Module, value: ValueId) -> Self {
        module
            .value(value)
            .as_const_int()
            .map_or(Index::Value(value), Index::Const)
    }
}

impl<O: TypeOracle + ?Sized> Lifter<'_, O> {
    /// Storage was created up front; zero it where the allocation executes.
    pub(super) fn lower_alloca(&mut self, id: ValueId) -> LowerResult<()> {
        let storage = self.alloca_storage(id)?;
        self.emit(Instruction::Initialize(storage));
        Ok(())
    }

    fn alloca_storage(&self, id: ValueId) -> LowerResult<VarId> {
        self.storage
            .get(&id)
            .copied()
            .ok_or_else(|| self.invariant(format!("no storage for {}", self.describe(id))))
    }

    /// Frame-resident storage read with its own type is accessed directly;
    /// everything else goes through the address.
    fn direct_storage(&self, ptr: ValueId, ty: &TargetType) -> Option<VarId> {
        let storage = *self.storage.get(&ptr)?;
        let var = self.vars.get(storage);
        (var.is_durable() && var.ty == *ty).then_some(storage)
    }

    pub(super) fn lower_load(&mut self, id: ValueId, inst: &SourceInstruction) -> LowerResult<()> {
        let ptr = inst
            .value_operand(0)
            .ok_or_else(|| self.invariant("load without address".to_owned()))?;
        let ty = self.lower_type(self.module.type_of(id), id, "load")?;
        let result = self.result_var(id)?;

        if let Some(storage) = self.direct_storage(ptr, &ty) {
            self.emit(Instruction::Load(storage));
        } else {
            self.load_value(ptr)?;
            self.emit(Instruction::LoadIndirect(ty));
        }
        self.emit(Instruction::Store(result));
        Ok(())
    }

    pub(super) fn lower_store(&mut self, id: ValueId, inst: &SourceInstruction) -> LowerResult<()> {
        let (Some(value), Some(ptr)) = (inst.value_operand(0), inst.value_operand(1)) else {
            return Err(self.invariant(format!("malformed {}", self.describe(id))));
        };
        let ty = self.lower_type(self.module.type_of(value), value, "store")?;

        if let Some(storage) = self.direct_storage(ptr, &ty) {
            self.load_value(value)?;
            self.emit(Instruction::Store(storage));
        } else {
            self.load_value(ptr)?;
            self.load_value(value)?;
            self.emit(Instruction::StoreIndirect(ty));
        }
        Ok(())
    }

    /// Read-modify-write atomics have no lowering yet; the result reads as
    /// zero.
    pub(super) fn lower_atomic(
        &mut self,
        id: ValueId,
        inst: &SourceInstruction,
    ) -> LowerResult<()> {
        tracing::warn!(
            function = %self.name,
            opcode = inst.opcode.name(),
            "atomic operation lowered to a zero result",
        );
        let result = self.result_var(id)?;
        self.emit(Instruction::Initialize(result));
        Ok(())
    }

    /// `getelementptr`: base pointer, scaled first index, then one step per
    /// remaining index into arrays and structs.
    pub(super) fn lower_gep(
        &mut self,
        operands: &[ValueId],
        source_element: TypeId,
        origin: ValueId,
    ) -> LowerResult<()> {
        let module = self.module;
        let Some((&base, indices)) = operands.split_first() else {
            return Err(self.invariant(format!("malformed {}", self.describe(origin))));
        };
        self.load_value(base)?;

        let Some((&first, rest)) = indices.split_first() else {
            return Ok(());
        };
        self.load_array_offset(Index::of(module, first), source_element, origin)?;

        let mut current = source_element;
        for &index in rest {
            current = match (module.types.get(current), Index::of(module, index)) {
                (Type::Array { element, .. } | Type::Vector { element, .. }, index) => {
                    self.load_array_offset(index, *element, origin)?;
                    *element
                }
                (Type::Struct { .. }, Index::Const(i)) => {
                    let field = u32::try_from(i)
                        .map_err(|_| self.unsupported("getelementptr", "field index", origin))?;
                    self.member_address(current, field, origin)?
                }
                _ => return Err(self.unsupported("getelementptr", "index", origin)),
            };
        }
        Ok(())
    }

    /// Advance the address on top of the stack by `index` elements of
    /// `element`.
    pub(super) fn load_array_offset(
        &mut self,
        index: Index,
        element: TypeId,
        origin: ValueId,
    ) -> LowerResult<()> {
        let to_native = Instruction::Convert {
            to: TargetType::NativeInt,
            unsigned: false,
        };
        let size = self.oracle.size_of(self.module, element);
        match (size, index) {
            (_, Index::Const(0)) => {}
            (Some(size), Index::Const(i)) => {
                let offset = i
                    .checked_mul(i128::from(size))
                    .and_then(|o| i64::try_from(o).ok())
                    .ok_or_else(|| self.unsupported("getelementptr", "offset", origin))?;
                let var = self.constant(Constant::I8(offset), TargetType::I64);
                self.emit(Instruction::Load(var));
                self.emit(to_native);
                self.emit(Instruction::Binary(BinaryOp::Add));
            }
            (Some(1), Index::Value(v)) => {
                self.load_value(v)?;
                self.emit(to_native);
                self.emit(Instruction::Binary(BinaryOp::Add));
            }
            (Some(size), Index::Value(v)) => {
                let size = i64::try_from(size)
                    .map_err(|_| self.unsupported("getelementptr", "element size", origin))?;
                self.load_value(v)?;
                self.emit(to_native);
                let var = self.constant(Constant::I8(size), TargetType::NativeInt);
                self.emit(Instruction::Load(var));
                self.emit(Instruction::Binary(BinaryOp::Mul));
                self.emit(Instruction::Binary(BinaryOp::Add));
            }
            (None, Index::Const(1)) => {
                let ty = self.lower_type(element, origin, "getelementptr")?;
                self.emit(Instruction::SizeOf(ty));
                self.emit(Instruction::Binary(BinaryOp::Add));
            }
            (None, index) => {
                let ty = self.lower_type(element, origin, "getelementptr")?;
                match index {
                    Index::Const(i) => {
                        let i = i64::try_from(i)
                            .map_err(|_| self.unsupported("getelementptr", "index", origin))?;
                        let var = self.constant(Constant::I8(i), TargetType::I64);
                        self.emit(Instruction::Load(var));
                    }
                    Index::Value(v) => self.load_value(v)?,
                }
                self.emit(to_native);
                self.emit(Instruction::SizeOf(ty));
                self.emit(Instruction::Binary(BinaryOp::Mul));
                self.emit(Instruction::Binary(BinaryOp::Add));
            }
        }
        Ok(())
    }

    /// Replace the aggregate address on top of the stack with the address
    /// of member `index`. Returns the member's source type.
    pub(super) fn member_address(
        &mut self,
        aggregate: TypeId,
        index: u32,
        origin: ValueId,
    ) -> LowerResult<TypeId> {
        let module = self.module;
        match module.types.get(aggregate) {
            Type::Struct { .. } => {
                let member = self
                    .oracle
                    .field_type(module, aggregate, index)
                    .ok_or_else(|| self.unsupported("getelementptr", "field index", origin))?;
                let field = FieldRef {
                    owner: self.lower_type(aggregate, origin, "getelementptr")?,
                    index,
                    ty: self.lower_type(member, origin, "getelementptr")?,
                };
                self.emit(Instruction::FieldAddress(field));
                Ok(member)
            }
            Type::Array { element, .. } | Type::Vector { element, .. } => {
                self.load_array_offset(Index::Const(i128::from(index)), *element, origin)?;
                Ok(*element)
            }
            _ => Err(self.unsupported("getelementptr", "aggregate type", origin)),
        }
    }

    /// Copy the aggregate into a temporary, walk to the member, read it.
    pub(super) fn lower_extract_value(
        &mut self,
        aggregate: ValueId,
        indices: &[u32],
        result: VarId,
        origin: ValueId,
    ) -> LowerResult<()> {
        let module = self.module;
        let aggregate_ty = module.type_of(aggregate);
        let tmp_ty = self.lower_type(aggregate_ty, origin, "extractvalue")?;
        let tmp = self.vars.local(tmp_ty, None);

        self.load_value(aggregate)?;
        self.emit(Instruction::Store(tmp));
        self.emit(Instruction::AddressOf(tmp));
        let mut current = aggregate_ty;
        for &index in indices {
            current = self.member_address(current, index, origin)?;
        }
        let member_ty = self.lower_type(current, origin, "extractvalue")?;
        self.emit(Instruction::LoadIndirect(member_ty));
        self.emit(Instruction::Store(result));
        Ok(())
    }

    /// Copy the aggregate into the result, then overwrite one member in
    /// place.
    pub(super) fn lower_insert_value(
        &mut self,
        aggregate: ValueId,
        value: ValueId,
        indices: &[u32],
        result: VarId,
        origin: ValueId,
    ) -> LowerResult<()> {
        let module = self.module;
        self.load_value(aggregate)?;
        self.emit(Instruction::Store(result));
        self.emit(Instruction::AddressOf(result));
        let mut current = module.type_of(aggregate);
        for &index in indices {
            current = self.member_address(current, index, origin)?;
        }
        self.load_value(value)?;
        let member_ty = self.lower_type(current, origin, "insertvalue")?;
        self.emit(Instruction::StoreIndirect(member_ty));
        Ok(())
    }
}
