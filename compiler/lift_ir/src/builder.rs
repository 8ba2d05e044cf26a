//! Module construction.
//!
//! [`ModuleBuilder`] follows the "position at a block, emit instructions"
//! pattern. Constants and globals can be created at any time; instructions
//! go into the block selected by [`position_at`](ModuleBuilder::position_at).

use smallvec::smallvec;

use crate::module::{Block, Function, Global, Module};
use crate::opcode::{BinaryOp, CastOp, FloatPredicate, IntPredicate, Opcode};
use crate::types::{Type, TypeId, TypePool};
use crate::value::{
    BlockId, ConstExpr, FunctionId, GlobalId, Instruction, Operand, OperandList, Value, ValueId,
    ValueKind,
};

/// Builder for a [`Module`].
pub struct ModuleBuilder {
    module: Module,
    position: Option<(FunctionId, BlockId)>,
}

impl ModuleBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            module: Module {
                name: name.to_owned(),
                ..Module::default()
            },
            position: None,
        }
    }

    pub fn types(&mut self) -> &mut TypePool {
        &mut self.module.types
    }

    /// Read access to the module under construction.
    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn finish(self) -> Module {
        self.module
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "value counts never exceed u32"
    )]
    fn push_value(&mut self, ty: TypeId, kind: ValueKind) -> ValueId {
        let id = ValueId::new(self.module.values.len() as u32);
        self.module.values.push(Value {
            ty,
            kind,
            name: None,
        });
        id
    }

    /// Attach a source name to a value (used in listings and errors).
    pub fn set_name(&mut self, value: ValueId, name: &str) {
        self.module.values[value.index()].name = Some(name.to_owned());
    }

    // Constants

    pub fn const_int(&mut self, ty: TypeId, value: i128) -> ValueId {
        self.push_value(ty, ValueKind::ConstInt(value))
    }

    pub fn const_float(&mut self, ty: TypeId, value: f64) -> ValueId {
        self.push_value(ty, ValueKind::ConstFloat(value.to_bits()))
    }

    pub fn null(&mut self) -> ValueId {
        let ptr = self.module.types.ptr();
        self.push_value(ptr, ValueKind::Null)
    }

    pub fn zero(&mut self, ty: TypeId) -> ValueId {
        self.push_value(ty, ValueKind::Zero)
    }

    pub fn undef(&mut self, ty: TypeId) -> ValueId {
        self.push_value(ty, ValueKind::Undef)
    }

    pub fn poison(&mut self, ty: TypeId) -> ValueId {
        self.push_value(ty, ValueKind::Poison)
    }

    pub fn metadata(&mut self) -> ValueId {
        let ty = self.module.types.metadata();
        self.push_value(ty, ValueKind::Metadata)
    }

    pub fn const_aggregate(&mut self, ty: TypeId, elements: Vec<ValueId>) -> ValueId {
        self.push_value(ty, ValueKind::ConstAggregate(elements))
    }

    pub fn const_expr(&mut self, ty: TypeId, opcode: Opcode, operands: Vec<ValueId>) -> ValueId {
        self.push_value(ty, ValueKind::ConstExpr(ConstExpr { opcode, operands }))
    }

    // Globals and functions

    #[expect(
        clippy::cast_possible_truncation,
        reason = "global counts never exceed u32"
    )]
    pub fn add_global(
        &mut self,
        name: &str,
        value_type: TypeId,
        initializer: Option<ValueId>,
    ) -> GlobalId {
        let id = GlobalId::new(self.module.globals.len() as u32);
        let ptr = self.module.types.ptr();
        let value = self.push_value(ptr, ValueKind::Global(id));
        self.set_name(value, name);
        self.module.globals.push(Global {
            id,
            name: name.to_owned(),
            value_type,
            initializer,
            value,
        });
        id
    }

    pub fn global_value(&self, global: GlobalId) -> ValueId {
        self.module.globals[global.index()].value
    }

    /// Declare a function of type `ty`. Add blocks to turn it into a
    /// definition.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "function and parameter counts never exceed u32"
    )]
    pub fn add_function(&mut self, name: &str, ty: TypeId) -> FunctionId {
        let id = FunctionId::new(self.module.functions.len() as u32);
        let ptr = self.module.types.ptr();
        let value = self.push_value(ptr, ValueKind::Function(id));
        self.set_name(value, name);

        let param_types: Vec<TypeId> = self
            .module
            .types
            .function_parts(ty)
            .map(|(_, params, _)| params.to_vec())
            .unwrap_or_default();
        let params = param_types
            .into_iter()
            .enumerate()
            .map(|(i, pty)| {
                self.push_value(
                    pty,
                    ValueKind::Argument {
                        function: id,
                        index: i as u32,
                    },
                )
            })
            .collect();

        self.module.functions.push(Function {
            id,
            name: name.to_owned(),
            ty,
            params,
            blocks: Vec::new(),
            personality: None,
            value,
        });
        id
    }

    pub fn function_value(&self, function: FunctionId) -> ValueId {
        self.module.functions[function.index()].value
    }

    pub fn param(&self, function: FunctionId, index: usize) -> ValueId {
        self.module.functions[function.index()].params[index]
    }

    pub fn set_personality(&mut self, function: FunctionId, personality: FunctionId) {
        self.module.functions[function.index()].personality = Some(personality);
    }

    // Blocks

    #[expect(
        clippy::cast_possible_truncation,
        reason = "block counts never exceed u32"
    )]
    pub fn append_block(&mut self, function: FunctionId, name: &str) -> BlockId {
        let blocks = &mut self.module.functions[function.index()].blocks;
        let id = BlockId::new(blocks.len() as u32);
        blocks.push(Block {
            id,
            name: Some(name.to_owned()),
            instructions: Vec::new(),
        });
        id
    }

    /// Set the insertion point to the end of `block`.
    pub fn position_at(&mut self, function: FunctionId, block: BlockId) {
        debug_assert!(
            block.index() < self.module.functions[function.index()].blocks.len(),
            "BlockId {} out of bounds",
            block.raw(),
        );
        self.position = Some((function, block));
    }

    /// Append an instruction at the insertion point.
    ///
    /// # Panics
    ///
    /// Panics if no insertion point was set.
    pub fn build(&mut self, opcode: Opcode, ty: TypeId, operands: OperandList) -> ValueId {
        let Some((function, block)) = self.position else {
            panic!("ModuleBuilder::build called before position_at");
        };
        let id = self.push_value(
            ty,
            ValueKind::Instruction(Instruction {
                opcode,
                operands,
                function,
                block,
            }),
        );
        self.module.functions[function.index()].blocks[block.index()]
            .instructions
            .push(id);
        id
    }

    fn void(&mut self) -> TypeId {
        self.module.types.void()
    }

    // Memory

    /// `alloca` of one `allocated`, or `count` of them.
    pub fn alloca(&mut self, allocated: TypeId, count: Option<ValueId>) -> ValueId {
        let count = match count {
            Some(c) => c,
            None => {
                let i32_ty = self.module.types.int(32);
                self.const_int(i32_ty, 1)
            }
        };
        let ptr = self.module.types.ptr();
        self.build(
            Opcode::Alloca { allocated },
            ptr,
            smallvec![Operand::Value(count)],
        )
    }

    pub fn load(&mut self, ty: TypeId, ptr: ValueId) -> ValueId {
        self.build(Opcode::Load, ty, smallvec![Operand::Value(ptr)])
    }

    pub fn store(&mut self, value: ValueId, ptr: ValueId) -> ValueId {
        let void = self.void();
        self.build(
            Opcode::Store,
            void,
            smallvec![Operand::Value(value), Operand::Value(ptr)],
        )
    }

    pub fn gep(&mut self, source_element: TypeId, ptr: ValueId, indices: &[ValueId]) -> ValueId {
        let ty = self.module.types.ptr();
        let operands = std::iter::once(ptr)
            .chain(indices.iter().copied())
            .map(Operand::Value)
            .collect();
        self.build(Opcode::GetElementPtr { source_element }, ty, operands)
    }

    pub fn fence(&mut self) -> ValueId {
        let void = self.void();
        self.build(Opcode::Fence, void, OperandList::new())
    }

    pub fn atomic_rmw(&mut self, ptr: ValueId, value: ValueId) -> ValueId {
        let ty = self.module.type_of(value);
        self.build(
            Opcode::AtomicRmw,
            ty,
            smallvec![Operand::Value(ptr), Operand::Value(value)],
        )
    }

    // Arithmetic, comparisons, conversions

    pub fn binary(&mut self, op: BinaryOp, lhs: ValueId, rhs: ValueId) -> ValueId {
        let ty = self.module.type_of(lhs);
        self.build(
            Opcode::Binary(op),
            ty,
            smallvec![Operand::Value(lhs), Operand::Value(rhs)],
        )
    }

    pub fn fneg(&mut self, value: ValueId) -> ValueId {
        let ty = self.module.type_of(value);
        self.build(Opcode::FNeg, ty, smallvec![Operand::Value(value)])
    }

    pub fn icmp(&mut self, pred: IntPredicate, lhs: ValueId, rhs: ValueId) -> ValueId {
        let i1 = self.module.types.int(1);
        self.build(
            Opcode::ICmp(pred),
            i1,
            smallvec![Operand::Value(lhs), Operand::Value(rhs)],
        )
    }

    pub fn fcmp(&mut self, pred: FloatPredicate, lhs: ValueId, rhs: ValueId) -> ValueId {
        let i1 = self.module.types.int(1);
        self.build(
            Opcode::FCmp(pred),
            i1,
            smallvec![Operand::Value(lhs), Operand::Value(rhs)],
        )
    }

    pub fn cast(&mut self, op: CastOp, value: ValueId, to: TypeId) -> ValueId {
        self.build(Opcode::Cast(op), to, smallvec![Operand::Value(value)])
    }

    pub fn select(&mut self, cond: ValueId, if_true: ValueId, if_false: ValueId) -> ValueId {
        let ty = self.module.type_of(if_true);
        self.build(
            Opcode::Select,
            ty,
            smallvec![
                Operand::Value(cond),
                Operand::Value(if_true),
                Operand::Value(if_false)
            ],
        )
    }

    pub fn freeze(&mut self, value: ValueId) -> ValueId {
        let ty = self.module.type_of(value);
        self.build(Opcode::Freeze, ty, smallvec![Operand::Value(value)])
    }

    /// `extractvalue`; the result type is found by walking `indices`.
    ///
    /// # Panics
    ///
    /// Panics if an index does not name a member of the aggregate.
    pub fn extract_value(&mut self, aggregate: ValueId, indices: &[u32]) -> ValueId {
        let mut ty = self.module.type_of(aggregate);
        for &index in indices {
            let Some(member) = self.module.types.member_type(ty, index) else {
                panic!("extractvalue index {index} out of range");
            };
            ty = member;
        }
        self.build(
            Opcode::ExtractValue {
                indices: indices.to_vec(),
            },
            ty,
            smallvec![Operand::Value(aggregate)],
        )
    }

    pub fn insert_value(&mut self, aggregate: ValueId, value: ValueId, indices: &[u32]) -> ValueId {
        let ty = self.module.type_of(aggregate);
        self.build(
            Opcode::InsertValue {
                indices: indices.to_vec(),
            },
            ty,
            smallvec![Operand::Value(aggregate), Operand::Value(value)],
        )
    }

    /// `va_arg` reading a `ty` from the `va_list` at `list`.
    pub fn va_arg(&mut self, ty: TypeId, list: ValueId) -> ValueId {
        self.build(Opcode::VAArg, ty, smallvec![Operand::Value(list)])
    }

    /// `extractelement`; the result has the vector's element type.
    ///
    /// # Panics
    ///
    /// Panics if `vector` is not a vector.
    pub fn extract_element(&mut self, vector: ValueId, index: ValueId) -> ValueId {
        let &Type::Vector { element, .. } = self.module.types.get(self.module.type_of(vector))
        else {
            panic!("extractelement on a non-vector value");
        };
        self.build(
            Opcode::ExtractElement,
            element,
            smallvec![Operand::Value(vector), Operand::Value(index)],
        )
    }

    pub fn insert_element(&mut self, vector: ValueId, value: ValueId, index: ValueId) -> ValueId {
        let ty = self.module.type_of(vector);
        self.build(
            Opcode::InsertElement,
            ty,
            smallvec![
                Operand::Value(vector),
                Operand::Value(value),
                Operand::Value(index)
            ],
        )
    }

    /// `shufflevector`; the result is as long as `mask`.
    ///
    /// # Panics
    ///
    /// Panics if `a` or `mask` is not a vector.
    pub fn shuffle_vector(&mut self, a: ValueId, b: ValueId, mask: ValueId) -> ValueId {
        let types = &self.module.types;
        let (Type::Vector { element, .. }, Type::Vector { len, .. }) = (
            types.get(self.module.type_of(a)),
            types.get(self.module.type_of(mask)),
        ) else {
            panic!("shufflevector on a non-vector value");
        };
        let (element, len) = (*element, *len);
        let ty = self.module.types.vector(element, len);
        self.build(
            Opcode::ShuffleVector,
            ty,
            smallvec![
                Operand::Value(a),
                Operand::Value(b),
                Operand::Value(mask)
            ],
        )
    }

    pub fn phi(&mut self, ty: TypeId, incoming: &[(ValueId, BlockId)]) -> ValueId {
        let operands = incoming
            .iter()
            .flat_map(|&(v, b)| [Operand::Value(v), Operand::Block(b)])
            .collect();
        self.build(Opcode::Phi, ty, operands)
    }

    /// Add an incoming edge to an existing phi. Loop phis need this: their
    /// back-edge value is defined after the phi itself.
    ///
    /// # Panics
    ///
    /// Panics if `phi` is not a phi instruction.
    pub fn add_incoming(&mut self, phi: ValueId, value: ValueId, from: BlockId) {
        match &mut self.module.values[phi.index()].kind {
            ValueKind::Instruction(inst) if inst.opcode == Opcode::Phi => {
                inst.operands.push(Operand::Value(value));
                inst.operands.push(Operand::Block(from));
            }
            _ => panic!("add_incoming on a non-phi value"),
        }
    }

    // Calls

    fn call_operands(args: &[ValueId]) -> OperandList {
        args.iter().copied().map(Operand::Value).collect()
    }

    fn call_result_type(&mut self, function_type: TypeId) -> TypeId {
        match self.module.types.function_parts(function_type) {
            Some((ret, _, _)) => ret,
            None => self.void(),
        }
    }

    pub fn call(&mut self, function_type: TypeId, callee: ValueId, args: &[ValueId]) -> ValueId {
        let ty = self.call_result_type(function_type);
        let mut operands = Self::call_operands(args);
        operands.push(Operand::Value(callee));
        self.build(Opcode::Call { function_type }, ty, operands)
    }

    pub fn invoke(
        &mut self,
        function_type: TypeId,
        callee: ValueId,
        args: &[ValueId],
        normal: BlockId,
        unwind: BlockId,
    ) -> ValueId {
        let ty = self.call_result_type(function_type);
        let mut operands = Self::call_operands(args);
        operands.push(Operand::Block(normal));
        operands.push(Operand::Block(unwind));
        operands.push(Operand::Value(callee));
        self.build(Opcode::Invoke { function_type }, ty, operands)
    }

    // Terminators

    pub fn ret(&mut self, value: Option<ValueId>) -> ValueId {
        let void = self.void();
        let operands = value.into_iter().map(Operand::Value).collect();
        self.build(Opcode::Ret, void, operands)
    }

    pub fn br(&mut self, target: BlockId) -> ValueId {
        let void = self.void();
        self.build(Opcode::Br, void, smallvec![Operand::Block(target)])
    }

    /// Conditional branch. Stored as `[cond, if_false, if_true]`.
    pub fn cond_br(&mut self, cond: ValueId, if_true: BlockId, if_false: BlockId) -> ValueId {
        let void = self.void();
        self.build(
            Opcode::Br,
            void,
            smallvec![
                Operand::Value(cond),
                Operand::Block(if_false),
                Operand::Block(if_true)
            ],
        )
    }

    pub fn switch(
        &mut self,
        index: ValueId,
        default: BlockId,
        cases: &[(ValueId, BlockId)],
    ) -> ValueId {
        let void = self.void();
        let mut operands: OperandList = smallvec![Operand::Value(index), Operand::Block(default)];
        for &(value, target) in cases {
            operands.push(Operand::Value(value));
            operands.push(Operand::Block(target));
        }
        self.build(Opcode::Switch, void, operands)
    }

    pub fn unreachable(&mut self) -> ValueId {
        let void = self.void();
        self.build(Opcode::Unreachable, void, OperandList::new())
    }

    // Exception handling

    /// `catchswitch within parent [handlers] unwind to unwind_dest`.
    pub fn catch_switch(
        &mut self,
        parent: ValueId,
        handlers: &[BlockId],
        unwind_dest: Option<BlockId>,
    ) -> ValueId {
        let token = self.module.types.token();
        let mut operands: OperandList = smallvec![Operand::Value(parent)];
        operands.extend(handlers.iter().copied().map(Operand::Block));
        operands.extend(unwind_dest.map(Operand::Block));
        self.build(
            Opcode::CatchSwitch {
                has_unwind_dest: unwind_dest.is_some(),
            },
            token,
            operands,
        )
    }

    pub fn catch_pad(&mut self, catch_switch: ValueId, args: &[ValueId]) -> ValueId {
        let token = self.module.types.token();
        let mut operands = Self::call_operands(args);
        operands.push(Operand::Value(catch_switch));
        self.build(Opcode::CatchPad, token, operands)
    }

    pub fn cleanup_pad(&mut self, parent: ValueId, args: &[ValueId]) -> ValueId {
        let token = self.module.types.token();
        let mut operands = Self::call_operands(args);
        operands.push(Operand::Value(parent));
        self.build(Opcode::CleanupPad, token, operands)
    }

    pub fn catch_ret(&mut self, pad: ValueId, target: BlockId) -> ValueId {
        let void = self.void();
        self.build(
            Opcode::CatchRet,
            void,
            smallvec![Operand::Value(pad), Operand::Block(target)],
        )
    }

    pub fn cleanup_ret(&mut self, pad: ValueId, unwind_dest: Option<BlockId>) -> ValueId {
        let void = self.void();
        let mut operands: OperandList = smallvec![Operand::Value(pad)];
        operands.extend(unwind_dest.map(Operand::Block));
        self.build(Opcode::CleanupRet, void, operands)
    }

    /// The `none` token used as the parent of top-level pads.
    pub fn none_token(&mut self) -> ValueId {
        let token = self.module.types.intern(Type::Token);
        self.push_value(token, ValueKind::Zero)
    }
}
