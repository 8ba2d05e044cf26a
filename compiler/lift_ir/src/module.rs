//! Module structure: functions, blocks, globals, and the value arena.

use crate::opcode::Opcode;
use crate::types::{TypeId, TypePool};
use crate::value::{BlockId, FunctionId, GlobalId, Instruction, Operand, Value, ValueId, ValueKind};

/// A basic block: ordered instruction values.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct Block {
    pub id: BlockId,
    pub name: Option<String>,
    pub instructions: Vec<ValueId>,
}

/// A function definition or declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct Function {
    pub id: FunctionId,
    pub name: String,
    /// The function's `Type::Function`.
    pub ty: TypeId,
    /// Argument values, in parameter order.
    pub params: Vec<ValueId>,
    /// Blocks in layout order; the first is the entry block.
    pub blocks: Vec<Block>,
    /// Personality routine consulted by `catchswitch` dispatch.
    pub personality: Option<FunctionId>,
    /// The `ValueKind::Function` value referring to this function.
    pub value: ValueId,
}

impl Function {
    /// A function without blocks is only declared here.
    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }
}

/// A global variable.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct Global {
    pub id: GlobalId,
    pub name: String,
    /// Type of the stored value (the global itself is a pointer).
    pub value_type: TypeId,
    pub initializer: Option<ValueId>,
    /// The `ValueKind::Global` value referring to this global.
    pub value: ValueId,
}

/// A whole translation unit.
#[derive(Clone, Debug, Default)]
pub struct Module {
    pub name: String,
    pub types: TypePool,
    pub(crate) values: Vec<Value>,
    pub(crate) functions: Vec<Function>,
    pub(crate) globals: Vec<Global>,
}

impl Module {
    // Arena access

    #[inline]
    pub fn value(&self, id: ValueId) -> &Value {
        &self.values[id.index()]
    }

    #[inline]
    pub fn type_of(&self, id: ValueId) -> TypeId {
        self.values[id.index()].ty
    }

    pub fn instruction(&self, id: ValueId) -> Option<&Instruction> {
        self.value(id).as_instruction()
    }

    pub fn function(&self, id: FunctionId) -> &Function {
        &self.functions[id.index()]
    }

    pub fn global(&self, id: GlobalId) -> &Global {
        &self.globals[id.index()]
    }

    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.iter()
    }

    pub fn globals(&self) -> impl Iterator<Item = &Global> {
        self.globals.iter()
    }

    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    pub fn global_count(&self) -> usize {
        self.globals.len()
    }

    /// Look up a function by name.
    pub fn function_named(&self, name: &str) -> Option<FunctionId> {
        self.functions.iter().find(|f| f.name == name).map(|f| f.id)
    }

    // Control-flow queries

    /// Instructions of `block` in order, paired with their IDs.
    pub fn block_instructions(
        &self,
        function: FunctionId,
        block: BlockId,
    ) -> impl Iterator<Item = (ValueId, &Instruction)> {
        self.function(function)
            .block(block)
            .instructions
            .iter()
            .filter_map(move |&id| self.instruction(id).map(|inst| (id, inst)))
    }

    /// The phi instructions at the start of `block`, in declared order.
    pub fn leading_phis(&self, function: FunctionId, block: BlockId) -> Vec<ValueId> {
        self.block_instructions(function, block)
            .take_while(|(_, inst)| inst.opcode == Opcode::Phi)
            .map(|(id, _)| id)
            .collect()
    }

    /// Whether `block` starts with at least one phi.
    pub fn starts_with_phi(&self, function: FunctionId, block: BlockId) -> bool {
        self.block_instructions(function, block)
            .next()
            .is_some_and(|(_, inst)| inst.opcode == Opcode::Phi)
    }

    /// Incoming value of `phi` for the edge from `from`.
    pub fn phi_incoming(&self, phi: ValueId, from: BlockId) -> Option<ValueId> {
        let inst = self.instruction(phi)?;
        inst.operands.chunks_exact(2).find_map(|pair| match pair {
            [Operand::Value(v), Operand::Block(b)] if *b == from => Some(*v),
            _ => None,
        })
    }

    /// Function referenced directly by `callee`, if it is a function value.
    pub fn callee_function(&self, callee: ValueId) -> Option<FunctionId> {
        match self.value(callee).kind {
            ValueKind::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Return type of a function.
    pub fn return_type(&self, function: FunctionId) -> TypeId {
        let ty = self.function(function).ty;
        match self.types.function_parts(ty) {
            Some((ret, _, _)) => ret,
            None => ty,
        }
    }
}
