//! Value arena entries and the IDs that address them.

use smallvec::SmallVec;

use crate::opcode::Opcode;
use crate::types::TypeId;

// ── ID newtypes ─────────────────────────────────────────────────────

macro_rules! id_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Create an ID from a raw index.
            #[inline]
            pub fn new(raw: u32) -> Self {
                Self(raw)
            }

            /// Get the raw `u32` value.
            #[inline]
            pub fn raw(self) -> u32 {
                self.0
            }

            /// Get the index as `usize` (for indexing into `Vec`s).
            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

id_newtype! {
    /// Module-wide value ID. Constants, globals, functions, arguments and
    /// instructions all share one arena.
    ValueId
}

id_newtype! {
    /// Basic block ID, local to its function. Blocks are numbered in
    /// layout order starting from 0 (the entry block).
    BlockId
}

id_newtype! {
    /// Function ID within a module.
    FunctionId
}

id_newtype! {
    /// Global variable ID within a module.
    GlobalId
}

// ── Operands ────────────────────────────────────────────────────────

/// One instruction operand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum Operand {
    Value(ValueId),
    Block(BlockId),
}

impl Operand {
    pub fn as_value(self) -> Option<ValueId> {
        match self {
            Operand::Value(v) => Some(v),
            Operand::Block(_) => None,
        }
    }

    pub fn as_block(self) -> Option<BlockId> {
        match self {
            Operand::Block(b) => Some(b),
            Operand::Value(_) => None,
        }
    }
}

/// Operand storage. Most instructions have three operands or fewer.
pub type OperandList = SmallVec<[Operand; 3]>;

// ── Values ──────────────────────────────────────────────────────────

/// A constant expression: an opcode applied to constant operands, with no
/// block or function of its own.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct ConstExpr {
    pub opcode: Opcode,
    pub operands: Vec<ValueId>,
}

/// An instruction placed in a block.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct Instruction {
    pub opcode: Opcode,
    pub operands: OperandList,
    pub function: FunctionId,
    pub block: BlockId,
}

impl Instruction {
    /// Value operand at `index`, if that operand is a value.
    pub fn value_operand(&self, index: usize) -> Option<ValueId> {
        self.operands.get(index).and_then(|op| op.as_value())
    }

    /// Block operand at `index`, if that operand is a block.
    pub fn block_operand(&self, index: usize) -> Option<BlockId> {
        self.operands.get(index).and_then(|op| op.as_block())
    }
}

/// What a value is.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum ValueKind {
    /// Integer constant, sign-extended from its type's width.
    ConstInt(i128),
    /// Floating-point constant as `f64` bits; `float` constants are widened.
    ConstFloat(u64),
    Null,
    /// `zeroinitializer`
    Zero,
    Undef,
    Poison,
    ConstAggregate(Vec<ValueId>),
    ConstExpr(ConstExpr),
    Global(GlobalId),
    Function(FunctionId),
    Argument { function: FunctionId, index: u32 },
    Instruction(Instruction),
    Metadata,
}

/// Arena entry: a typed value with an optional source name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct Value {
    pub ty: TypeId,
    pub kind: ValueKind,
    pub name: Option<String>,
}

impl Value {
    pub fn as_instruction(&self) -> Option<&Instruction> {
        match &self.kind {
            ValueKind::Instruction(inst) => Some(inst),
            _ => None,
        }
    }

    pub fn as_const_int(&self) -> Option<i128> {
        match self.kind {
            ValueKind::ConstInt(v) => Some(v),
            _ => None,
        }
    }

    /// Whether this value is a constant known at translation time.
    pub fn is_constant(&self) -> bool {
        matches!(
            self.kind,
            ValueKind::ConstInt(_)
                | ValueKind::ConstFloat(_)
                | ValueKind::Null
                | ValueKind::Zero
                | ValueKind::Undef
                | ValueKind::Poison
                | ValueKind::ConstAggregate(_)
                | ValueKind::ConstExpr(_)
        )
    }
}
