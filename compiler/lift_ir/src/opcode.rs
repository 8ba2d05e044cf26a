//! Source opcodes.
//!
//! Attributes that the native IR keeps on the instruction rather than in
//! operands (allocated type, GEP source element type, aggregate indices,
//! callee function type, predicates) live on the opcode variant.

use crate::types::TypeId;

/// Two-operand arithmetic and bitwise operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum BinaryOp {
    Add,
    FAdd,
    Sub,
    FSub,
    Mul,
    FMul,
    UDiv,
    SDiv,
    FDiv,
    URem,
    SRem,
    FRem,
    Shl,
    LShr,
    AShr,
    And,
    Or,
    Xor,
}

impl BinaryOp {
    pub fn name(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::FAdd => "fadd",
            BinaryOp::Sub => "sub",
            BinaryOp::FSub => "fsub",
            BinaryOp::Mul => "mul",
            BinaryOp::FMul => "fmul",
            BinaryOp::UDiv => "udiv",
            BinaryOp::SDiv => "sdiv",
            BinaryOp::FDiv => "fdiv",
            BinaryOp::URem => "urem",
            BinaryOp::SRem => "srem",
            BinaryOp::FRem => "frem",
            BinaryOp::Shl => "shl",
            BinaryOp::LShr => "lshr",
            BinaryOp::AShr => "ashr",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Xor => "xor",
        }
    }
}

/// Conversion operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum CastOp {
    Trunc,
    ZExt,
    SExt,
    FPToUI,
    FPToSI,
    UIToFP,
    SIToFP,
    FPTrunc,
    FPExt,
    PtrToInt,
    IntToPtr,
    BitCast,
    AddrSpaceCast,
}

impl CastOp {
    pub fn name(self) -> &'static str {
        match self {
            CastOp::Trunc => "trunc",
            CastOp::ZExt => "zext",
            CastOp::SExt => "sext",
            CastOp::FPToUI => "fptoui",
            CastOp::FPToSI => "fptosi",
            CastOp::UIToFP => "uitofp",
            CastOp::SIToFP => "sitofp",
            CastOp::FPTrunc => "fptrunc",
            CastOp::FPExt => "fpext",
            CastOp::PtrToInt => "ptrtoint",
            CastOp::IntToPtr => "inttoptr",
            CastOp::BitCast => "bitcast",
            CastOp::AddrSpaceCast => "addrspacecast",
        }
    }
}

/// `icmp` predicates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum IntPredicate {
    Eq,
    Ne,
    Ugt,
    Uge,
    Ult,
    Ule,
    Sgt,
    Sge,
    Slt,
    Sle,
}

impl IntPredicate {
    pub fn name(self) -> &'static str {
        match self {
            IntPredicate::Eq => "eq",
            IntPredicate::Ne => "ne",
            IntPredicate::Ugt => "ugt",
            IntPredicate::Uge => "uge",
            IntPredicate::Ult => "ult",
            IntPredicate::Ule => "ule",
            IntPredicate::Sgt => "sgt",
            IntPredicate::Sge => "sge",
            IntPredicate::Slt => "slt",
            IntPredicate::Sle => "sle",
        }
    }
}

/// `fcmp` predicates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum FloatPredicate {
    False,
    Oeq,
    Ogt,
    Oge,
    Olt,
    Ole,
    One,
    Ord,
    Uno,
    Ueq,
    Ugt,
    Uge,
    Ult,
    Ule,
    Une,
    True,
}

impl FloatPredicate {
    pub fn name(self) -> &'static str {
        match self {
            FloatPredicate::False => "false",
            FloatPredicate::Oeq => "oeq",
            FloatPredicate::Ogt => "ogt",
            FloatPredicate::Oge => "oge",
            FloatPredicate::Olt => "olt",
            FloatPredicate::Ole => "ole",
            FloatPredicate::One => "one",
            FloatPredicate::Ord => "ord",
            FloatPredicate::Uno => "uno",
            FloatPredicate::Ueq => "ueq",
            FloatPredicate::Ugt => "ugt",
            FloatPredicate::Uge => "uge",
            FloatPredicate::Ult => "ult",
            FloatPredicate::Ule => "ule",
            FloatPredicate::Une => "une",
            FloatPredicate::True => "true",
        }
    }
}

/// Source instruction opcode.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum Opcode {
    // Terminators
    Ret,
    Br,
    Switch,
    IndirectBr,
    Invoke { function_type: TypeId },
    Resume,
    Unreachable,
    CleanupRet,
    CatchRet,
    CatchSwitch { has_unwind_dest: bool },
    CallBr,

    // Arithmetic
    FNeg,
    Binary(BinaryOp),

    // Memory
    Alloca { allocated: TypeId },
    Load,
    Store,
    Fence,
    AtomicCmpXchg,
    AtomicRmw,
    GetElementPtr { source_element: TypeId },

    // Conversions and comparisons
    Cast(CastOp),
    ICmp(IntPredicate),
    FCmp(FloatPredicate),

    // Other
    Phi,
    Call { function_type: TypeId },
    Select,
    VAArg,
    ExtractElement,
    InsertElement,
    ShuffleVector,
    ExtractValue { indices: Vec<u32> },
    InsertValue { indices: Vec<u32> },
    LandingPad,
    CleanupPad,
    CatchPad,
    Freeze,
}

impl Opcode {
    /// Mnemonic used in listings and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Opcode::Ret => "ret",
            Opcode::Br => "br",
            Opcode::Switch => "switch",
            Opcode::IndirectBr => "indirectbr",
            Opcode::Invoke { .. } => "invoke",
            Opcode::Resume => "resume",
            Opcode::Unreachable => "unreachable",
            Opcode::CleanupRet => "cleanupret",
            Opcode::CatchRet => "catchret",
            Opcode::CatchSwitch { .. } => "catchswitch",
            Opcode::CallBr => "callbr",
            Opcode::FNeg => "fneg",
            Opcode::Binary(op) => op.name(),
            Opcode::Alloca { .. } => "alloca",
            Opcode::Load => "load",
            Opcode::Store => "store",
            Opcode::Fence => "fence",
            Opcode::AtomicCmpXchg => "cmpxchg",
            Opcode::AtomicRmw => "atomicrmw",
            Opcode::GetElementPtr { .. } => "getelementptr",
            Opcode::Cast(op) => op.name(),
            Opcode::ICmp(_) => "icmp",
            Opcode::FCmp(_) => "fcmp",
            Opcode::Phi => "phi",
            Opcode::Call { .. } => "call",
            Opcode::Select => "select",
            Opcode::VAArg => "va_arg",
            Opcode::ExtractElement => "extractelement",
            Opcode::InsertElement => "insertelement",
            Opcode::ShuffleVector => "shufflevector",
            Opcode::ExtractValue { .. } => "extractvalue",
            Opcode::InsertValue { .. } => "insertvalue",
            Opcode::LandingPad => "landingpad",
            Opcode::CleanupPad => "cleanuppad",
            Opcode::CatchPad => "catchpad",
            Opcode::Freeze => "freeze",
        }
    }

    /// Whether this opcode ends a block.
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Opcode::Ret
                | Opcode::Br
                | Opcode::Switch
                | Opcode::IndirectBr
                | Opcode::Invoke { .. }
                | Opcode::Resume
                | Opcode::Unreachable
                | Opcode::CleanupRet
                | Opcode::CatchRet
                | Opcode::CatchSwitch { .. }
                | Opcode::CallBr
        )
    }
}
