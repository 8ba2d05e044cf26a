//! Target instructions and their stack-effect contract.
//!
//! Every variant declares how many values it pops and pushes as a pure
//! function of its fields. Variants that anchor control flow (branches,
//! switch, returns, phi markers) are *height dependent*: an optimization
//! that reasons about stack positions must never move or count across
//! them.

use std::fmt;

use lift_ir::FunctionId;

use super::block::LabelId;
use super::types::{Signature, TargetType};
use super::variable::VarId;

/// Stack arithmetic and bitwise operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    DivUn,
    Rem,
    RemUn,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    ShrUn,
}

impl BinaryOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::DivUn => "div.un",
            BinaryOp::Rem => "rem",
            BinaryOp::RemUn => "rem.un",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Xor => "xor",
            BinaryOp::Shl => "shl",
            BinaryOp::Shr => "shr",
            BinaryOp::ShrUn => "shr.un",
        }
    }
}

/// Two-operand comparisons producing 0 or 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum Comparison {
    Eq,
    Gt,
    GtUn,
    Lt,
    LtUn,
}

impl Comparison {
    pub fn mnemonic(self) -> &'static str {
        match self {
            Comparison::Eq => "ceq",
            Comparison::Gt => "cgt",
            Comparison::GtUn => "cgt.un",
            Comparison::Lt => "clt",
            Comparison::LtUn => "clt.un",
        }
    }
}

/// Runtime support routines the lowering calls directly.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum Helper {
    /// `InlineArray<nint, len>*` to `Span<nint>`.
    InlineArrayAsSpan { len: u32 },
    /// `ref Span<nint>, int32` to the address of that element.
    SpanGetItem,
    /// `Span<nint>` to `ReadOnlySpan<nint>`.
    SpanAsReadOnly,
    /// Release a caught exception object.
    ExceptionDispose,
    /// `cond ? a : b` over values of one type.
    Select(TargetType),
    /// Bit-preserving reinterpretation.
    BitCast { from: TargetType, to: TargetType },
    /// `va_list*, ReadOnlySpan<nint>`: point the list at the first slot.
    VAStart,
    /// `va_list*` to the address of the current slot, advancing the list.
    VAArg,
    /// `vector, int32` to one element.
    ExtractElement { vector: TargetType, element: TargetType },
    /// `vector, element, int32` to the updated vector.
    InsertElement { vector: TargetType, element: TargetType },
    /// `a, b, mask` to a vector as long as the mask.
    ShuffleVector {
        vector: TargetType,
        mask: TargetType,
        result: TargetType,
    },
}

impl Helper {
    pub fn signature(&self) -> Signature {
        match self {
            Helper::InlineArrayAsSpan { .. } => {
                Signature::new(vec![TargetType::Pointer], TargetType::Span)
            }
            Helper::SpanGetItem => Signature::new(
                vec![TargetType::Pointer, TargetType::I32],
                TargetType::Pointer,
            ),
            Helper::SpanAsReadOnly => {
                Signature::new(vec![TargetType::Span], TargetType::ReadOnlySpan)
            }
            Helper::ExceptionDispose => {
                Signature::new(vec![TargetType::ExceptionInfo], TargetType::Void)
            }
            Helper::Select(ty) => {
                Signature::new(vec![TargetType::Bool, ty.clone(), ty.clone()], ty.clone())
            }
            Helper::BitCast { from, to } => Signature::new(vec![from.clone()], to.clone()),
            Helper::VAStart => Signature::new(
                vec![TargetType::Pointer, TargetType::ReadOnlySpan],
                TargetType::Void,
            ),
            Helper::VAArg => Signature::new(vec![TargetType::Pointer], TargetType::Pointer),
            Helper::ExtractElement { vector, element } => {
                Signature::new(vec![vector.clone(), TargetType::I32], element.clone())
            }
            Helper::InsertElement { vector, element } => Signature::new(
                vec![vector.clone(), element.clone(), TargetType::I32],
                vector.clone(),
            ),
            Helper::ShuffleVector {
                vector,
                mask,
                result,
            } => Signature::new(
                vec![vector.clone(), vector.clone(), mask.clone()],
                result.clone(),
            ),
        }
    }

    fn name(&self) -> String {
        match self {
            Helper::InlineArrayAsSpan { len } => format!("InlineArray{len}.AsSpan"),
            Helper::SpanGetItem => "Span.get_Item".to_owned(),
            Helper::SpanAsReadOnly => "Span.AsReadOnly".to_owned(),
            Helper::ExceptionDispose => "ExceptionInfo.Dispose".to_owned(),
            Helper::Select(ty) => format!("Select<{ty}>"),
            Helper::BitCast { from, to } => format!("BitCast<{from}, {to}>"),
            Helper::VAStart => "VAStart".to_owned(),
            Helper::VAArg => "VAArg".to_owned(),
            Helper::ExtractElement { vector, element } => {
                format!("ExtractElement<{vector}, {element}>")
            }
            Helper::InsertElement { vector, element } => {
                format!("InsertElement<{vector}, {element}>")
            }
            Helper::ShuffleVector { vector, result, .. } => {
                format!("ShuffleVector<{vector}, {result}>")
            }
        }
    }
}

/// Direct call target.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum CallTarget {
    Function(FunctionId),
    Helper(Helper),
}

/// A field of an aggregate, with the field's own type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldRef {
    pub owner: TargetType,
    pub index: u32,
    pub ty: TargetType,
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::f{} ({})", self.owner, self.index, self.ty)
    }
}

/// One target instruction.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum Instruction {
    // Variables
    Load(VarId),
    Store(VarId),
    AddressOf(VarId),
    /// Zero the variable in place.
    Initialize(VarId),

    // Memory
    LoadIndirect(TargetType),
    /// Pops value, then address.
    StoreIndirect(TargetType),
    FieldAddress(FieldRef),
    LoadField(FieldRef),
    StoreField(FieldRef),

    // Arithmetic
    Binary(BinaryOp),
    Compare(Comparison),
    Negate,
    Convert { to: TargetType, unsigned: bool },
    SizeOf(TargetType),

    // Calls
    Call { target: CallTarget, sig: Signature },
    /// Pops the arguments, then the function pointer on top.
    CallIndirect(Signature),

    Pop,
    Nop,

    // Control flow
    Branch(LabelId),
    BranchIfTrue(LabelId),
    BranchIfFalse(LabelId),
    BranchIfEqual(LabelId),
    /// Jump table indexed by the popped value; falls through when out of
    /// range.
    Switch(Vec<LabelId>),
    /// Leave one phi operand on the stack for the successor. Counted as a
    /// pop so every block balances on its own.
    PhiEnqueue(TargetType),
    /// Take over one phi operand left by the predecessor.
    PhiDequeue(TargetType),
    Return { has_value: bool },
    /// Return the zero value of the given type.
    ReturnDefault(TargetType),
    /// Return a default value if an exception is in flight, leaving the
    /// slot set so the caller observes it.
    ReturnIfExceptionPending { ret: TargetType, leave_frame: bool },
    EnterFrame,
    LeaveFrame,
    Unreachable,
}

impl Instruction {
    /// Values consumed from the evaluation stack.
    pub fn pop_count(&self) -> u32 {
        match self {
            Instruction::Load(_)
            | Instruction::AddressOf(_)
            | Instruction::Initialize(_)
            | Instruction::SizeOf(_)
            | Instruction::Nop
            | Instruction::Branch(_)
            | Instruction::PhiDequeue(_)
            | Instruction::ReturnDefault(_)
            | Instruction::ReturnIfExceptionPending { .. }
            | Instruction::EnterFrame
            | Instruction::LeaveFrame
            | Instruction::Unreachable => 0,
            Instruction::Store(_)
            | Instruction::LoadIndirect(_)
            | Instruction::FieldAddress(_)
            | Instruction::LoadField(_)
            | Instruction::Negate
            | Instruction::Convert { .. }
            | Instruction::Pop
            | Instruction::BranchIfTrue(_)
            | Instruction::BranchIfFalse(_)
            | Instruction::Switch(_)
            | Instruction::PhiEnqueue(_) => 1,
            Instruction::StoreIndirect(_)
            | Instruction::StoreField(_)
            | Instruction::Binary(_)
            | Instruction::Compare(_)
            | Instruction::BranchIfEqual(_) => 2,
            Instruction::Return { has_value } => u32::from(*has_value),
            Instruction::Call { sig, .. } => param_count(sig),
            Instruction::CallIndirect(sig) => param_count(sig) + 1,
        }
    }

    /// Values produced onto the evaluation stack.
    pub fn push_count(&self) -> u32 {
        match self {
            Instruction::Load(_)
            | Instruction::AddressOf(_)
            | Instruction::LoadIndirect(_)
            | Instruction::FieldAddress(_)
            | Instruction::LoadField(_)
            | Instruction::Binary(_)
            | Instruction::Compare(_)
            | Instruction::Negate
            | Instruction::Convert { .. }
            | Instruction::SizeOf(_)
            | Instruction::PhiDequeue(_) => 1,
            Instruction::Call { sig, .. } | Instruction::CallIndirect(sig) => {
                u32::from(!sig.ret.is_void())
            }
            Instruction::Store(_)
            | Instruction::Initialize(_)
            | Instruction::StoreIndirect(_)
            | Instruction::StoreField(_)
            | Instruction::Pop
            | Instruction::Nop
            | Instruction::Branch(_)
            | Instruction::BranchIfTrue(_)
            | Instruction::BranchIfFalse(_)
            | Instruction::BranchIfEqual(_)
            | Instruction::Switch(_)
            | Instruction::PhiEnqueue(_)
            | Instruction::Return { .. }
            | Instruction::ReturnDefault(_)
            | Instruction::ReturnIfExceptionPending { .. }
            | Instruction::EnterFrame
            | Instruction::LeaveFrame
            | Instruction::Unreachable => 0,
        }
    }

    /// `push_count - pop_count`.
    #[expect(
        clippy::cast_possible_wrap,
        reason = "stack counts are tiny"
    )]
    pub fn stack_effect(&self) -> i32 {
        self.push_count() as i32 - self.pop_count() as i32
    }

    /// Whether stack-position reasoning must stop at this instruction.
    pub fn is_height_dependent(&self) -> bool {
        matches!(
            self,
            Instruction::Branch(_)
                | Instruction::BranchIfTrue(_)
                | Instruction::BranchIfFalse(_)
                | Instruction::BranchIfEqual(_)
                | Instruction::Switch(_)
                | Instruction::PhiEnqueue(_)
                | Instruction::PhiDequeue(_)
                | Instruction::Return { .. }
                | Instruction::ReturnDefault(_)
                | Instruction::ReturnIfExceptionPending { .. }
                | Instruction::Unreachable
        )
    }

    /// Whether control never falls through to the next instruction.
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Instruction::Branch(_)
                | Instruction::Return { .. }
                | Instruction::ReturnDefault(_)
                | Instruction::Unreachable
        )
    }

    /// Whether the stack must be empty once this instruction has run.
    pub fn is_branch_point(&self) -> bool {
        self.is_height_dependent()
            && !matches!(self, Instruction::PhiEnqueue(_) | Instruction::PhiDequeue(_))
    }

    /// Labels this instruction may transfer control to.
    pub fn branch_targets(&self) -> &[LabelId] {
        match self {
            Instruction::Branch(l)
            | Instruction::BranchIfTrue(l)
            | Instruction::BranchIfFalse(l)
            | Instruction::BranchIfEqual(l) => std::slice::from_ref(l),
            Instruction::Switch(labels) => labels,
            _ => &[],
        }
    }

    /// Variable named by a variable-access instruction.
    pub fn variable(&self) -> Option<VarId> {
        match self {
            Instruction::Load(v)
            | Instruction::Store(v)
            | Instruction::AddressOf(v)
            | Instruction::Initialize(v) => Some(*v),
            _ => None,
        }
    }

    /// Render with a caller-chosen spelling for labels.
    pub fn write_with(
        &self,
        f: &mut fmt::Formatter<'_>,
        label: &dyn Fn(LabelId) -> String,
    ) -> fmt::Result {
        match self {
            Instruction::Load(v) => write!(f, "load {v}"),
            Instruction::Store(v) => write!(f, "store {v}"),
            Instruction::AddressOf(v) => write!(f, "addr {v}"),
            Instruction::Initialize(v) => write!(f, "init {v}"),
            Instruction::LoadIndirect(ty) => write!(f, "ldind {ty}"),
            Instruction::StoreIndirect(ty) => write!(f, "stind {ty}"),
            Instruction::FieldAddress(field) => write!(f, "ldflda {field}"),
            Instruction::LoadField(field) => write!(f, "ldfld {field}"),
            Instruction::StoreField(field) => write!(f, "stfld {field}"),
            Instruction::Binary(op) => f.write_str(op.mnemonic()),
            Instruction::Compare(cmp) => f.write_str(cmp.mnemonic()),
            Instruction::Negate => f.write_str("neg"),
            Instruction::Convert { to, unsigned } => {
                write!(f, "conv{} {to}", if *unsigned { ".un" } else { "" })
            }
            Instruction::SizeOf(ty) => write!(f, "sizeof {ty}"),
            Instruction::Call {
                target: CallTarget::Function(id),
                sig,
            } => write!(f, "call fn#{} {sig}", id.raw()),
            Instruction::Call {
                target: CallTarget::Helper(helper),
                sig,
            } => write!(f, "call {} {sig}", helper.name()),
            Instruction::CallIndirect(sig) => write!(f, "calli {sig}"),
            Instruction::Pop => f.write_str("pop"),
            Instruction::Nop => f.write_str("nop"),
            Instruction::Branch(l) => write!(f, "br {}", label(*l)),
            Instruction::BranchIfTrue(l) => write!(f, "brtrue {}", label(*l)),
            Instruction::BranchIfFalse(l) => write!(f, "brfalse {}", label(*l)),
            Instruction::BranchIfEqual(l) => write!(f, "beq {}", label(*l)),
            Instruction::Switch(labels) => {
                f.write_str("switch (")?;
                for (i, l) in labels.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(&label(*l))?;
                }
                f.write_str(")")
            }
            Instruction::PhiEnqueue(ty) => write!(f, "phi.enqueue {ty}"),
            Instruction::PhiDequeue(ty) => write!(f, "phi.dequeue {ty}"),
            Instruction::Return { .. } => f.write_str("ret"),
            Instruction::ReturnDefault(ty) => write!(f, "ret.default {ty}"),
            Instruction::ReturnIfExceptionPending { ret, leave_frame } => {
                write!(f, "ret.ifpending {ret}")?;
                if *leave_frame {
                    f.write_str(" leave")?;
                }
                Ok(())
            }
            Instruction::EnterFrame => f.write_str("frame.enter"),
            Instruction::LeaveFrame => f.write_str("frame.leave"),
            Instruction::Unreachable => f.write_str("unreachable"),
        }
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "parameter counts never exceed u32"
)]
fn param_count(sig: &Signature) -> u32 {
    sig.params.len() as u32
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_with(f, &|l: LabelId| l.to_string())
    }
}
