//! SSA CFG → stack-machine basic blocks.
//!
//! # Entry Points
//!
//! - [`lift_function`] lowers one function definition into an ordered list
//!   of [`BasicBlock`]s: one per source block (same order, label index equals
//!   source block index) followed by any blocks synthesized for phi detours
//!   and exception dispatch.
//! - [`initialize_global`] lowers one global initializer expression into a
//!   single block that stores it and returns.
//!
//! # Architecture
//!
//! [`Lifter`] owns the in-progress function: its variable table, its target
//! blocks, the insertion point, and the maps from source values to the
//! variables holding them. Lowering is split by concern:
//!
//! - `values.rs`: pushing any operand (constants, constant expressions,
//!   globals, arguments, instruction results)
//! - `memory.rs`: `alloca`, `load`, `store`, address arithmetic, aggregate
//!   member access
//! - `control_flow.rs`: phi resolution, branches, `switch`, `ret`
//! - `calls.rs`: direct, indirect, and variadic calls; `va_start`; `invoke`
//! - `eh.rs`: `catchswitch` dispatch, pads, `catchret`, `cleanupret`
//! - `ops.rs`: arithmetic, comparisons, conversions, `select`
//!
//! # Phi Resolution
//!
//! A predecessor pushes each phi operand (in the phi list's order) and marks
//! it with `PhiEnqueue`; the successor opens with one `PhiDequeue` + `Store`
//! pair per phi in *reverse* order, since the last operand pushed is on top.
//! The operands stay on the evaluation stack across the branch, while every
//! block still balances on its own.
//!
//! # Exceptions
//!
//! The in-flight exception lives in one slot per thread, reached through the
//! execution context ([`VariableKind::ExceptionSlot`]). A call that may throw
//! is followed by a check of that slot: `invoke` branches to its unwind
//! destination, a plain call in a throwing function returns early and leaves
//! the slot set for its own caller.

mod calls;
mod control_flow;
mod eh;
mod memory;
mod ops;
mod values;

use lift_ir::{BlockId, FunctionId, GlobalId, Module, Opcode, TypeId, ValueId};
use rustc_hash::FxHashMap;

use crate::cil::{
    BasicBlock, Constant, Instruction, LabelId, Signature, TargetType, VarId, VariableKind,
    VariableTable,
};
use crate::error::{LowerError, LowerResult};
use crate::oracle::TypeOracle;
use crate::throw_info::ThrowInfo;

// ── Results ─────────────────────────────────────────────────────────

/// A lowered function body.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct LiftedFunction {
    pub function: FunctionId,
    pub name: String,
    pub signature: Signature,
    pub variables: VariableTable,
    pub blocks: Vec<BasicBlock>,
    /// Whether stack allocations live in a heap frame.
    pub needs_frame: bool,
}

impl LiftedFunction {
    pub fn block(&self, label: LabelId) -> &BasicBlock {
        &self.blocks[label.index()]
    }

    /// Total instruction count across all blocks.
    pub fn instruction_count(&self) -> usize {
        self.blocks.iter().map(BasicBlock::len).sum()
    }
}

/// A lowered global initializer.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct LiftedInitializer {
    pub global: GlobalId,
    pub name: String,
    pub variables: VariableTable,
    pub block: BasicBlock,
}

// ── Shared variables ────────────────────────────────────────────────

/// Variables created once per function and reused at every mention.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum SharedVar {
    Constant(Constant, TargetType),
    Parameter(u32),
    Global(GlobalId),
    Function(FunctionId),
    ExceptionSlot,
}

// ── Lifter ──────────────────────────────────────────────────────────

/// In-progress lowering of one function or initializer.
pub(crate) struct Lifter<'a, O: TypeOracle + ?Sized> {
    module: &'a Module,
    oracle: &'a O,
    throw_info: &'a ThrowInfo,
    /// `None` while lowering a global initializer.
    function: Option<FunctionId>,
    name: String,
    may_throw: bool,
    needs_frame: bool,
    return_type: TargetType,

    vars: VariableTable,
    blocks: Vec<BasicBlock>,
    current: LabelId,
    /// Source block being lowered. Phi operands are keyed by it, including
    /// on edges leaving through a synthesized block.
    source_block: BlockId,

    /// Result variable of each non-void instruction.
    results: FxHashMap<ValueId, VarId>,
    /// Storage behind each `alloca`.
    storage: FxHashMap<ValueId, VarId>,
    shared: FxHashMap<SharedVar, VarId>,
}

impl<'a, O: TypeOracle + ?Sized> Lifter<'a, O> {
    fn new(
        module: &'a Module,
        oracle: &'a O,
        throw_info: &'a ThrowInfo,
        function: Option<FunctionId>,
        name: String,
    ) -> Self {
        let (may_throw, needs_frame) = function.map_or((false, false), |f| {
            (throw_info.may_throw(f), throw_info.needs_stack_frame(f))
        });
        Self {
            module,
            oracle,
            throw_info,
            function,
            name,
            may_throw,
            needs_frame,
            return_type: TargetType::Void,
            vars: VariableTable::new(),
            blocks: vec![BasicBlock::new(LabelId::new(0), None)],
            current: LabelId::new(0),
            source_block: BlockId::new(0),
            results: FxHashMap::default(),
            storage: FxHashMap::default(),
            shared: FxHashMap::default(),
        }
    }

    // Block management

    /// Allocate a synthesized block and return its label.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "block counts never exceed u32"
    )]
    fn new_block(&mut self) -> LabelId {
        let label = LabelId::new(self.blocks.len() as u32);
        self.blocks.push(BasicBlock::new(label, None));
        label
    }

    fn position_at(&mut self, label: LabelId) {
        debug_assert!(
            label.index() < self.blocks.len(),
            "LabelId {} out of bounds (have {} blocks)",
            label.raw(),
            self.blocks.len(),
        );
        self.current = label;
    }

    /// Label of the target block lowered from `block`.
    #[inline]
    fn label_of(block: BlockId) -> LabelId {
        LabelId::new(block.raw())
    }

    #[inline]
    fn emit(&mut self, instruction: Instruction) {
        self.blocks[self.current.index()].push(instruction);
    }

    // Types and variables

    fn lower_type(
        &self,
        ty: TypeId,
        origin: ValueId,
        opcode: &'static str,
    ) -> LowerResult<TargetType> {
        self.oracle
            .lower_type(self.module, ty)
            .ok_or_else(|| self.unsupported(opcode, "type", origin))
    }

    fn shared_var(&mut self, key: SharedVar, kind: VariableKind, ty: TargetType) -> VarId {
        if let Some(&var) = self.shared.get(&key) {
            return var;
        }
        let var = self.vars.add(kind, ty, None);
        self.shared.insert(key, var);
        var
    }

    fn constant(&mut self, constant: Constant, ty: TargetType) -> VarId {
        self.shared_var(
            SharedVar::Constant(constant.clone(), ty.clone()),
            VariableKind::Constant(constant),
            ty,
        )
    }

    fn exception_slot(&mut self) -> VarId {
        self.shared_var(
            SharedVar::ExceptionSlot,
            VariableKind::ExceptionSlot,
            TargetType::ExceptionInfo,
        )
    }

    /// The trailing read-only view a variadic function receives its extra
    /// arguments in.
    fn variadic_parameter(&mut self, origin: ValueId) -> LowerResult<VarId> {
        let module = self.module;
        let parts = self
            .function
            .and_then(|f| module.types.function_parts(module.function(f).ty));
        let index = match parts {
            Some((_, params, true)) => u32::try_from(params.len())
                .map_err(|_| self.unsupported("call", "parameter count", origin))?,
            _ => {
                return Err(self.unsupported(
                    "call",
                    "va_start outside a variadic function",
                    origin,
                ));
            }
        };
        Ok(self.shared_var(
            SharedVar::Parameter(index),
            VariableKind::Parameter { index },
            TargetType::ReadOnlySpan,
        ))
    }

    fn result_var(&self, value: ValueId) -> LowerResult<VarId> {
        self.results.get(&value).copied().ok_or_else(|| {
            self.invariant(format!("no result variable for {}", self.describe(value)))
        })
    }

    // Errors

    fn describe(&self, value: ValueId) -> String {
        self.module.display_value(value).to_string()
    }

    fn unsupported(
        &self,
        opcode: &'static str,
        construct: &'static str,
        value: ValueId,
    ) -> LowerError {
        LowerError::Unsupported {
            opcode,
            construct,
            value: self.describe(value),
        }
    }

    fn invariant(&self, message: String) -> LowerError {
        LowerError::Invariant {
            function: self.name.clone(),
            block: self.current.raw(),
            instruction: self.blocks[self.current.index()].len(),
            message,
        }
    }

    // Returns

    fn emit_leave_frame(&mut self) {
        if self.needs_frame {
            self.emit(Instruction::LeaveFrame);
        }
    }

    /// Return the zero value of the function's return type.
    fn emit_return_default(&mut self) {
        self.emit_leave_frame();
        self.emit(Instruction::ReturnDefault(self.return_type.clone()));
    }

    // Driver

    /// Create storage for every `alloca` and a result local for every other
    /// non-void instruction.
    fn allocate_variables(&mut self, function: FunctionId) -> LowerResult<()> {
        let module = self.module;
        for block in &module.function(function).blocks {
            for (id, inst) in module.block_instructions(function, block.id) {
                match &inst.opcode {
                    Opcode::Alloca { allocated } => {
                        let base = self.lower_type(*allocated, id, "alloca")?;
                        let count = inst
                            .value_operand(0)
                            .map_or(Some(1), |c| module.value(c).as_const_int())
                            .ok_or_else(|| {
                                self.unsupported("alloca", "dynamic allocation count", id)
                            })?;
                        let ty = match count {
                            1 => base,
                            n => match u64::try_from(n) {
                                Ok(len) => TargetType::inline_array(base, len),
                                Err(_) => {
                                    return Err(self.unsupported("alloca", "allocation count", id))
                                }
                            },
                        };
                        let storage = if self.needs_frame {
                            self.vars.frame_field(ty, Some(id))
                        } else {
                            self.vars.local(ty, Some(id))
                        };
                        self.storage.insert(id, storage);
                    }
                    Opcode::CatchSwitch { .. } => {}
                    Opcode::CatchPad | Opcode::CleanupPad => {
                        let var = self.vars.pinned_local(TargetType::ExceptionInfo, Some(id));
                        self.results.insert(id, var);
                    }
                    opcode => {
                        let ty = module.type_of(id);
                        if !module.types.is_void(ty) {
                            let lowered = self.lower_type(ty, id, opcode.name())?;
                            let var = self.vars.local(lowered, Some(id));
                            self.results.insert(id, var);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn lift(mut self, function: FunctionId) -> LowerResult<LiftedFunction> {
        let module = self.module;
        let source = module.function(function);
        if source.is_declaration() {
            return Err(self.unsupported("define", "function without a body", source.value));
        }

        let ret = module.return_type(function);
        self.return_type = self.lower_type(ret, source.value, "define")?;
        let signature = self
            .oracle
            .signature(module, source.ty)
            .ok_or_else(|| self.unsupported("define", "function signature", source.value))?;

        self.blocks = source
            .blocks
            .iter()
            .map(|b| BasicBlock::new(Self::label_of(b.id), Some(b.id)))
            .collect();
        self.allocate_variables(function)?;

        for block in &source.blocks {
            self.lift_block(function, block.id)?;
        }

        let synthesized = self.blocks.iter().filter(|b| b.is_synthesized()).count();
        tracing::debug!(
            function = %self.name,
            blocks = self.blocks.len(),
            synthesized,
            variables = self.vars.len(),
            needs_frame = self.needs_frame,
            "lifted function",
        );

        Ok(LiftedFunction {
            function,
            name: self.name,
            signature,
            variables: self.vars,
            blocks: self.blocks,
            needs_frame: self.needs_frame,
        })
    }

    fn lift_block(&mut self, function: FunctionId, block: BlockId) -> LowerResult<()> {
        let module = self.module;
        self.source_block = block;
        self.position_at(Self::label_of(block));

        if block.index() == 0 && self.needs_frame {
            self.emit(Instruction::EnterFrame);
        }

        let phis = module.leading_phis(function, block);
        self.lower_phi_prologue(&phis)?;

        for (id, _) in module.block_instructions(function, block).skip(phis.len()) {
            self.lower_instruction(id)?;
        }
        Ok(())
    }

    /// Per-opcode dispatch.
    fn lower_instruction(&mut self, id: ValueId) -> LowerResult<()> {
        let module = self.module;
        let Some(inst) = module.instruction(id) else {
            return Err(self.invariant(format!("{} is not an instruction", self.describe(id))));
        };

        match &inst.opcode {
            Opcode::Alloca { .. } => self.lower_alloca(id),
            Opcode::Load => self.lower_load(id, inst),
            Opcode::Store => self.lower_store(id, inst),
            Opcode::Br => self.lower_br(id, inst),
            Opcode::Switch => self.lower_switch(id, inst),
            Opcode::Ret => self.lower_ret(inst),
            Opcode::Unreachable => {
                self.emit(Instruction::Unreachable);
                Ok(())
            }
            Opcode::Call { function_type } => self.lower_call(id, inst, *function_type),
            Opcode::Invoke { function_type } => self.lower_invoke(id, inst, *function_type),
            Opcode::CatchSwitch { has_unwind_dest } => {
                self.lower_catch_switch(id, inst, *has_unwind_dest)
            }
            Opcode::CatchPad | Opcode::CleanupPad => self.lower_pad(id),
            Opcode::CatchRet => self.lower_catch_ret(id, inst),
            Opcode::CleanupRet => self.lower_cleanup_ret(id, inst),
            Opcode::Fence => {
                tracing::warn!(function = %self.name, "fence lowered to nothing");
                Ok(())
            }
            Opcode::AtomicRmw | Opcode::AtomicCmpXchg => self.lower_atomic(id, inst),
            Opcode::Phi => Err(self.unsupported("phi", "phi after the start of a block", id)),
            Opcode::Binary(_)
            | Opcode::FNeg
            | Opcode::Cast(_)
            | Opcode::ICmp(_)
            | Opcode::FCmp(_)
            | Opcode::GetElementPtr { .. }
            | Opcode::Select
            | Opcode::Freeze
            | Opcode::ExtractValue { .. }
            | Opcode::InsertValue { .. }
            | Opcode::VAArg
            | Opcode::ExtractElement
            | Opcode::InsertElement
            | Opcode::ShuffleVector => {
                let operands = inst
                    .operands
                    .iter()
                    .map(|op| op.as_value())
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| self.unsupported(inst.opcode.name(), "block operand", id))?;
                let result = self.result_var(id)?;
                self.lower_operation(&inst.opcode, &operands, module.type_of(id), result, id)
            }
            Opcode::IndirectBr | Opcode::CallBr | Opcode::Resume | Opcode::LandingPad => {
                Err(self.unsupported(inst.opcode.name(), "instruction", id))
            }
        }
    }
}

// ── Public API ──────────────────────────────────────────────────────

/// Lower one function definition.
///
/// `throw_info` must come from the same module; it decides where
/// pending-exception checks and heap frames go.
pub fn lift_function<O: TypeOracle + ?Sized>(
    module: &Module,
    oracle: &O,
    throw_info: &ThrowInfo,
    function: FunctionId,
) -> LowerResult<LiftedFunction> {
    let name = module.function(function).name.clone();
    Lifter::new(module, oracle, throw_info, Some(function), name).lift(function)
}

/// Lower the initializer of `global` into one block: evaluate, store into
/// the global, return.
pub fn initialize_global<O: TypeOracle + ?Sized>(
    module: &Module,
    oracle: &O,
    global: GlobalId,
) -> LowerResult<LiftedInitializer> {
    let g = module.global(global);
    let no_throw = ThrowInfo::default();
    let mut lifter = Lifter::new(module, oracle, &no_throw, None, g.name.clone());

    let Some(init) = g.initializer else {
        return Err(lifter.unsupported("global", "global without initializer", g.value));
    };
    let ty = lifter.lower_type(g.value_type, g.value, "global")?;
    let target = lifter.shared_var(SharedVar::Global(global), VariableKind::Global(global), ty);

    lifter.load_value(init)?;
    lifter.emit(Instruction::Store(target));
    lifter.emit(Instruction::Return { has_value: false });

    tracing::debug!(global = %g.name, instructions = lifter.blocks[0].len(), "lifted initializer");

    let block = lifter.blocks.swap_remove(0);
    Ok(LiftedInitializer {
        global,
        name: lifter.name,
        variables: lifter.vars,
        block,
    })
}

#[cfg(test)]
mod tests;
