//! Stack verification and linearization of lowered blocks.
//!
//! [`verify_blocks`] checks the structural contract every lowered body must
//! meet before it is handed to a code writer: no block pops more than it
//! has pushed, the stack is empty at every branch point and at block exit,
//! every block ends in a terminator, and every jump names an existing
//! block. Phi markers are counted like any other instruction, so a block
//! that leaves phi operands for its successor still balances.
//!
//! [`emit_function`] lays the blocks out in order and computes the maximum
//! physical stack depth. Physically, operands marked by `PhiEnqueue` stay on
//! the stack until the successor takes them, so they count towards depth.

use std::fmt;

use crate::cil::{BasicBlock, Instruction, LabelId};
use crate::error::{LowerError, LowerResult};

/// A linear instruction stream for one function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmittedBody {
    pub name: String,
    pub code: Vec<Instruction>,
    /// Offset of each block's first instruction, indexed by label.
    pub label_offsets: Vec<usize>,
    pub max_stack: u32,
}

impl EmittedBody {
    pub fn offset_of(&self, label: LabelId) -> Option<usize> {
        self.label_offsets.get(label.index()).copied()
    }
}

impl fmt::Display for EmittedBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "// {} (max stack {})", self.name, self.max_stack)?;
        let label = |l: LabelId| {
            self.offset_of(l)
                .map_or_else(|| l.to_string(), |offset| format!("IL_{offset:04x}"))
        };
        for (offset, instruction) in self.code.iter().enumerate() {
            write!(f, "IL_{offset:04x}: ")?;
            instruction.write_with(f, &label)?;
            writeln!(f)?;
        }
        Ok(())
    }
}

fn violation(
    function: &str,
    block: &BasicBlock,
    instruction: usize,
    message: String,
) -> LowerError {
    LowerError::Invariant {
        function: function.to_owned(),
        block: block.label.raw(),
        instruction,
        message,
    }
}

/// Check the stack and control-flow contract of `blocks`.
pub fn verify_blocks(function: &str, blocks: &[BasicBlock]) -> LowerResult<()> {
    for block in blocks {
        let mut height: u32 = 0;
        for (index, instruction) in block.instructions.iter().enumerate() {
            let pops = instruction.pop_count();
            if pops > height {
                return Err(violation(
                    function,
                    block,
                    index,
                    format!(
                        "stack underflow: `{instruction}` pops {pops} with {height} on the stack"
                    ),
                ));
            }
            height = height - pops + instruction.push_count();

            if instruction.is_branch_point() && height != 0 {
                return Err(violation(
                    function,
                    block,
                    index,
                    format!("{height} values left on the stack after `{instruction}`"),
                ));
            }
            if let Some(target) = instruction
                .branch_targets()
                .iter()
                .find(|l| l.index() >= blocks.len())
            {
                return Err(violation(
                    function,
                    block,
                    index,
                    format!("jump to unknown block {target}"),
                ));
            }
        }

        if height != 0 {
            return Err(violation(
                function,
                block,
                block.len(),
                format!("{height} values left on the stack at block exit"),
            ));
        }
        if !block.instructions.last().is_some_and(Instruction::is_terminator) {
            return Err(violation(
                function,
                block,
                block.len(),
                "block does not end in a terminator".to_owned(),
            ));
        }
    }
    Ok(())
}

/// Lay out `blocks` in order. Empty blocks get a `Nop` so every label has
/// an instruction to point at.
pub fn emit_function(function: &str, blocks: &[BasicBlock]) -> LowerResult<EmittedBody> {
    let mut code = Vec::with_capacity(blocks.iter().map(BasicBlock::len).sum());
    let mut label_offsets = vec![0; blocks.len()];
    let mut max_stack: u32 = 0;

    for block in blocks {
        if let Some(offset) = label_offsets.get_mut(block.label.index()) {
            *offset = code.len();
        }
        if block.is_empty() {
            code.push(Instruction::Nop);
            continue;
        }

        let mut height: u32 = 0;
        let mut pending: u32 = 0;
        for (index, instruction) in block.instructions.iter().enumerate() {
            let pops = instruction.pop_count();
            if pops > height {
                return Err(violation(
                    function,
                    block,
                    index,
                    format!(
                        "stack underflow: `{instruction}` pops {pops} with {height} on the stack"
                    ),
                ));
            }
            height = height - pops + instruction.push_count();
            if matches!(instruction, Instruction::PhiEnqueue(_)) {
                pending += 1;
            }
            max_stack = max_stack.max(height + pending);
            code.push(instruction.clone());
        }
    }

    tracing::trace!(function, instructions = code.len(), max_stack, "emitted body");

    Ok(EmittedBody {
        name: function.to_owned(),
        code,
        label_offsets,
        max_stack,
    })
}
