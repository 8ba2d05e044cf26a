//! Lowering errors.
//!
//! Both variants are fatal for the translation unit. A peephole rule whose
//! precondition fails is not an error; the optimizer leaves the code alone
//! and only counts the declined fold.

use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LowerError {
    /// A source construct the driver has no lowering for.
    #[error("unsupported {construct} in `{opcode}`: {value}")]
    Unsupported {
        opcode: &'static str,
        construct: &'static str,
        /// Textual form of the offending source value.
        value: String,
    },

    /// Lowered code broke a stack or type invariant. Always an internal
    /// defect.
    #[error("invariant violated in `{function}` at L{block}[{instruction}]: {message}")]
    Invariant {
        function: String,
        block: u32,
        instruction: usize,
        message: String,
    },
}

pub type LowerResult<T> = Result<T, LowerError>;
