//! Lowering configuration.

/// How much peephole optimization runs after lowering.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PeepholeLevel {
    /// Leave lowered blocks untouched.
    None,
    /// Load fold, store fold, and dead-pop cleanup, to a fixed point.
    #[default]
    Fold,
    /// `Fold` plus removal of redundant temporary initializations and
    /// store/load round trips through single-use temporaries.
    Aggressive,
}

/// Configuration for a lowering run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LowerOptions {
    pub peephole: PeepholeLevel,
    /// Check stack balance after lowering and again after optimization.
    pub verify: bool,
    /// Lower independent functions on the rayon pool.
    pub parallel: bool,
}

impl Default for LowerOptions {
    fn default() -> Self {
        Self {
            peephole: PeepholeLevel::Fold,
            verify: true,
            parallel: true,
        }
    }
}

impl LowerOptions {
    /// Default options with the given optimizer level.
    pub fn with_peephole(peephole: PeepholeLevel) -> Self {
        Self {
            peephole,
            ..Default::default()
        }
    }

    /// Default options, lowering one function at a time on the caller's
    /// thread.
    pub fn single_threaded() -> Self {
        Self {
            parallel: false,
            ..Default::default()
        }
    }
}
