//! Whole-module lowering.
//!
//! Runs might-throw analysis once, then lowers every function definition
//! and every global initializer independently: lift, verify, optimize,
//! verify again. Functions are distributed over the rayon pool unless
//! [`LowerOptions::parallel`] is off; results keep declaration order either
//! way, and the first failing function in that order decides the error.

use lift_ir::{FunctionId, GlobalId, Module};
use rayon::prelude::*;

use crate::emit::verify_blocks;
use crate::error::LowerResult;
use crate::lower::{initialize_global, lift_function, LiftedFunction, LiftedInitializer};
use crate::optimize::{optimize_blocks, optimize_function, OptimizeStats};
use crate::options::LowerOptions;
use crate::oracle::TypeOracle;
use crate::throw_info::ThrowInfo;

/// Every lowered body of one module.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct LiftedModule {
    pub name: String,
    /// Function definitions, in declaration order.
    pub functions: Vec<LiftedFunction>,
    /// Initializers of globals that have one, in declaration order.
    pub initializers: Vec<LiftedInitializer>,
}

impl LiftedModule {
    pub fn function(&self, id: FunctionId) -> Option<&LiftedFunction> {
        self.functions.iter().find(|f| f.function == id)
    }

    pub fn function_named(&self, name: &str) -> Option<&LiftedFunction> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn initializer(&self, id: GlobalId) -> Option<&LiftedInitializer> {
        self.initializers.iter().find(|i| i.global == id)
    }
}

/// Lower, check, and optimize one function.
pub fn lower_function<O: TypeOracle + ?Sized>(
    module: &Module,
    oracle: &O,
    throw_info: &ThrowInfo,
    function: FunctionId,
    options: LowerOptions,
) -> LowerResult<(LiftedFunction, OptimizeStats)> {
    let mut lifted = lift_function(module, oracle, throw_info, function)?;
    if options.verify {
        verify_blocks(&lifted.name, &lifted.blocks)?;
    }
    let stats = optimize_function(&mut lifted, options.peephole);
    if options.verify && stats.changes() > 0 {
        verify_blocks(&lifted.name, &lifted.blocks)?;
    }
    Ok((lifted, stats))
}

fn lower_initializer<O: TypeOracle + ?Sized>(
    module: &Module,
    oracle: &O,
    global: GlobalId,
    options: LowerOptions,
) -> LowerResult<LiftedInitializer> {
    let mut lifted = initialize_global(module, oracle, global)?;
    let block = std::slice::from_mut(&mut lifted.block);
    optimize_blocks(&lifted.variables, block, options.peephole);
    if options.verify {
        verify_blocks(&lifted.name, std::slice::from_ref(&lifted.block))?;
    }
    Ok(lifted)
}

/// Lower every definition and initializer in `module`.
pub fn lift_module<O: TypeOracle + ?Sized>(
    module: &Module,
    oracle: &O,
    options: LowerOptions,
) -> LowerResult<LiftedModule> {
    let throw_info = ThrowInfo::compute(module, oracle);

    let definitions: Vec<FunctionId> = module
        .functions()
        .filter(|f| !f.is_declaration())
        .map(|f| f.id)
        .collect();
    let globals: Vec<GlobalId> = module
        .globals()
        .filter(|g| g.initializer.is_some())
        .map(|g| g.id)
        .collect();

    let lower_one = |&function: &FunctionId| {
        lower_function(module, oracle, &throw_info, function, options).map(|(lifted, _)| lifted)
    };
    let results: Vec<LowerResult<LiftedFunction>> = if options.parallel {
        definitions.par_iter().map(lower_one).collect()
    } else {
        definitions.iter().map(lower_one).collect()
    };
    let functions = results.into_iter().collect::<LowerResult<Vec<_>>>()?;

    let initializers = globals
        .iter()
        .map(|&global| lower_initializer(module, oracle, global, options))
        .collect::<LowerResult<Vec<_>>>()?;

    tracing::debug!(
        module = %module.name,
        functions = functions.len(),
        initializers = initializers.len(),
        throwing = throw_info.throwing_count(),
        parallel = options.parallel,
        "lifted module",
    );

    Ok(LiftedModule {
        name: module.name.clone(),
        functions,
        initializers,
    })
}
