//! Compiles a whole source file: parse, build the signature table, then take
//! every function through the optimizer, lowering and CFG cleanup. Functions
//! are compiled independently of each other, optionally on several threads.

use std::{
    path::Path,
    sync::{Mutex, PoisonError},
};

use itertools::Itertools;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    frontend::{
        SourceFile, ast,
        parser::{ParseError, Parser},
    },
    middle::{
        context::SignatureTable,
        error::{CompileError, CompileResult},
        lir::{self, ast_lowering::lower_function, pretty_print::pretty_print_module},
        optimization::{DEFAULT_MAX_PASSES, cfg_cleanup::cleanup_function, optimize_function},
    },
};

/// What the compiler writes out once a module compiles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum EmitKind {
    /// The tree as parsed
    Ast,
    /// The tree after constant folding and if-chain collapsing
    OptimizedAst,
    #[default]
    Lir,
}

#[derive(Debug, Clone)]
pub struct CompilerOptions {
    pub emit: EmitKind,
    /// Runs the AST optimizer and the CFG cleanup
    pub optimize: bool,
    pub max_passes: usize,
    /// Number of worker threads functions are spread across
    pub jobs: usize,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            emit: EmitKind::default(),
            optimize: true,
            max_passes: DEFAULT_MAX_PASSES,
            jobs: 1,
        }
    }
}

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("{0}")]
    Parse(#[from] ParseError),
    #[error("{} error(s) while compiling", .0.len())]
    Compile(Vec<CompileError>),
}

impl DriverError {
    /// Renders every error against the source it was raised for
    pub fn report(&self, source_file: &SourceFile) -> String {
        match self {
            DriverError::Parse(error) => error.report(source_file),
            DriverError::Compile(errors) => errors
                .iter()
                .map(|error| error.report(source_file))
                .join("\n\n"),
        }
    }
}

#[derive(Debug)]
pub struct CompiledModule {
    /// The module's functions as they were lowered (optimized when enabled)
    pub ast: ast::Module,
    pub lir: lir::Module,
}

/// Compiles a source file and renders what `options.emit` asks for
pub fn compile(source_file: &SourceFile, options: &CompilerOptions) -> Result<String, DriverError> {
    let module = Parser::parse_module(source_file)?;

    if options.emit == EmitKind::Ast {
        return Ok(module.describe());
    }

    let compiled = compile_module(module, options)?;

    Ok(match options.emit {
        EmitKind::Ast | EmitKind::OptimizedAst => compiled.ast.describe(),
        EmitKind::Lir => pretty_print_module(&compiled.lir),
    })
}

/// Compiles every function of a parsed module. A function failing does not
/// stop the others from being compiled; all errors are returned together in
/// declaration order.
pub fn compile_module(
    module: ast::Module,
    options: &CompilerOptions,
) -> Result<CompiledModule, DriverError> {
    let signatures =
        SignatureTable::build(&module).map_err(|error| DriverError::Compile(vec![error]))?;

    info!(
        functions = module.functions.len(),
        jobs = options.jobs,
        optimize = options.optimize,
        "compiling module"
    );

    let lir = Mutex::new(lir::Module::with_capacity(signatures.len()));

    let results = if options.jobs > 1 && module.functions.len() > 1 {
        compile_parallel(module.functions, &signatures, options, &lir)
    } else {
        module
            .functions
            .into_iter()
            .map(|function| compile_function(function, &signatures, options, &lir))
            .collect()
    };

    let (functions, errors): (Vec<_>, Vec<_>) = results.into_iter().partition_result();
    if !errors.is_empty() {
        return Err(DriverError::Compile(errors));
    }

    Ok(CompiledModule {
        ast: ast::Module { functions },
        lir: lir.into_inner().unwrap_or_else(PoisonError::into_inner),
    })
}

/// Splits the functions into one contiguous chunk per worker. Results keep
/// the order the functions were declared in.
fn compile_parallel(
    functions: Vec<ast::FunctionDefinition>,
    signatures: &SignatureTable,
    options: &CompilerOptions,
    lir: &Mutex<lir::Module>,
) -> Vec<CompileResult<ast::FunctionDefinition>> {
    let chunk_size = functions.len().div_ceil(options.jobs);
    let chunks = functions
        .into_iter()
        .chunks(chunk_size)
        .into_iter()
        .map(Iterator::collect::<Vec<_>>)
        .collect::<Vec<_>>();

    std::thread::scope(|scope| {
        let workers = chunks
            .into_iter()
            .map(|chunk| {
                scope.spawn(move || {
                    chunk
                        .into_iter()
                        .map(|function| compile_function(function, signatures, options, lir))
                        .collect::<Vec<_>>()
                })
            })
            .collect::<Vec<_>>();

        workers
            .into_iter()
            .flat_map(|worker| {
                worker
                    .join()
                    .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
            })
            .collect()
    })
}

fn compile_function(
    function: ast::FunctionDefinition,
    signatures: &SignatureTable,
    options: &CompilerOptions,
    lir: &Mutex<lir::Module>,
) -> CompileResult<ast::FunctionDefinition> {
    let name = function.signature.name.symbol;

    let function = if options.optimize {
        optimize_function(function, signatures, options.max_passes)?
    } else {
        function
    };

    let mut lowered = lower_function(&function, signatures)?;
    if options.optimize {
        cleanup_function(&mut lowered);
    }

    debug!(function = %name, blocks = lowered.blocks.len(), "compiled function");

    lir.lock()
        .unwrap_or_else(PoisonError::into_inner)
        .install(lowered);

    Ok(function)
}

/// Writes the rendered output to `path`, or to stdout without one
pub fn write_output(rendered: &str, path: Option<&Path>) -> std::io::Result<()> {
    match path {
        Some(path) => std::fs::write(path, rendered),
        None => {
            print!("{rendered}");
            Ok(())
        }
    }
}
