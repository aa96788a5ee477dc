//! AST rewrites run before lowering, and cleanups of the CFG that lowering
//! produces.

use tracing::debug;

use crate::{
    frontend::ast,
    middle::{
        context::{FunctionContext, SignatureTable},
        error::CompileResult,
    },
};

pub mod ast_rewrite;
pub mod cfg_cleanup;

#[cfg(test)]
mod ast_rewrite_tests;

pub const DEFAULT_MAX_PASSES: usize = 8;

/// Rewrites the function body until it stops changing or `max_passes` passes
/// have been made. A single pass already produces a fully optimized tree for
/// every rewrite we perform, so the second pass is normally the last. At
/// least one pass is always made.
pub fn optimize_function(
    mut function: ast::FunctionDefinition,
    signatures: &SignatureTable,
    max_passes: usize,
) -> CompileResult<ast::FunctionDefinition> {
    let name = function.signature.name.symbol;
    let ctx = FunctionContext::for_function(&function, signatures);

    for pass in 1..=max_passes.max(1) {
        let before = function.body.clone();
        function.body = function.body.optimize(&ctx)?;

        if function.body == before {
            debug!(function = %name, passes = pass, "optimizer reached a fixed point");
            return Ok(function);
        }
    }

    debug!(function = %name, max_passes, "optimizer stopped at the pass limit");
    Ok(function)
}
