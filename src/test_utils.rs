//! Helpers for building trees and LIR from source snippets in tests

use crate::{
    frontend::{
        SourceFile,
        ast::{self, Expression, Statement, StatementKind},
        parser::Parser,
    },
    middle::{
        context::{FunctionContext, SignatureTable},
        lir::{self, ast_lowering::lower_function},
        optimization::optimize_function,
    },
};

pub fn parse_module(source: &str) -> ast::Module {
    let source_file = SourceFile::from_memory(source);

    match Parser::parse_module(&source_file) {
        Ok(module) => module,
        Err(error) => panic!("{}", error.report(&source_file)),
    }
}

/// Parses a module holding exactly one function
pub fn parse_function(source: &str) -> ast::FunctionDefinition {
    let mut module = parse_module(source);
    assert_eq!(module.functions.len(), 1, "expected a single function");
    module.functions.remove(0)
}

pub fn body_statements(function: &ast::FunctionDefinition) -> &[Statement] {
    match &function.body.kind {
        StatementKind::Block(block) => &block.statements,
        other => panic!("function body is not a block: {other:?}"),
    }
}

/// Parses a lone expression by wrapping it in an expression statement
pub fn parse_expression(source: &str) -> Expression {
    let function = parse_function(&format!("fn wrapper() {{ {source}; }}"));

    match &body_statements(&function)[0].kind {
        StatementKind::Expression(expression) => expression.clone(),
        other => panic!("not an expression statement: {other:?}"),
    }
}

/// Runs the optimizer to a fixed point over the only function in `source`
pub fn optimize(source: &str) -> ast::FunctionDefinition {
    let module = parse_module(source);
    let signatures = SignatureTable::build(&module).unwrap();
    let function = module.functions.into_iter().next().unwrap();

    optimize_function(function, &signatures, 8).unwrap()
}

/// Lowers every function of `source` without optimizing it first
pub fn lower(source: &str) -> Vec<lir::FunctionDefinition> {
    let module = parse_module(source);
    let signatures = SignatureTable::build(&module).unwrap();

    module
        .functions
        .iter()
        .map(|function| lower_function(function, &signatures).unwrap())
        .collect()
}

/// A context for a function with no bindings, in a module with no functions
pub fn empty_context(table: &SignatureTable) -> FunctionContext<'_> {
    FunctionContext::new(
        crate::frontend::intern::InternedSymbol::new("test"),
        crate::middle::ty::Type::Unit,
        table,
    )
}
