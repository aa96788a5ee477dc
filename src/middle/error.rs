use colored::Colorize;
use thiserror::Error;

use crate::{
    frontend::{SourceFile, intern::InternedSymbol, lexer::Span},
    middle::ty::Type,
};

pub type CompileResult<T> = Result<T, CompileError>;

/// A hard compile error. Raising one aborts compilation of the current
/// function; there is no partially lowered output.
#[derive(Debug, Clone, Error)]
#[error("{kind}")]
pub struct CompileError {
    pub kind: CompileErrorKind,
    pub span: Span,
    /// Where in the compiler the error was raised
    #[cfg(feature = "error-backtrace")]
    pub origin: &'static std::panic::Location<'static>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileErrorKind {
    #[error("{}", type_mismatch_message(.boundary, .expected, .actual))]
    TypeMismatch {
        boundary: TypeBoundary,
        expected: Type,
        actual: Type,
    },
    #[error("malformed tree: {0}")]
    MalformedTree(&'static str),
    /// A condition reported itself as a constant bool but did not fold to a
    /// bool literal. This is a bug in the optimizer, not in the program.
    #[error("internal error: constant bool condition did not fold to a literal")]
    UnsupportedConstantFold,
    #[error("cannot find variable `{0}` in this function")]
    UndefinedVariable(InternedSymbol),
    #[error("cannot find function `{0}`")]
    UndefinedFunction(InternedSymbol),
    #[error("function `{0}` is defined more than once")]
    DuplicateFunction(InternedSymbol),
    #[error("expected {expected} argument(s) to this function but found {actual}")]
    ArgumentLengthMismatch { expected: usize, actual: usize },
    #[error("{}", invalid_operation_message(.usage, .provided))]
    InvalidOperation { usage: TypeUsage, provided: Type },
    #[error(
        "cannot infer the type of `{0}` without an explicit type or initializer expression"
    )]
    CannotInfer(InternedSymbol),
    #[error("expected function to return type {expected} but not every path returns a value")]
    MissingReturn { expected: Type },
    #[error("attempt to divide by zero")]
    DivisionByZero,
}

/// The place in the program where two types were required to agree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeBoundary {
    IfCondition,
    IfBranches,
    WhileCondition,
    LogicalOperand,
    BinaryOperation,
    FunctionArgument,
    LetBinding,
    LetRedeclaration,
    Assignment,
    Return,
}

/// What a value of the wrong type was used for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeUsage {
    ArithmeticOperation,
    ComparisonOperation,
    EqualityOperation,
    LogicalNot,
    Negation,
    Binding,
}

fn type_mismatch_message(boundary: &TypeBoundary, expected: &Type, actual: &Type) -> String {
    match boundary {
        TypeBoundary::IfCondition => {
            format!("expected if condition type to be {expected} but found {actual}")
        }
        TypeBoundary::IfBranches => format!(
            "if/else branches both return a value but their types do not match ({expected} and {actual})"
        ),
        TypeBoundary::WhileCondition => {
            format!("expected while condition type to be {expected} but found {actual}")
        }
        TypeBoundary::LogicalOperand => {
            format!("expected logical operand type to be {expected} but found {actual}")
        }
        TypeBoundary::BinaryOperation => format!(
            "expected left-hand side of binary op {expected} to match right-hand side {actual}"
        ),
        TypeBoundary::FunctionArgument => {
            format!("expected function argument to be {expected} but found {actual}")
        }
        TypeBoundary::LetBinding => {
            format!("let binding initializer type {actual} does not match explicit type {expected}")
        }
        TypeBoundary::LetRedeclaration => {
            format!("cannot redeclare a binding of type {expected} with type {actual}")
        }
        TypeBoundary::Assignment => {
            format!("cannot assign {actual} to variable with type {expected}")
        }
        TypeBoundary::Return => {
            format!("returned type {actual} does not match the function signature's type {expected}")
        }
    }
}

fn invalid_operation_message(usage: &TypeUsage, provided: &Type) -> String {
    match usage {
        TypeUsage::ArithmeticOperation => {
            format!("cannot use type {provided} in an arithmetic context")
        }
        TypeUsage::ComparisonOperation => format!("cannot compare values of type {provided}"),
        TypeUsage::EqualityOperation => {
            format!("cannot check values of type {provided} for equality")
        }
        TypeUsage::LogicalNot => format!("cannot apply `!` to type {provided}"),
        TypeUsage::Negation => format!("cannot negate type {provided}"),
        TypeUsage::Binding => format!("cannot bind a value of type {provided} to a variable"),
    }
}

impl CompileError {
    #[track_caller]
    pub fn new(kind: CompileErrorKind, span: Span) -> Self {
        Self {
            kind,
            span,
            #[cfg(feature = "error-backtrace")]
            origin: std::panic::Location::caller(),
        }
    }

    #[track_caller]
    pub fn type_mismatch(boundary: TypeBoundary, expected: Type, actual: Type, span: Span) -> Self {
        Self::new(
            CompileErrorKind::TypeMismatch {
                boundary,
                expected,
                actual,
            },
            span,
        )
    }

    #[track_caller]
    pub fn malformed(what: &'static str, span: Span) -> Self {
        Self::new(CompileErrorKind::MalformedTree(what), span)
    }

    /// Renders the error against the source it was raised for
    pub fn report(&self, source_file: &SourceFile) -> String {
        let message = format!(
            "{}: {} {}\n{}",
            "error".red(),
            self.kind,
            format!("(at {})", source_file.format_span_position(self.span)).white(),
            source_file.highlight_span(self.span)
        );

        #[cfg(feature = "error-backtrace")]
        let message = format!(
            "{}: {}\n{}",
            "backtrace".blue(),
            format!(
                "raised at {}:{}:{}",
                self.origin.file(),
                self.origin.line(),
                self.origin.column()
            )
            .white(),
            message
        );

        message
    }
}

impl PartialEq for CompileError {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.span == other.span
    }
}
