//! The statement/expression tree produced by the parser. Every node owns its
//! children exclusively: the optimizer rewrites the tree by consuming a node
//! and handing back its replacement, and lowering only ever borrows it.

use super::intern::InternedSymbol;
use crate::{frontend::lexer::Span, middle::ty::Type};

pub mod pretty_print;

#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub functions: Vec<FunctionDefinition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDefinition {
    pub span: Span,
    pub signature: FunctionSignature,
    pub body: Statement,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSignature {
    pub span: Span,
    pub name: Identifier,
    pub parameters: Vec<FunctionParameter>,
    /// `()` when no return type is written
    pub return_type: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionParameter {
    pub span: Span,
    pub name: Identifier,
    pub ty: Type,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Identifier {
    pub span: Span,
    pub symbol: InternedSymbol,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub span: Span,
    pub kind: StatementKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    If {
        condition: Expression,
        /// Always produced by the parser. Trees built by hand may leave it
        /// out, which is reported as a malformed tree instead of panicking.
        positive: Option<Box<Statement>>,
        negative: Option<Box<Statement>>,
    },
    Block(Block),
    /// Local (let) binding or declaration
    Let(Box<Local>),
    Assign {
        target: Identifier,
        value: Expression,
    },
    Return(Option<Expression>),
    While {
        condition: Expression,
        body: Box<Statement>,
    },
    /// Expression evaluated for its side effects
    Expression(Expression),
    /// No-op (a lone semicolon, or what a folded-away statement turns into)
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Local {
    pub name: Identifier,
    pub ty: Option<Type>,
    pub initializer: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub span: Span,
    pub kind: ExpressionKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionKind {
    Literal(Literal),
    Variable(Identifier),
    FunctionCall {
        target: Identifier,
        arguments: Vec<Expression>,
    },
    Unary {
        operator: UnaryOperatorKind,
        operand: Box<Expression>,
    },
    Binary {
        operator: BinaryOperatorKind,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    /// `lhs && rhs`, `rhs` is only evaluated when `lhs` is true
    LogicalAnd {
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    /// `lhs || rhs`, `rhs` is only evaluated when `lhs` is false
    LogicalOr {
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(InternedSymbol),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum BinaryOperatorKind {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Subtract,
    #[strum(serialize = "*")]
    Multiply,
    #[strum(serialize = "/")]
    Divide,
    #[strum(serialize = "%")]
    Modulus,
    #[strum(serialize = "==")]
    Equals,
    #[strum(serialize = "!=")]
    NotEquals,
    #[strum(serialize = "<")]
    LessThan,
    #[strum(serialize = "<=")]
    LessThanOrEqualTo,
    #[strum(serialize = ">")]
    GreaterThan,
    #[strum(serialize = ">=")]
    GreaterThanOrEqualTo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperatorClass {
    Arithmetic,
    Comparison,
    Equality,
}

impl BinaryOperatorKind {
    pub fn class(self) -> BinaryOperatorClass {
        match self {
            Self::Add | Self::Subtract | Self::Multiply | Self::Divide | Self::Modulus => {
                BinaryOperatorClass::Arithmetic
            }
            Self::LessThan
            | Self::LessThanOrEqualTo
            | Self::GreaterThan
            | Self::GreaterThanOrEqualTo => BinaryOperatorClass::Comparison,
            Self::Equals | Self::NotEquals => BinaryOperatorClass::Equality,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum UnaryOperatorKind {
    #[strum(serialize = "!")]
    LogicalNot,
    #[strum(serialize = "-")]
    Negate,
}

impl Statement {
    pub fn new(span: Span, kind: StatementKind) -> Self {
        Self { span, kind }
    }

    pub fn empty(span: Span) -> Self {
        Self::new(span, StatementKind::Empty)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.kind, StatementKind::Empty)
    }
}

impl Expression {
    pub fn new(span: Span, kind: ExpressionKind) -> Self {
        Self { span, kind }
    }

    pub fn literal(span: Span, literal: Literal) -> Self {
        Self::new(span, ExpressionKind::Literal(literal))
    }

    /// Returns the literal value if the expression is a literal
    pub fn as_literal(&self) -> Option<Literal> {
        match &self.kind {
            ExpressionKind::Literal(literal) => Some(*literal),
            _ => None,
        }
    }
}
