//! Tree rewrites performed on the AST before lowering: constant folding,
//! dead branch elimination and collapsing of nested conditionals.
//!
//! Every rewrite consumes the node and hands back its replacement. The
//! parent installs whatever comes back into its own slot, which may be a
//! different kind of node than the one it gave away.

use tracing::debug;

use crate::{
    frontend::{
        ast::{
            BinaryOperatorKind, Block, Expression, ExpressionKind, Literal, Statement,
            StatementKind, UnaryOperatorKind,
        },
        lexer::Span,
    },
    middle::{
        context::FunctionContext,
        error::{CompileError, CompileErrorKind, CompileResult},
        ty::Type,
    },
};

impl Statement {
    pub fn optimize(self, ctx: &FunctionContext) -> CompileResult<Statement> {
        let span = self.span;

        let kind = match self.kind {
            StatementKind::If {
                condition,
                positive,
                negative,
            } => return optimize_if(span, condition, positive, negative, ctx),
            StatementKind::Block(block) => StatementKind::Block(block.optimize(ctx)?),
            StatementKind::Let(mut local) => {
                local.initializer = local
                    .initializer
                    .take()
                    .map(Expression::optimize)
                    .transpose()?;
                StatementKind::Let(local)
            }
            StatementKind::Assign { target, value } => StatementKind::Assign {
                target,
                value: value.optimize()?,
            },
            StatementKind::Return(value) => {
                StatementKind::Return(value.map(Expression::optimize).transpose()?)
            }
            StatementKind::While { condition, body } => {
                let condition = condition.optimize()?;

                if fold_constant_condition(&condition, ctx)? == Some(false) {
                    debug!(function = %ctx.name, "removed loop with a constant false condition");
                    return Ok(Statement::empty(span));
                }

                StatementKind::While {
                    condition,
                    body: Box::new((*body).optimize(ctx)?),
                }
            }
            StatementKind::Expression(expression) => {
                StatementKind::Expression(expression.optimize()?)
            }
            StatementKind::Empty => StatementKind::Empty,
        };

        Ok(Statement::new(span, kind))
    }
}

fn optimize_if(
    span: Span,
    condition: Expression,
    positive: Option<Box<Statement>>,
    negative: Option<Box<Statement>>,
    ctx: &FunctionContext,
) -> CompileResult<Statement> {
    let condition = condition.optimize()?;

    // Only the live branch survives a constant condition
    if let Some(value) = fold_constant_condition(&condition, ctx)? {
        let live = if value { positive } else { negative };

        return match live {
            Some(statement) => (*statement).optimize(ctx),
            None => Ok(Statement::empty(span)),
        };
    }

    let positive = positive
        .map(|statement| (*statement).optimize(ctx).map(Box::new))
        .transpose()?;
    let negative = negative
        .map(|statement| (*statement).optimize(ctx).map(Box::new))
        .transpose()?;

    // if a { if b { ... } } => if a && b { ... }
    let positive = match (positive, &negative) {
        (Some(positive), None) => match split_nested_if(*positive) {
            Ok((inner_condition, inner_positive)) => {
                debug!(function = %ctx.name, "collapsed nested if into a single `&&` condition");

                let condition = Expression::new(
                    condition.span.to(inner_condition.span),
                    ExpressionKind::LogicalAnd {
                        lhs: Box::new(condition),
                        rhs: Box::new(inner_condition),
                    },
                );

                return Ok(Statement::new(
                    span,
                    StatementKind::If {
                        condition,
                        positive: Some(inner_positive),
                        negative: None,
                    },
                ));
            }
            Err(positive) => Some(Box::new(positive)),
        },
        (positive, _) => positive,
    };

    Ok(Statement::new(
        span,
        StatementKind::If {
            condition,
            positive,
            negative,
        },
    ))
}

/// Splits `{ if b { ... } }` into the inner condition and then-branch. Any
/// other statement is handed back as it was.
fn split_nested_if(statement: Statement) -> Result<(Expression, Box<Statement>), Statement> {
    let span = statement.span;

    let statements = match statement.kind {
        StatementKind::Block(Block { statements }) => statements,
        kind => return Err(Statement::new(span, kind)),
    };

    match <[Statement; 1]>::try_from(statements) {
        Ok(
            [
                Statement {
                    kind:
                        StatementKind::If {
                            condition,
                            positive: Some(positive),
                            negative: None,
                        },
                    ..
                },
            ],
        ) => Ok((condition, positive)),
        Ok([inner]) => Err(Statement::new(
            span,
            StatementKind::Block(Block {
                statements: vec![inner],
            }),
        )),
        Err(statements) => Err(Statement::new(
            span,
            StatementKind::Block(Block { statements }),
        )),
    }
}

/// Evaluates an already optimized condition. Returns `None` when the
/// condition is only known at runtime, or does not type check as a `bool`
/// (which lowering reports).
pub fn fold_constant_condition(
    condition: &Expression,
    ctx: &FunctionContext,
) -> CompileResult<Option<bool>> {
    if !condition.is_constant() {
        return Ok(None);
    }

    // Ill-typed constants stay in the tree for lowering to report
    if !matches!(condition.ty(ctx), Ok(Type::Bool)) {
        return Ok(None);
    }

    match condition.as_literal() {
        Some(Literal::Bool(value)) => Ok(Some(value)),
        _ => Err(CompileError::new(
            CompileErrorKind::UnsupportedConstantFold,
            condition.span,
        )),
    }
}

impl Block {
    /// Optimizes every statement, dropping the ones that were folded away and
    /// splicing nested blocks into this one. A nested block that declares
    /// locals keeps its own scope and is left in place.
    pub fn optimize(self, ctx: &FunctionContext) -> CompileResult<Block> {
        let mut statements = Vec::with_capacity(self.statements.len());

        for statement in self.statements {
            let statement = statement.optimize(ctx)?;

            match statement.kind {
                StatementKind::Empty => {}
                StatementKind::Block(inner) if !inner.declares_locals() => {
                    statements.extend(inner.statements)
                }
                _ => statements.push(statement),
            }
        }

        Ok(Block { statements })
    }

    fn declares_locals(&self) -> bool {
        self.statements
            .iter()
            .any(|statement| matches!(statement.kind, StatementKind::Let(_)))
    }
}

impl Expression {
    /// Folds operators whose operands are literals into a literal
    pub fn optimize(self) -> CompileResult<Expression> {
        let span = self.span;

        let kind = match self.kind {
            kind @ (ExpressionKind::Literal(_) | ExpressionKind::Variable(_)) => kind,
            ExpressionKind::FunctionCall { target, arguments } => ExpressionKind::FunctionCall {
                target,
                arguments: arguments
                    .into_iter()
                    .map(Expression::optimize)
                    .collect::<CompileResult<_>>()?,
            },
            ExpressionKind::Unary { operator, operand } => {
                let operand = (*operand).optimize()?;

                match operand.as_literal().and_then(|v| fold_unary(operator, v)) {
                    Some(folded) => ExpressionKind::Literal(folded),
                    None => ExpressionKind::Unary {
                        operator,
                        operand: Box::new(operand),
                    },
                }
            }
            ExpressionKind::Binary { operator, lhs, rhs } => {
                let lhs = (*lhs).optimize()?;
                let rhs = (*rhs).optimize()?;

                let folded = match (lhs.as_literal(), rhs.as_literal()) {
                    (Some(l), Some(r)) => fold_binary(operator, l, r, span)?,
                    _ => None,
                };

                match folded {
                    Some(folded) => ExpressionKind::Literal(folded),
                    None => ExpressionKind::Binary {
                        operator,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                }
            }
            ExpressionKind::LogicalAnd { lhs, rhs } => {
                let lhs = (*lhs).optimize()?;
                let rhs = (*rhs).optimize()?;

                match (lhs.as_literal(), rhs.as_literal()) {
                    (Some(Literal::Bool(l)), Some(Literal::Bool(r))) => {
                        ExpressionKind::Literal(Literal::Bool(l && r))
                    }
                    _ => ExpressionKind::LogicalAnd {
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                }
            }
            ExpressionKind::LogicalOr { lhs, rhs } => {
                let lhs = (*lhs).optimize()?;
                let rhs = (*rhs).optimize()?;

                match (lhs.as_literal(), rhs.as_literal()) {
                    (Some(Literal::Bool(l)), Some(Literal::Bool(r))) => {
                        ExpressionKind::Literal(Literal::Bool(l || r))
                    }
                    _ => ExpressionKind::LogicalOr {
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                }
            }
        };

        Ok(Expression::new(span, kind))
    }
}

fn fold_unary(operator: UnaryOperatorKind, operand: Literal) -> Option<Literal> {
    match (operator, operand) {
        (UnaryOperatorKind::LogicalNot, Literal::Bool(v)) => Some(Literal::Bool(!v)),
        (UnaryOperatorKind::Negate, Literal::Integer(v)) => Some(Literal::Integer(v.wrapping_neg())),
        (UnaryOperatorKind::Negate, Literal::Float(v)) => Some(Literal::Float(-v)),
        _ => None,
    }
}

/// Returns `None` for operand combinations that do not type check
fn fold_binary(
    operator: BinaryOperatorKind,
    lhs: Literal,
    rhs: Literal,
    span: Span,
) -> CompileResult<Option<Literal>> {
    use BinaryOperatorKind as Op;

    let folded = match (lhs, rhs) {
        (Literal::Integer(l), Literal::Integer(r)) => match operator {
            // integer arithmetic wraps on overflow
            Op::Add => Literal::Integer(l.wrapping_add(r)),
            Op::Subtract => Literal::Integer(l.wrapping_sub(r)),
            Op::Multiply => Literal::Integer(l.wrapping_mul(r)),
            Op::Divide | Op::Modulus if r == 0 => {
                return Err(CompileError::new(CompileErrorKind::DivisionByZero, span));
            }
            Op::Divide => Literal::Integer(l.wrapping_div(r)),
            Op::Modulus => Literal::Integer(l.wrapping_rem(r)),
            Op::Equals => Literal::Bool(l == r),
            Op::NotEquals => Literal::Bool(l != r),
            Op::LessThan => Literal::Bool(l < r),
            Op::LessThanOrEqualTo => Literal::Bool(l <= r),
            Op::GreaterThan => Literal::Bool(l > r),
            Op::GreaterThanOrEqualTo => Literal::Bool(l >= r),
        },
        (Literal::Float(l), Literal::Float(r)) => match operator {
            Op::Add => Literal::Float(l + r),
            Op::Subtract => Literal::Float(l - r),
            Op::Multiply => Literal::Float(l * r),
            Op::Divide => Literal::Float(l / r),
            Op::Modulus => Literal::Float(l % r),
            Op::Equals => Literal::Bool(l == r),
            Op::NotEquals => Literal::Bool(l != r),
            Op::LessThan => Literal::Bool(l < r),
            Op::LessThanOrEqualTo => Literal::Bool(l <= r),
            Op::GreaterThan => Literal::Bool(l > r),
            Op::GreaterThanOrEqualTo => Literal::Bool(l >= r),
        },
        (Literal::Bool(l), Literal::Bool(r)) => match operator {
            Op::Equals => Literal::Bool(l == r),
            Op::NotEquals => Literal::Bool(l != r),
            _ => return Ok(None),
        },
        (Literal::String(l), Literal::String(r)) => match operator {
            Op::Equals => Literal::Bool(l == r),
            Op::NotEquals => Literal::Bool(l != r),
            _ => return Ok(None),
        },
        _ => return Ok(None),
    };

    Ok(Some(folded))
}
