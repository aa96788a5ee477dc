//! Type rules of statements and expressions. Types are computed on demand
//! from the tree and the bindings of the function context; nothing is
//! cached on the nodes.

use crate::{
    frontend::{
        ast::{
            BinaryOperatorClass, Block, Expression, ExpressionKind, Literal, Local, Statement,
            StatementKind, UnaryOperatorKind,
        },
        lexer::Span,
    },
    middle::{
        context::FunctionContext,
        error::{CompileError, CompileErrorKind, CompileResult, TypeBoundary, TypeUsage},
        ty::Type,
    },
};

impl Statement {
    /// The type this statement is guaranteed to return on every path through
    /// it, or `None` if some path falls through.
    pub fn return_type(&self, ctx: &mut FunctionContext) -> CompileResult<Option<Type>> {
        match &self.kind {
            StatementKind::If {
                positive, negative, ..
            } => {
                let Some(negative) = negative else {
                    return Ok(None);
                };

                let Some(positive) = positive else {
                    return Err(CompileError::malformed(
                        "if statement has an else branch but no then branch",
                        self.span,
                    ));
                };

                let (Some(positive_type), Some(negative_type)) =
                    (positive.return_type(ctx)?, negative.return_type(ctx)?)
                else {
                    return Ok(None);
                };

                if positive_type != negative_type {
                    return Err(CompileError::type_mismatch(
                        TypeBoundary::IfBranches,
                        positive_type,
                        negative_type,
                        self.span,
                    ));
                }

                Ok(Some(positive_type))
            }
            StatementKind::Block(block) => block.return_type(ctx),
            StatementKind::Return(Some(value)) => Ok(Some(value.ty(ctx)?)),
            StatementKind::Return(None) => Ok(Some(Type::Unit)),
            StatementKind::Let(_)
            | StatementKind::Assign { .. }
            | StatementKind::While { .. }
            | StatementKind::Expression(_)
            | StatementKind::Empty => Ok(None),
        }
    }
}

impl Block {
    /// Return type of the first statement that guarantees one. Anything after
    /// it is dead code.
    ///
    /// The block's locals are bound in a scope of their own while its
    /// statements are checked, and dropped again afterwards.
    pub fn return_type(&self, ctx: &mut FunctionContext) -> CompileResult<Option<Type>> {
        ctx.push_scope();
        let return_type = self.scoped_return_type(ctx);
        ctx.pop_scope();

        return_type
    }

    fn scoped_return_type(&self, ctx: &mut FunctionContext) -> CompileResult<Option<Type>> {
        for statement in &self.statements {
            if let StatementKind::Let(local) = &statement.kind {
                let ty = local.resolve_type(ctx, statement.span)?;
                ctx.declare(&local.name, ty)?;
            }

            if let Some(ty) = statement.return_type(ctx)? {
                return Ok(Some(ty));
            }
        }

        Ok(None)
    }
}

impl Local {
    /// The type the local is bound with: the annotation, the initializer's
    /// type, or both when they agree
    pub fn resolve_type(&self, ctx: &FunctionContext, span: Span) -> CompileResult<Type> {
        let initializer_type = self
            .initializer
            .as_ref()
            .map(|initializer| initializer.ty(ctx))
            .transpose()?;

        let ty = match (self.ty, initializer_type) {
            (Some(explicit), Some(actual)) if explicit != actual => {
                return Err(CompileError::type_mismatch(
                    TypeBoundary::LetBinding,
                    explicit,
                    actual,
                    self.initializer.as_ref().map(|i| i.span).unwrap_or(span),
                ));
            }
            (Some(ty), _) | (None, Some(ty)) => ty,
            (None, None) => {
                return Err(CompileError::new(
                    CompileErrorKind::CannotInfer(self.name.symbol),
                    self.name.span,
                ));
            }
        };

        if ty.is_unit() {
            return Err(CompileError::new(
                CompileErrorKind::InvalidOperation {
                    usage: TypeUsage::Binding,
                    provided: ty,
                },
                span,
            ));
        }

        Ok(ty)
    }
}

impl Expression {
    /// Whether the value of the expression can be computed without running
    /// the program. Constant expressions never reference bindings.
    pub fn is_constant(&self) -> bool {
        match &self.kind {
            ExpressionKind::Literal(_) => true,
            ExpressionKind::Variable(_) | ExpressionKind::FunctionCall { .. } => false,
            ExpressionKind::Unary { operand, .. } => operand.is_constant(),
            ExpressionKind::Binary { lhs, rhs, .. }
            | ExpressionKind::LogicalAnd { lhs, rhs }
            | ExpressionKind::LogicalOr { lhs, rhs } => lhs.is_constant() && rhs.is_constant(),
        }
    }

    pub fn ty(&self, ctx: &FunctionContext) -> CompileResult<Type> {
        match &self.kind {
            ExpressionKind::Literal(literal) => Ok(literal.ty()),
            ExpressionKind::Variable(name) => Ok(ctx.lookup(name)?.ty),
            ExpressionKind::FunctionCall { target, arguments } => {
                let signature = ctx.signatures.lookup(target)?;

                if signature.parameters.len() != arguments.len() {
                    return Err(CompileError::new(
                        CompileErrorKind::ArgumentLengthMismatch {
                            expected: signature.parameters.len(),
                            actual: arguments.len(),
                        },
                        self.span,
                    ));
                }

                for (argument, expected) in arguments.iter().zip(&signature.parameters) {
                    let actual = argument.ty(ctx)?;

                    if actual != *expected {
                        return Err(CompileError::type_mismatch(
                            TypeBoundary::FunctionArgument,
                            *expected,
                            actual,
                            argument.span,
                        ));
                    }
                }

                Ok(signature.return_type)
            }
            ExpressionKind::Unary { operator, operand } => {
                let ty = operand.ty(ctx)?;

                let (valid, usage) = match operator {
                    UnaryOperatorKind::LogicalNot => (ty.is_bool(), TypeUsage::LogicalNot),
                    UnaryOperatorKind::Negate => (ty.is_numeric(), TypeUsage::Negation),
                };

                if !valid {
                    return Err(CompileError::new(
                        CompileErrorKind::InvalidOperation {
                            usage,
                            provided: ty,
                        },
                        self.span,
                    ));
                }

                Ok(ty)
            }
            ExpressionKind::Binary { operator, lhs, rhs } => {
                let lhs_type = lhs.ty(ctx)?;
                let rhs_type = rhs.ty(ctx)?;

                if lhs_type != rhs_type {
                    return Err(CompileError::type_mismatch(
                        TypeBoundary::BinaryOperation,
                        lhs_type,
                        rhs_type,
                        self.span,
                    ));
                }

                let (valid, usage, result) = match operator.class() {
                    BinaryOperatorClass::Arithmetic => (
                        lhs_type.is_numeric(),
                        TypeUsage::ArithmeticOperation,
                        lhs_type,
                    ),
                    BinaryOperatorClass::Comparison => (
                        lhs_type.is_numeric(),
                        TypeUsage::ComparisonOperation,
                        Type::Bool,
                    ),
                    BinaryOperatorClass::Equality => (
                        !lhs_type.is_unit(),
                        TypeUsage::EqualityOperation,
                        Type::Bool,
                    ),
                };

                if !valid {
                    return Err(CompileError::new(
                        CompileErrorKind::InvalidOperation {
                            usage,
                            provided: lhs_type,
                        },
                        self.span,
                    ));
                }

                Ok(result)
            }
            ExpressionKind::LogicalAnd { lhs, rhs } | ExpressionKind::LogicalOr { lhs, rhs } => {
                for operand in [lhs, rhs] {
                    let ty = operand.ty(ctx)?;

                    if !ty.is_bool() {
                        return Err(CompileError::type_mismatch(
                            TypeBoundary::LogicalOperand,
                            Type::Bool,
                            ty,
                            operand.span,
                        ));
                    }
                }

                Ok(Type::Bool)
            }
        }
    }
}

impl Literal {
    pub fn ty(&self) -> Type {
        match self {
            Literal::Bool(_) => Type::Bool,
            Literal::Integer(_) => Type::Int,
            Literal::Float(_) => Type::Float,
            Literal::String(_) => Type::Str,
        }
    }
}
