//! Lowering of the optimized AST into LIR. Structured control flow becomes
//! labelled blocks joined by branches and jumps; expression trees are
//! flattened into operations on virtual registers.

use tracing::info;

use crate::{
    frontend::ast::{self, Block, Expression, ExpressionKind, Literal, Statement, StatementKind},
    middle::{
        context::{FunctionContext, SignatureTable},
        error::{CompileError, CompileErrorKind, CompileResult, TypeBoundary, TypeUsage},
        lir::{self, Immediate, Instruction, Operand, emitter::Emitter},
        ty::Type,
    },
};

impl Statement {
    pub fn lower(&self, emitter: &mut Emitter, ctx: &mut FunctionContext) -> CompileResult<()> {
        match &self.kind {
            StatementKind::If {
                condition,
                positive,
                negative,
            } => {
                let condition_type = condition.ty(ctx)?;
                if condition_type != Type::Bool {
                    return Err(CompileError::type_mismatch(
                        TypeBoundary::IfCondition,
                        Type::Bool,
                        condition_type,
                        condition.span,
                    ));
                }

                let Some(positive) = positive else {
                    return Err(CompileError::malformed(
                        "if statement has no then branch",
                        self.span,
                    ));
                };

                let condition = condition.lower(emitter, ctx)?;

                let function = ctx.function_handle(self.span)?;
                let then_block = emitter.create_block(function, "then");
                let else_block = negative
                    .as_ref()
                    .map(|_| emitter.create_block(function, "else"));
                let cont_block = emitter.create_block(function, "cont");

                emitter.branch(condition, then_block, else_block.unwrap_or(cont_block));

                emitter.set_insertion_cursor(then_block);
                positive.lower(emitter, ctx)?;
                if positive.return_type(ctx)?.is_none() {
                    emitter.jump(cont_block);
                }

                if let (Some(negative), Some(else_block)) = (negative, else_block) {
                    emitter.set_insertion_cursor(else_block);
                    negative.lower(emitter, ctx)?;
                    if negative.return_type(ctx)?.is_none() {
                        emitter.jump(cont_block);
                    }
                }

                // When both branches return, nothing jumps here and the block
                // is left for the CFG cleanup to remove
                emitter.set_insertion_cursor(cont_block);
            }
            StatementKind::Block(block) => block.lower(emitter, ctx)?,
            StatementKind::Let(local) => {
                let ty = local.resolve_type(ctx, self.span)?;

                // The initializer is evaluated before the name is bound, so it
                // can still refer to an earlier binding of the same name
                let value = local
                    .initializer
                    .as_ref()
                    .map(|initializer| initializer.lower(emitter, ctx))
                    .transpose()?;

                let binding = ctx.declare(&local.name, ty)?;
                let destination = match binding.register {
                    Some(register) => register,
                    None => {
                        let register = emitter.create_register(ty);
                        binding.register = Some(register);
                        register
                    }
                };

                if let Some(source) = value {
                    emitter.push_instruction(Instruction::Move {
                        destination,
                        source,
                    });
                }
            }
            StatementKind::Assign { target, value } => {
                let binding = *ctx.lookup(target)?;

                let value_type = value.ty(ctx)?;
                if value_type != binding.ty {
                    return Err(CompileError::type_mismatch(
                        TypeBoundary::Assignment,
                        binding.ty,
                        value_type,
                        value.span,
                    ));
                }

                let destination = binding_register(&binding, target.span)?;
                let source = value.lower(emitter, ctx)?;

                emitter.push_instruction(Instruction::Move {
                    destination,
                    source,
                });
            }
            StatementKind::Return(value) => {
                let value_type = match value {
                    Some(value) => value.ty(ctx)?,
                    None => Type::Unit,
                };

                if value_type != ctx.return_type {
                    return Err(CompileError::type_mismatch(
                        TypeBoundary::Return,
                        ctx.return_type,
                        value_type,
                        self.span,
                    ));
                }

                let value = value
                    .as_ref()
                    .map(|value| value.lower(emitter, ctx))
                    .transpose()?
                    .filter(|_| !value_type.is_unit());

                emitter.push_instruction(Instruction::Return { value });
            }
            StatementKind::While { condition, body } => {
                // .while_cond:
                //     %0 = %i < %n
                //     br %0 .while_body .while_end
                // .while_body:
                //     jmp .while_cond
                // .while_end:

                let condition_type = condition.ty(ctx)?;
                if condition_type != Type::Bool {
                    return Err(CompileError::type_mismatch(
                        TypeBoundary::WhileCondition,
                        Type::Bool,
                        condition_type,
                        condition.span,
                    ));
                }

                let function = ctx.function_handle(self.span)?;
                let condition_block = emitter.create_block(function, "while_cond");
                let body_block = emitter.create_block(function, "while_body");
                let end_block = emitter.create_block(function, "while_end");

                emitter.jump(condition_block);

                emitter.set_insertion_cursor(condition_block);
                let condition = condition.lower(emitter, ctx)?;
                emitter.branch(condition, body_block, end_block);

                emitter.set_insertion_cursor(body_block);
                body.lower(emitter, ctx)?;
                if body.return_type(ctx)?.is_none() {
                    emitter.jump(condition_block);
                }

                emitter.set_insertion_cursor(end_block);
            }
            StatementKind::Expression(expression) => {
                expression.lower(emitter, ctx)?;
            }
            StatementKind::Empty => {}
        }

        Ok(())
    }
}

impl Block {
    /// Lowers statements in order, with the block's locals bound in a scope
    /// of their own. Anything after a statement that always returns can
    /// never run and is not emitted.
    pub fn lower(&self, emitter: &mut Emitter, ctx: &mut FunctionContext) -> CompileResult<()> {
        ctx.push_scope();
        let result = self.lower_statements(emitter, ctx);
        ctx.pop_scope();

        result
    }

    fn lower_statements(&self, emitter: &mut Emitter, ctx: &mut FunctionContext) -> CompileResult<()> {
        for statement in &self.statements {
            statement.lower(emitter, ctx)?;

            if statement.return_type(ctx)?.is_some() {
                break;
            }
        }

        Ok(())
    }
}

impl Expression {
    /// Emits the instructions computing the expression and returns where its
    /// value can be found
    pub fn lower(&self, emitter: &mut Emitter, ctx: &mut FunctionContext) -> CompileResult<Operand> {
        match &self.kind {
            ExpressionKind::Literal(literal) => Ok(Operand::Immediate(literal.lower())),
            ExpressionKind::Variable(name) => {
                let binding = ctx.lookup(name)?;
                Ok(Operand::Register(binding_register(binding, name.span)?))
            }
            ExpressionKind::FunctionCall { target, arguments } => {
                let return_type = self.ty(ctx)?;

                let Some(function) = emitter.function_handle(target.symbol) else {
                    return Err(CompileError::new(
                        CompileErrorKind::UndefinedFunction(target.symbol),
                        target.span,
                    ));
                };

                let arguments = arguments
                    .iter()
                    .map(|argument| argument.lower(emitter, ctx))
                    .collect::<CompileResult<Vec<_>>>()?;

                let destination = (!return_type.is_unit()).then(|| emitter.create_register(return_type));

                emitter.push_instruction(Instruction::FunctionCall {
                    target: function,
                    arguments,
                    destination,
                });

                Ok(destination
                    .map(Operand::Register)
                    .unwrap_or(Operand::Immediate(Immediate::Unit)))
            }
            ExpressionKind::Unary { operator, operand } => {
                let ty = self.ty(ctx)?;
                let operand = operand.lower(emitter, ctx)?;
                let destination = emitter.create_register(ty);

                emitter.push_instruction(Instruction::UnaryOperation {
                    operator: *operator,
                    destination,
                    operand,
                });

                Ok(Operand::Register(destination))
            }
            ExpressionKind::Binary { operator, lhs, rhs } => {
                let ty = self.ty(ctx)?;
                let lhs = lhs.lower(emitter, ctx)?;
                let rhs = rhs.lower(emitter, ctx)?;
                let destination = emitter.create_register(ty);

                emitter.push_instruction(Instruction::BinaryOperation {
                    operator: *operator,
                    destination,
                    lhs,
                    rhs,
                });

                Ok(Operand::Register(destination))
            }
            ExpressionKind::LogicalAnd { lhs, rhs } => {
                self.ty(ctx)?;
                self.lower_short_circuit(emitter, ctx, lhs, rhs, ShortCircuit::And)
            }
            ExpressionKind::LogicalOr { lhs, rhs } => {
                self.ty(ctx)?;
                self.lower_short_circuit(emitter, ctx, lhs, rhs, ShortCircuit::Or)
            }
        }
    }

    /// `lhs && rhs` and `lhs || rhs`. The result register holds `lhs` unless
    /// control reaches the block evaluating `rhs`, which overwrites it.
    ///
    /// ```text
    ///     %r = lhs
    ///     br %r .and_rhs .and_end
    /// .and_rhs:
    ///     %r = rhs
    ///     jmp .and_end
    /// .and_end:
    /// ```
    fn lower_short_circuit(
        &self,
        emitter: &mut Emitter,
        ctx: &mut FunctionContext,
        lhs: &Expression,
        rhs: &Expression,
        kind: ShortCircuit,
    ) -> CompileResult<Operand> {
        let result = emitter.create_register(Type::Bool);

        let lhs = lhs.lower(emitter, ctx)?;
        emitter.push_instruction(Instruction::Move {
            destination: result,
            source: lhs,
        });

        let function = ctx.function_handle(self.span)?;
        let (rhs_label, end_label) = match kind {
            ShortCircuit::And => ("and_rhs", "and_end"),
            ShortCircuit::Or => ("or_rhs", "or_end"),
        };
        let rhs_block = emitter.create_block(function, rhs_label);
        let end_block = emitter.create_block(function, end_label);

        match kind {
            ShortCircuit::And => emitter.branch(lhs, rhs_block, end_block),
            ShortCircuit::Or => emitter.branch(lhs, end_block, rhs_block),
        }

        emitter.set_insertion_cursor(rhs_block);
        let rhs = rhs.lower(emitter, ctx)?;
        emitter.push_instruction(Instruction::Move {
            destination: result,
            source: rhs,
        });
        emitter.jump(end_block);

        emitter.set_insertion_cursor(end_block);

        Ok(Operand::Register(result))
    }
}

#[derive(Debug, Clone, Copy)]
enum ShortCircuit {
    And,
    Or,
}

impl Literal {
    pub fn lower(&self) -> Immediate {
        match *self {
            Literal::Bool(value) => Immediate::Bool(value),
            Literal::Integer(value) => Immediate::Int(value),
            Literal::Float(value) => Immediate::Float(value),
            Literal::String(value) => Immediate::Str(value),
        }
    }
}

fn binding_register(
    binding: &crate::middle::context::Binding,
    span: crate::frontend::lexer::Span,
) -> CompileResult<lir::RegisterId> {
    binding
        .register
        .ok_or_else(|| CompileError::malformed("binding was never given a register", span))
}

/// Lowers a single function definition. The signature table must contain
/// the function, and every function it calls.
pub fn lower_function(
    function: &ast::FunctionDefinition,
    signatures: &SignatureTable,
) -> CompileResult<lir::FunctionDefinition> {
    let signature = &function.signature;
    let mut ctx = FunctionContext::for_function(function, signatures);

    let Some(id) = signatures.function_handle(signature.name.symbol) else {
        return Err(CompileError::new(
            CompileErrorKind::UndefinedFunction(signature.name.symbol),
            signature.name.span,
        ));
    };
    ctx.set_function_handle(id);

    info!(function = %signature.name.symbol, "lowering function");

    let mut emitter = Emitter::new(signatures, id, signature.name.symbol, signature.return_type);
    let entry = emitter.create_block(id, "entry");
    emitter.set_insertion_cursor(entry);

    for parameter in &signature.parameters {
        if parameter.ty.is_unit() {
            return Err(CompileError::new(
                CompileErrorKind::InvalidOperation {
                    usage: TypeUsage::Binding,
                    provided: parameter.ty,
                },
                parameter.span,
            ));
        }

        let register = emitter.create_argument(parameter.ty);
        ctx.declare(&parameter.name, parameter.ty)?.register = Some(register);
    }

    // Branch and return types are checked for the whole body before anything
    // of it is emitted
    let body_return_type = function.body.return_type(&mut ctx)?;

    function.body.lower(&mut emitter, &mut ctx)?;

    if !emitter.is_terminated() {
        let terminator = if signature.return_type.is_unit() {
            Instruction::Return { value: None }
        } else if body_return_type.is_none() {
            return Err(CompileError::new(
                CompileErrorKind::MissingReturn {
                    expected: signature.return_type,
                },
                signature.span,
            ));
        } else {
            Instruction::Unreachable
        };

        emitter.push_instruction(terminator);
    }

    Ok(emitter.finish())
}
