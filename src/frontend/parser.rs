use colored::Colorize;
use itertools::{PeekNth, peek_nth};
use thiserror::Error;

use super::intern::InternedSymbol;
use crate::{
    frontend::{
        SourceFile,
        ast::{
            BinaryOperatorKind, Block, Expression, ExpressionKind, FunctionDefinition,
            FunctionParameter, FunctionSignature, Identifier, Literal, Local, Module, Statement,
            StatementKind, UnaryOperatorKind,
        },
        lexer::{Keyword, Lexer, Span, Token, TokenKind},
    },
    middle::ty::Type,
};

pub type ParseResult<T> = Result<T, ParseError>;

/// A lexing or parsing error. Parsing stops at the first one.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl ParseError {
    pub fn new(span: Span, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }

    pub fn report(&self, source_file: &SourceFile) -> String {
        format!(
            "{}: {} {}\n{}",
            "error".red(),
            self.message,
            format!("(at {})", source_file.format_span_position(self.span)).white(),
            source_file.highlight_span(self.span)
        )
    }
}

#[derive(Debug)]
pub struct Parser<'source> {
    source: &'source SourceFile,
    tokens: PeekNth<std::vec::IntoIter<Token>>,
}

impl<'source> Parser<'source> {
    pub fn parse_module(source_file: &'source SourceFile) -> ParseResult<Module> {
        let mut parser = Self {
            source: source_file,
            tokens: peek_nth(Lexer::tokenize(source_file)?),
        };

        let mut module = Module {
            functions: Vec::new(),
        };

        while let Some(peeked) = parser.peek() {
            match peeked.kind {
                TokenKind::Keyword(Keyword::Fn) => {
                    module.functions.push(parser.parse_function_definition()?)
                }
                _ => {
                    return Err(ParseError::new(
                        peeked.span,
                        format!(
                            "Expected function definition in module but found: {}",
                            parser.source.value_of_span(peeked.span)
                        ),
                    ));
                }
            }
        }

        Ok(module)
    }

    fn peek(&mut self) -> Option<Token> {
        self.tokens.peek().copied()
    }

    fn peek_is(&mut self, kind: TokenKind) -> bool {
        self.peek().is_some_and(|t| t.kind == kind)
    }

    fn end_of_file(&self, expecting: &str) -> ParseError {
        let end = self.source.contents.len();

        ParseError::new(
            Span::new(end.saturating_sub(1), end),
            format!("Expected {expecting} but reached end of file"),
        )
    }

    fn expect_peek(&mut self, expecting: &str) -> ParseResult<Token> {
        match self.peek() {
            Some(token) => Ok(token),
            None => Err(self.end_of_file(expecting)),
        }
    }

    fn expect_next(&mut self, expecting: &str) -> ParseResult<Token> {
        match self.tokens.next() {
            Some(token) => Ok(token),
            None => Err(self.end_of_file(expecting)),
        }
    }

    fn expect_next_to_be(&mut self, kind: TokenKind) -> ParseResult<Token> {
        let token = self.expect_next(&describe_token_kind(kind))?;

        if token.kind != kind {
            return Err(ParseError::new(
                token.span,
                format!(
                    "Expected {} but found `{}`",
                    describe_token_kind(kind),
                    self.source.value_of_span(token.span)
                ),
            ));
        }

        Ok(token)
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> ParseResult<Token> {
        self.expect_next_to_be(TokenKind::Keyword(keyword))
    }

    /// fn name(param: ty) -> return_type {}
    fn parse_function_definition(&mut self) -> ParseResult<FunctionDefinition> {
        let fn_keyword = self.expect_keyword(Keyword::Fn)?;

        let signature = self.parse_function_signature()?;
        let body = self.parse_block()?;

        Ok(FunctionDefinition {
            span: fn_keyword.span.to(body.span),
            signature,
            body,
        })
    }

    /// name(param: ty) -> return_type
    fn parse_function_signature(&mut self) -> ParseResult<FunctionSignature> {
        let name = self.parse_identifier()?;

        self.expect_next_to_be(TokenKind::OpenParen)?;

        let mut parameters = Vec::new();
        while !self.peek_is(TokenKind::CloseParen) {
            parameters.push(self.parse_function_parameter()?);

            if !self.peek_is(TokenKind::Comma) {
                break;
            }
            self.expect_next_to_be(TokenKind::Comma)?;
        }

        let close_paren = self.expect_next_to_be(TokenKind::CloseParen)?;

        let (return_type, end) = if self.peek_is(TokenKind::Arrow) {
            self.expect_next_to_be(TokenKind::Arrow)?;
            self.parse_type()?
        } else {
            (Type::Unit, close_paren.span)
        };

        Ok(FunctionSignature {
            span: name.span.to(end),
            name,
            parameters,
            return_type,
        })
    }

    // name: ty
    fn parse_function_parameter(&mut self) -> ParseResult<FunctionParameter> {
        let name = self.parse_identifier()?;
        self.expect_next_to_be(TokenKind::Colon)?;
        let (ty, end) = self.parse_type()?;

        Ok(FunctionParameter {
            span: name.span.to(end),
            name,
            ty,
        })
    }

    // main
    fn parse_identifier(&mut self) -> ParseResult<Identifier> {
        let token = self.expect_next_to_be(TokenKind::Identifier)?;

        Ok(Identifier {
            span: token.span,
            symbol: InternedSymbol::new(self.source.value_of_span(token.span)),
        })
    }

    /// Parses a type, also returning the span it was written at
    fn parse_type(&mut self) -> ParseResult<(Type, Span)> {
        let token = self.expect_next("type")?;

        match token.kind {
            TokenKind::OpenParen => {
                let close_paren = self.expect_next_to_be(TokenKind::CloseParen)?;
                Ok((Type::Unit, token.span.to(close_paren.span)))
            }
            TokenKind::Identifier => {
                let name = self.source.value_of_span(token.span);

                name.parse::<Type>()
                    .map(|ty| (ty, token.span))
                    .map_err(|_| ParseError::new(token.span, format!("Unknown type `{name}`")))
            }
            _ => Err(ParseError::new(
                token.span,
                format!(
                    "Expected type but found `{}`",
                    self.source.value_of_span(token.span)
                ),
            )),
        }
    }

    // { statement* }
    fn parse_block(&mut self) -> ParseResult<Statement> {
        let open_brace = self.expect_next_to_be(TokenKind::OpenBrace)?;

        let mut statements = Vec::new();
        while self.expect_peek("statement or closing brace")?.kind != TokenKind::CloseBrace {
            statements.push(self.parse_statement()?);
        }

        let close_brace = self.expect_next_to_be(TokenKind::CloseBrace)?;

        Ok(Statement::new(
            open_brace.span.to(close_brace.span),
            StatementKind::Block(Block { statements }),
        ))
    }

    fn parse_statement(&mut self) -> ParseResult<Statement> {
        let peeked = self.expect_peek("statement")?;

        match peeked.kind {
            TokenKind::Semicolon => {
                self.expect_next_to_be(TokenKind::Semicolon)?;
                Ok(Statement::empty(peeked.span))
            }
            TokenKind::OpenBrace => self.parse_block(),
            TokenKind::Keyword(Keyword::Let) => self.parse_local(),
            TokenKind::Keyword(Keyword::If) => self.parse_if_statement(),
            TokenKind::Keyword(Keyword::While) => self.parse_while_statement(),
            TokenKind::Keyword(Keyword::Return) => self.parse_return_statement(),
            TokenKind::Identifier
                if self
                    .tokens
                    .peek_nth(1)
                    .is_some_and(|t| t.kind == TokenKind::Equals) =>
            {
                self.parse_assignment()
            }
            _ => {
                let expression = self.parse_expression()?;
                let semicolon = self.expect_next_to_be(TokenKind::Semicolon)?;

                Ok(Statement::new(
                    expression.span.to(semicolon.span),
                    StatementKind::Expression(expression),
                ))
            }
        }
    }

    // let x: ty = value;
    fn parse_local(&mut self) -> ParseResult<Statement> {
        let let_keyword = self.expect_keyword(Keyword::Let)?;
        let name = self.parse_identifier()?;

        let ty = if self.peek_is(TokenKind::Colon) {
            self.expect_next_to_be(TokenKind::Colon)?;
            Some(self.parse_type()?.0)
        } else {
            None
        };

        let initializer = if self.peek_is(TokenKind::Equals) {
            self.expect_next_to_be(TokenKind::Equals)?;
            Some(self.parse_expression()?)
        } else {
            None
        };

        let semicolon = self.expect_next_to_be(TokenKind::Semicolon)?;

        Ok(Statement::new(
            let_keyword.span.to(semicolon.span),
            StatementKind::Let(Box::new(Local {
                name,
                ty,
                initializer,
            })),
        ))
    }

    // x = value;
    fn parse_assignment(&mut self) -> ParseResult<Statement> {
        let target = self.parse_identifier()?;
        self.expect_next_to_be(TokenKind::Equals)?;
        let value = self.parse_expression()?;
        let semicolon = self.expect_next_to_be(TokenKind::Semicolon)?;

        Ok(Statement::new(
            target.span.to(semicolon.span),
            StatementKind::Assign { target, value },
        ))
    }

    // if condition { ... } else if condition { ... } else { ... }
    fn parse_if_statement(&mut self) -> ParseResult<Statement> {
        let if_keyword = self.expect_keyword(Keyword::If)?;

        let condition = self.parse_expression()?;
        let positive = self.parse_block()?;
        let mut span = if_keyword.span.to(positive.span);

        let negative = if self.peek_is(TokenKind::Keyword(Keyword::Else)) {
            self.expect_keyword(Keyword::Else)?;

            let negative = if self.peek_is(TokenKind::Keyword(Keyword::If)) {
                self.parse_if_statement()?
            } else {
                self.parse_block()?
            };

            span = span.to(negative.span);
            Some(Box::new(negative))
        } else {
            None
        };

        Ok(Statement::new(
            span,
            StatementKind::If {
                condition,
                positive: Some(Box::new(positive)),
                negative,
            },
        ))
    }

    // while condition { ... }
    fn parse_while_statement(&mut self) -> ParseResult<Statement> {
        let while_keyword = self.expect_keyword(Keyword::While)?;

        let condition = self.parse_expression()?;
        let body = self.parse_block()?;

        Ok(Statement::new(
            while_keyword.span.to(body.span),
            StatementKind::While {
                condition,
                body: Box::new(body),
            },
        ))
    }

    // return value;
    fn parse_return_statement(&mut self) -> ParseResult<Statement> {
        let return_keyword = self.expect_keyword(Keyword::Return)?;

        let value = if self.peek_is(TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };

        let semicolon = self.expect_next_to_be(TokenKind::Semicolon)?;

        Ok(Statement::new(
            return_keyword.span.to(semicolon.span),
            StatementKind::Return(value),
        ))
    }

    fn parse_expression(&mut self) -> ParseResult<Expression> {
        self.parse_logical_or_expression()
    }

    fn parse_logical_or_expression(&mut self) -> ParseResult<Expression> {
        let mut expression = self.parse_logical_and_expression()?;

        while self.peek_is(TokenKind::LogicalOr) {
            self.expect_next_to_be(TokenKind::LogicalOr)?;
            let rhs = self.parse_logical_and_expression()?;

            expression = Expression::new(
                expression.span.to(rhs.span),
                ExpressionKind::LogicalOr {
                    lhs: Box::new(expression),
                    rhs: Box::new(rhs),
                },
            );
        }

        Ok(expression)
    }

    fn parse_logical_and_expression(&mut self) -> ParseResult<Expression> {
        let mut expression = self.parse_comparison_expression()?;

        while self.peek_is(TokenKind::LogicalAnd) {
            self.expect_next_to_be(TokenKind::LogicalAnd)?;
            let rhs = self.parse_comparison_expression()?;

            expression = Expression::new(
                expression.span.to(rhs.span),
                ExpressionKind::LogicalAnd {
                    lhs: Box::new(expression),
                    rhs: Box::new(rhs),
                },
            );
        }

        Ok(expression)
    }

    fn parse_comparison_expression(&mut self) -> ParseResult<Expression> {
        let mut expression = self.parse_term_expression()?;

        while self.peek().is_some_and(|t| t.kind.is_comparison_operator()) {
            let operator = self.parse_binary_operator("comparison operator")?;
            let rhs = self.parse_term_expression()?;

            expression = binary(operator, expression, rhs);
        }

        Ok(expression)
    }

    fn parse_term_expression(&mut self) -> ParseResult<Expression> {
        let mut expression = self.parse_factor_expression()?;

        while self.peek().is_some_and(|t| t.kind.is_term_operator()) {
            let operator = self.parse_binary_operator("term operator")?;
            let rhs = self.parse_factor_expression()?;

            expression = binary(operator, expression, rhs);
        }

        Ok(expression)
    }

    fn parse_factor_expression(&mut self) -> ParseResult<Expression> {
        let mut expression = self.parse_unary_expression()?;

        while self.peek().is_some_and(|t| t.kind.is_factor_operator()) {
            let operator = self.parse_binary_operator("factor operator")?;
            let rhs = self.parse_unary_expression()?;

            expression = binary(operator, expression, rhs);
        }

        Ok(expression)
    }

    fn parse_binary_operator(&mut self, expecting: &str) -> ParseResult<BinaryOperatorKind> {
        let operator = self.expect_next(expecting)?;

        Ok(match operator.kind {
            TokenKind::Plus => BinaryOperatorKind::Add,
            TokenKind::Minus => BinaryOperatorKind::Subtract,
            TokenKind::Asterisk => BinaryOperatorKind::Multiply,
            TokenKind::Divide => BinaryOperatorKind::Divide,
            TokenKind::Modulus => BinaryOperatorKind::Modulus,
            TokenKind::DoubleEquals => BinaryOperatorKind::Equals,
            TokenKind::NotEquals => BinaryOperatorKind::NotEquals,
            TokenKind::LessThan => BinaryOperatorKind::LessThan,
            TokenKind::LessThanOrEqualTo => BinaryOperatorKind::LessThanOrEqualTo,
            TokenKind::GreaterThan => BinaryOperatorKind::GreaterThan,
            TokenKind::GreaterThanOrEqualTo => BinaryOperatorKind::GreaterThanOrEqualTo,
            _ => {
                return Err(ParseError::new(
                    operator.span,
                    format!("Expected {expecting}"),
                ));
            }
        })
    }

    fn parse_unary_expression(&mut self) -> ParseResult<Expression> {
        let peeked = self.expect_peek("expression")?;

        if !peeked.kind.is_unary_operator() {
            return self.parse_function_call_expression();
        }

        self.expect_next("unary operator")?;
        let operator = match peeked.kind {
            TokenKind::Bang => UnaryOperatorKind::LogicalNot,
            _ => UnaryOperatorKind::Negate,
        };
        let operand = self.parse_unary_expression()?;

        Ok(Expression::new(
            peeked.span.to(operand.span),
            ExpressionKind::Unary {
                operator,
                operand: Box::new(operand),
            },
        ))
    }

    // foo(a, b)
    fn parse_function_call_expression(&mut self) -> ParseResult<Expression> {
        let is_call = self.peek_is(TokenKind::Identifier)
            && self
                .tokens
                .peek_nth(1)
                .is_some_and(|t| t.kind == TokenKind::OpenParen);

        if !is_call {
            return self.parse_atomic_expression();
        }

        let target = self.parse_identifier()?;
        self.expect_next_to_be(TokenKind::OpenParen)?;

        let mut arguments = Vec::new();
        while !self.peek_is(TokenKind::CloseParen) {
            arguments.push(self.parse_expression()?);

            if !self.peek_is(TokenKind::Comma) {
                break;
            }
            self.expect_next_to_be(TokenKind::Comma)?;
        }

        let close_paren = self.expect_next_to_be(TokenKind::CloseParen)?;

        Ok(Expression::new(
            target.span.to(close_paren.span),
            ExpressionKind::FunctionCall { target, arguments },
        ))
    }

    fn parse_atomic_expression(&mut self) -> ParseResult<Expression> {
        let peeked = self.expect_peek("expression")?;

        match peeked.kind {
            TokenKind::OpenParen => self.parse_grouping_expression(),
            TokenKind::Identifier => {
                let identifier = self.parse_identifier()?;
                Ok(Expression::new(
                    identifier.span,
                    ExpressionKind::Variable(identifier),
                ))
            }
            TokenKind::BooleanLiteral
            | TokenKind::IntegerLiteral
            | TokenKind::FloatLiteral
            | TokenKind::StringLiteral => self.parse_literal(),
            _ => Err(ParseError::new(
                peeked.span,
                format!(
                    "Expected expression but found `{}`",
                    self.source.value_of_span(peeked.span)
                ),
            )),
        }
    }

    // (expression)
    fn parse_grouping_expression(&mut self) -> ParseResult<Expression> {
        let open_paren = self.expect_next_to_be(TokenKind::OpenParen)?;
        let inner = self.parse_expression()?;
        let close_paren = self.expect_next_to_be(TokenKind::CloseParen)?;

        Ok(Expression::new(open_paren.span.to(close_paren.span), inner.kind))
    }

    fn parse_literal(&mut self) -> ParseResult<Expression> {
        let token = self.expect_next("literal")?;
        let value = self.source.value_of_span(token.span);

        let literal = match token.kind {
            TokenKind::BooleanLiteral => Literal::Bool(value == "true"),
            TokenKind::IntegerLiteral => Literal::Integer(value.parse().map_err(|_| {
                ParseError::new(token.span, "Integer literal does not fit in 64 bits")
            })?),
            TokenKind::FloatLiteral => Literal::Float(
                value
                    .parse()
                    .map_err(|_| ParseError::new(token.span, "Invalid float literal"))?,
            ),
            TokenKind::StringLiteral => Literal::String(InternedSymbol::new(&unescape_string(
                &value[1..value.len() - 1],
            ))),
            _ => {
                return Err(ParseError::new(
                    token.span,
                    format!("Expected literal but found `{value}`"),
                ));
            }
        };

        Ok(Expression::literal(token.span, literal))
    }
}

fn binary(operator: BinaryOperatorKind, lhs: Expression, rhs: Expression) -> Expression {
    Expression::new(
        lhs.span.to(rhs.span),
        ExpressionKind::Binary {
            operator,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
    )
}

fn unescape_string(raw: &str) -> String {
    let mut output = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            output.push(c);
            continue;
        }

        match chars.next() {
            Some('n') => output.push('\n'),
            Some('t') => output.push('\t'),
            Some(other) => output.push(other),
            None => output.push('\\'),
        }
    }

    output
}

fn describe_token_kind(kind: TokenKind) -> String {
    match kind {
        TokenKind::Keyword(keyword) => format!("`{}` keyword", format!("{keyword:?}").to_lowercase()),
        TokenKind::Identifier => "identifier".to_string(),
        TokenKind::OpenParen => "`(`".to_string(),
        TokenKind::CloseParen => "`)`".to_string(),
        TokenKind::OpenBrace => "`{`".to_string(),
        TokenKind::CloseBrace => "`}`".to_string(),
        TokenKind::Semicolon => "`;`".to_string(),
        TokenKind::Comma => "`,`".to_string(),
        TokenKind::Colon => "`:`".to_string(),
        TokenKind::Arrow => "`->`".to_string(),
        TokenKind::Equals => "`=`".to_string(),
        TokenKind::LogicalAnd => "`&&`".to_string(),
        TokenKind::LogicalOr => "`||`".to_string(),
        other => format!("{other:?}"),
    }
}
