//! Tree rendering of statements and expressions for diagnostics. Every node
//! prints its own line and then its children, each prefixed with `├──`, or
//! `└──` for the last child.

use colored::Colorize;

use super::{
    Expression, ExpressionKind, FunctionDefinition, Literal, Module, Statement, StatementKind,
};

enum Child<'a> {
    Statement(&'a str, &'a Statement),
    Expression(&'a str, &'a Expression),
}

fn describe_children(prefix: &str, children: &[Child]) -> String {
    let mut output = String::new();

    for (i, child) in children.iter().enumerate() {
        let last = i == children.len() - 1;
        let (connector, extension) = if last {
            ("└── ", "    ")
        } else {
            ("├── ", "│   ")
        };
        let child_prefix = format!("{prefix}{extension}");

        let (role, rendered) = match child {
            Child::Statement(role, statement) => (role, statement.describe(&child_prefix)),
            Child::Expression(role, expression) => (role, expression.describe(&child_prefix)),
        };

        output.push_str(prefix);
        output.push_str(connector);
        if !role.is_empty() {
            output.push_str(&format!("{} ", format!("{role}:").dimmed()));
        }
        output.push_str(&rendered);
    }

    output
}

impl Module {
    pub fn describe(&self) -> String {
        self.functions.iter().map(FunctionDefinition::describe).collect()
    }
}

impl FunctionDefinition {
    pub fn describe(&self) -> String {
        let parameters = self
            .signature
            .parameters
            .iter()
            .map(|p| format!("{}: {}", p.name.symbol, p.ty.colored()))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "{} {}({}) -> {}\n{}",
            "Function".magenta(),
            self.signature.name.symbol.to_string().blue(),
            parameters,
            self.signature.return_type.colored(),
            describe_children("", &[Child::Statement("", &self.body)])
        )
    }
}

impl Statement {
    /// Renders this statement and everything below it. `prefix` is the
    /// indentation inherited from the parent's connectors.
    pub fn describe(&self, prefix: &str) -> String {
        match &self.kind {
            StatementKind::If {
                condition,
                positive,
                negative,
            } => {
                let mut children = vec![Child::Expression("condition", condition)];
                if let Some(positive) = positive {
                    children.push(Child::Statement("then", positive));
                }
                if let Some(negative) = negative {
                    children.push(Child::Statement("else", negative));
                }

                format!("{}\n{}", "If".magenta(), describe_children(prefix, &children))
            }
            StatementKind::Block(block) => {
                let children = block
                    .statements
                    .iter()
                    .map(|s| Child::Statement("", s))
                    .collect::<Vec<_>>();

                format!("{}\n{}", "Block".magenta(), describe_children(prefix, &children))
            }
            StatementKind::Let(local) => {
                let ty = local
                    .ty
                    .map(|ty| format!(": {}", ty.colored()))
                    .unwrap_or_default();
                let children = local
                    .initializer
                    .iter()
                    .map(|i| Child::Expression("value", i))
                    .collect::<Vec<_>>();

                format!(
                    "{} {}{ty}\n{}",
                    "Let".magenta(),
                    local.name.symbol.to_string().blue(),
                    describe_children(prefix, &children)
                )
            }
            StatementKind::Assign { target, value } => format!(
                "{} {}\n{}",
                "Assign".magenta(),
                target.symbol.to_string().blue(),
                describe_children(prefix, &[Child::Expression("value", value)])
            ),
            StatementKind::Return(value) => {
                let children = value
                    .iter()
                    .map(|v| Child::Expression("", v))
                    .collect::<Vec<_>>();

                format!("{}\n{}", "Return".magenta(), describe_children(prefix, &children))
            }
            StatementKind::While { condition, body } => format!(
                "{}\n{}",
                "While".magenta(),
                describe_children(
                    prefix,
                    &[
                        Child::Expression("condition", condition),
                        Child::Statement("body", body),
                    ]
                )
            ),
            StatementKind::Expression(expression) => format!(
                "{}\n{}",
                "Expression".magenta(),
                describe_children(prefix, &[Child::Expression("", expression)])
            ),
            StatementKind::Empty => format!("{}\n", "Empty".magenta()),
        }
    }
}

impl Expression {
    pub fn describe(&self, prefix: &str) -> String {
        match &self.kind {
            ExpressionKind::Literal(literal) => format!("{}\n", describe_literal(literal)),
            ExpressionKind::Variable(name) => format!("{}\n", name.symbol.to_string().blue()),
            ExpressionKind::FunctionCall { target, arguments } => {
                let children = arguments
                    .iter()
                    .map(|a| Child::Expression("", a))
                    .collect::<Vec<_>>();

                format!(
                    "{} {}\n{}",
                    "Call".cyan(),
                    target.symbol.to_string().blue(),
                    describe_children(prefix, &children)
                )
            }
            ExpressionKind::Unary { operator, operand } => format!(
                "{} {}\n{}",
                "Unary".cyan(),
                operator.to_string().white(),
                describe_children(prefix, &[Child::Expression("", operand)])
            ),
            ExpressionKind::Binary { operator, lhs, rhs } => format!(
                "{} {}\n{}",
                "Binary".cyan(),
                operator.to_string().white(),
                describe_children(
                    prefix,
                    &[Child::Expression("", lhs), Child::Expression("", rhs)]
                )
            ),
            ExpressionKind::LogicalAnd { lhs, rhs } => format!(
                "{}\n{}",
                "LogicalAnd".cyan(),
                describe_children(
                    prefix,
                    &[Child::Expression("", lhs), Child::Expression("", rhs)]
                )
            ),
            ExpressionKind::LogicalOr { lhs, rhs } => format!(
                "{}\n{}",
                "LogicalOr".cyan(),
                describe_children(
                    prefix,
                    &[Child::Expression("", lhs), Child::Expression("", rhs)]
                )
            ),
        }
    }
}

fn describe_literal(literal: &Literal) -> String {
    match literal {
        Literal::Bool(value) => value.to_string().purple().to_string(),
        Literal::Integer(value) => value.to_string().purple().to_string(),
        Literal::Float(value) => format!("{value:?}").purple().to_string(),
        Literal::String(value) => format!("{:?}", value.value()).purple().to_string(),
    }
}
