use std::fmt::Write;

use colored::Colorize;
use itertools::Itertools;

use crate::{index::Index, middle::lir};

pub fn pretty_print_lir(function: &lir::FunctionDefinition) -> String {
    let mut output = String::new();

    let arguments = function
        .arguments
        .iter()
        .map(|arg| format!("{arg}: {}", function.registers[*arg].ty.colored()))
        .join(", ");

    let _ = write!(
        output,
        "{} {}{}{}{}",
        "fn".magenta(),
        function.symbol_name.value().blue(),
        "(".white(),
        arguments,
        ")".white()
    );

    if !function.return_type.is_unit() {
        let _ = write!(output, " {} {}", "->".white(), function.return_type.colored());
    }

    let _ = writeln!(output, " {}", "{".white());

    for block in function.blocks.values() {
        let _ = write!(output, "{}", format!("{}:", block.id).bright_red());

        let mut notes = vec![block.label.to_string()];
        if !block.predecessors.is_empty() {
            notes.push(format!(
                "preds {}",
                block.predecessors.iter().map(|p| p.to_string()).join(", ")
            ));
        }
        let _ = writeln!(output, " {}", format!("; {}", notes.join(", ")).dimmed());

        for instruction in &block.instructions {
            let _ = writeln!(output, "    {instruction}");
        }
    }

    let _ = writeln!(output, "{}", "}".white());

    output
}

pub fn pretty_print_module(module: &lir::Module) -> String {
    module.lowered_functions().map(pretty_print_lir).join("\n")
}

impl core::fmt::Display for lir::Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            lir::Instruction::Move {
                destination,
                source,
            } => {
                write!(f, "{destination} {} {source}", "=".white())
            }
            lir::Instruction::UnaryOperation {
                operator,
                destination,
                operand,
            } => {
                write!(
                    f,
                    "{destination} {} {}{operand}",
                    "=".white(),
                    operator.to_string().white()
                )
            }
            lir::Instruction::BinaryOperation {
                operator,
                destination,
                lhs,
                rhs,
            } => {
                write!(
                    f,
                    "{destination} {} {lhs} {} {rhs}",
                    "=".white(),
                    operator.to_string().white()
                )
            }
            lir::Instruction::Branch {
                condition,
                positive,
                negative,
            } => {
                write!(
                    f,
                    "{} {condition} {} {}",
                    "br".cyan(),
                    positive.to_string().blue(),
                    negative.to_string().blue()
                )
            }
            lir::Instruction::Jump { destination } => {
                write!(f, "{} {}", "jmp".cyan(), destination.to_string().blue())
            }
            lir::Instruction::Return { value: Some(value) } => {
                write!(f, "{} {value}", "ret".cyan())
            }
            lir::Instruction::Return { value: None } => {
                write!(f, "{}", "ret".cyan())
            }
            lir::Instruction::FunctionCall {
                target,
                arguments,
                destination,
            } => {
                if let Some(dest) = destination {
                    write!(f, "{dest} {} ", "=".white())?;
                }

                write!(
                    f,
                    "{} {}({})",
                    "call".cyan(),
                    format!("@{}", target.index()).blue(),
                    arguments.iter().map(|op| op.to_string()).join(", ")
                )
            }
            lir::Instruction::Unreachable => write!(f, "{}", "unreachable".cyan()),
        }
    }
}

impl core::fmt::Display for lir::RegisterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", format!("%{}", self.index()).yellow())
    }
}

impl core::fmt::Display for lir::BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, ".block_{}", self.index())
    }
}

impl core::fmt::Display for lir::Immediate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            lir::Immediate::Unit => write!(f, "()"),
            lir::Immediate::Int(value) => write!(f, "{value}"),
            lir::Immediate::Float(value) => write!(f, "{value:?}"),
            lir::Immediate::Bool(value) => write!(f, "{value}"),
            lir::Immediate::Str(value) => write!(f, "{:?}", value.value()),
        }
    }
}

impl core::fmt::Display for lir::Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            lir::Operand::Immediate(immediate) => write!(f, "{}", immediate.to_string().purple()),
            lir::Operand::Register(register_id) => write!(f, "{register_id}"),
        }
    }
}
