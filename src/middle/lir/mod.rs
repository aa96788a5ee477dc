//! LIR (Low-level Intermediate Representation). In this form, conditionals
//! and loops are simplified to labelled blocks and jumps, and expression trees
//! are flattened into sequences of operations on virtual registers.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    frontend::{
        ast::{BinaryOperatorKind, UnaryOperatorKind},
        intern::InternedSymbol,
    },
    index::{Index, IndexVec, simple_index},
    middle::ty::Type,
};

pub mod ast_lowering;
pub mod emitter;
pub mod pretty_print;

#[cfg(test)]
mod ast_lowering_tests;

#[derive(Debug, Default)]
pub struct Module {
    pub functions: IndexVec<FunctionId, Option<FunctionDefinition>>,
}

impl Module {
    /// Creates a module with an empty slot for every declared function
    pub fn with_capacity(function_count: usize) -> Self {
        Self {
            functions: IndexVec::from_raw((0..function_count).map(|_| None).collect()),
        }
    }

    /// Installs a lowered function into its slot
    pub fn install(&mut self, function: FunctionDefinition) {
        let id = function.id;

        while self.functions.len() <= id.index() {
            self.functions.push(None);
        }

        self.functions[id] = Some(function);
    }

    pub fn function(&self, id: FunctionId) -> Option<&FunctionDefinition> {
        self.functions.get(id).and_then(Option::as_ref)
    }

    pub fn lowered_functions(&self) -> impl Iterator<Item = &FunctionDefinition> {
        self.functions.iter().flatten()
    }
}

simple_index! {
    /// Identifies a function within a module. This is the lowered handle of
    /// a function that blocks get created in.
    pub struct FunctionId;
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDefinition {
    pub id: FunctionId,
    pub symbol_name: InternedSymbol,
    pub return_type: Type,
    /// Allocated virtual registers used to store temporary data and locals
    pub registers: IndexVec<RegisterId, Register>,
    pub arguments: Vec<RegisterId>,
    pub blocks: BTreeMap<BlockId, Block>,
}

impl FunctionDefinition {
    /// Every instruction of the function in block order
    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.blocks.values().flat_map(|b| b.instructions.iter())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: BlockId,
    /// Describes what the block was created for (`then`, `cont`, ...)
    pub label: &'static str,
    pub instructions: Vec<Instruction>,
    pub predecessors: BTreeSet<BlockId>,
}

impl Block {
    pub fn is_terminated(&self) -> bool {
        self.instructions.last().is_some_and(Instruction::is_terminator)
    }

    /// Blocks this block may transfer control to
    pub fn successors(&self) -> Vec<BlockId> {
        match self.instructions.last() {
            Some(Instruction::Branch {
                positive, negative, ..
            }) => vec![*positive, *negative],
            Some(Instruction::Jump { destination }) => vec![*destination],
            _ => Vec::new(),
        }
    }
}

simple_index! {
    /// Identifies an LIR block
    pub struct BlockId;
}

impl BlockId {
    pub const ZERO: Self = Self(0);
}

/// A temporary virtual register holding a value of some type
#[derive(Debug, Clone, PartialEq, Hash)]
pub struct Register {
    pub id: RegisterId,
    pub ty: Type,
}

simple_index! {
    /// Identifies a virtual LIR register which holds a temporary value
    pub struct RegisterId;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Move {
        destination: RegisterId,
        source: Operand,
    },
    UnaryOperation {
        operator: UnaryOperatorKind,
        destination: RegisterId,
        operand: Operand,
    },
    BinaryOperation {
        operator: BinaryOperatorKind,
        destination: RegisterId,
        lhs: Operand,
        rhs: Operand,
    },
    Branch {
        condition: Operand,
        positive: BlockId,
        negative: BlockId,
    },
    Jump {
        destination: BlockId,
    },
    Return {
        value: Option<Operand>,
    },
    FunctionCall {
        target: FunctionId,
        arguments: Vec<Operand>,
        destination: Option<RegisterId>,
    },
    /// Terminates a block control can never reach
    Unreachable,
}

impl Instruction {
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Self::Branch { .. } | Self::Jump { .. } | Self::Return { .. } | Self::Unreachable
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Immediate {
    Unit,
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(InternedSymbol),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    Immediate(Immediate),
    Register(RegisterId),
}
