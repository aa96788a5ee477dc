use std::collections::BTreeSet;

use tracing::trace;

use crate::{
    frontend::intern::InternedSymbol,
    index::IndexVec,
    middle::{
        context::SignatureTable,
        lir::{self, BlockId, FunctionId, Instruction, Operand, RegisterId},
        ty::Type,
    },
};

/// Builds the blocks of a single LIR function. Instructions are appended to
/// the block under the insertion cursor; branches and jumps keep the
/// predecessor sets of their targets up to date.
#[derive(Debug)]
pub struct Emitter<'m> {
    signatures: &'m SignatureTable,
    id: FunctionId,
    symbol_name: InternedSymbol,
    return_type: Type,

    registers: IndexVec<RegisterId, lir::Register>,
    arguments: Vec<RegisterId>,

    blocks: IndexVec<BlockId, lir::Block>,
    cursor: BlockId,
}

impl<'m> Emitter<'m> {
    pub fn new(
        signatures: &'m SignatureTable,
        id: FunctionId,
        symbol_name: InternedSymbol,
        return_type: Type,
    ) -> Self {
        Self {
            signatures,
            id,
            symbol_name,
            return_type,
            registers: IndexVec::new(),
            arguments: Vec::new(),
            blocks: IndexVec::new(),
            cursor: BlockId::ZERO,
        }
    }

    /// Looks up the lowered handle of any function of the module by name
    pub fn function_handle(&self, name: InternedSymbol) -> Option<FunctionId> {
        self.signatures.function_handle(name)
    }

    /// Appends a new, empty block to `function`. The cursor does not move.
    pub fn create_block(&mut self, function: FunctionId, label: &'static str) -> BlockId {
        debug_assert_eq!(
            function, self.id,
            "blocks can only be created in the function being emitted"
        );

        let id = self.blocks.next_index();
        trace!(function = %self.symbol_name, block = ?id, label, "created block");

        self.blocks.push(lir::Block {
            id,
            label,
            instructions: Vec::new(),
            predecessors: BTreeSet::new(),
        })
    }

    pub fn set_insertion_cursor(&mut self, block: BlockId) {
        self.cursor = block;
    }

    pub fn create_register(&mut self, ty: Type) -> RegisterId {
        let id = self.registers.next_index();
        self.registers.push(lir::Register { id, ty })
    }

    /// Allocates a register holding the next positional argument
    pub fn create_argument(&mut self, ty: Type) -> RegisterId {
        let id = self.create_register(ty);
        self.arguments.push(id);
        id
    }

    pub fn push_instruction(&mut self, instruction: Instruction) {
        let block = &mut self.blocks[self.cursor];
        debug_assert!(
            !block.is_terminated(),
            "instruction emitted after the terminator of {:?}",
            block.id
        );

        block.instructions.push(instruction);
    }

    /// Terminates the current block with a conditional branch
    pub fn branch(&mut self, condition: Operand, positive: BlockId, negative: BlockId) {
        let current = self.cursor;

        self.push_instruction(Instruction::Branch {
            condition,
            positive,
            negative,
        });

        self.blocks[positive].predecessors.insert(current);
        self.blocks[negative].predecessors.insert(current);
    }

    /// Terminates the current block with an unconditional jump
    pub fn jump(&mut self, destination: BlockId) {
        let current = self.cursor;

        self.push_instruction(Instruction::Jump { destination });
        self.blocks[destination].predecessors.insert(current);
    }

    /// Whether the block under the cursor already ends in a terminator
    pub fn is_terminated(&self) -> bool {
        self.blocks
            .get(self.cursor)
            .is_some_and(lir::Block::is_terminated)
    }

    pub fn finish(self) -> lir::FunctionDefinition {
        lir::FunctionDefinition {
            id: self.id,
            symbol_name: self.symbol_name,
            return_type: self.return_type,
            registers: self.registers,
            arguments: self.arguments,
            blocks: self.blocks.into_iter().map(|b| (b.id, b)).collect(),
        }
    }
}
