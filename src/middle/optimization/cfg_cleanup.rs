use tracing::debug;

use crate::middle::lir;

// Removes the noise lowering leaves behind in the CFG: continuation blocks
// nothing jumps to (both branches of an if returned) and blocks that only
// forward control somewhere else. Predecessor sets stay exact throughout.
pub fn cleanup_function(function: &mut lir::FunctionDefinition) {
    let before = function.blocks.len();

    eliminate_unreachable_blocks(function);
    thread_jumps(function);
    eliminate_unreachable_blocks(function);

    debug!(
        function = %function.symbol_name,
        removed = before - function.blocks.len(),
        "cleaned up CFG"
    );
}

/// Deletes every block other than the entry that has no predecessors. Removing
/// a block can orphan its successors, so this repeats until nothing changes.
pub fn eliminate_unreachable_blocks(function: &mut lir::FunctionDefinition) {
    loop {
        let unreachable = function
            .blocks
            .values()
            .filter(|b| b.id != lir::BlockId::ZERO && b.predecessors.is_empty())
            .map(|b| b.id)
            .collect::<Vec<_>>();

        if unreachable.is_empty() {
            return;
        }

        for block_id in &unreachable {
            function.blocks.remove(block_id);
        }

        for block in function.blocks.values_mut() {
            for block_id in &unreachable {
                block.predecessors.remove(block_id);
            }
        }
    }
}

/// Jump threading. Eliminates blocks that are just a jump.
pub fn thread_jumps(function: &mut lir::FunctionDefinition) {
    for block_id in function.blocks.keys().copied().collect::<Vec<_>>() {
        /* Find the blocks we're looking for */

        if block_id == lir::BlockId::ZERO {
            continue;
        }

        let Some(block) = function.blocks.get(&block_id) else {
            continue;
        };

        let [lir::Instruction::Jump {
            destination: new_dest,
        }] = block.instructions.as_slice()
        else {
            continue;
        };
        let new_dest = *new_dest;

        if new_dest == block_id {
            continue;
        }

        /* Update the CFG */

        let predecessors = block.predecessors.clone();

        // Patch any instructions in predecessor blocks that reference this
        // block as the jump target
        for predecessor in &predecessors {
            let Some(predecessor) = function.blocks.get_mut(predecessor) else {
                continue;
            };

            match predecessor.instructions.last_mut() {
                Some(lir::Instruction::Branch {
                    positive, negative, ..
                }) => {
                    if *positive == block_id {
                        *positive = new_dest;
                    }
                    if *negative == block_id {
                        *negative = new_dest;
                    }
                }
                Some(lir::Instruction::Jump { destination }) if *destination == block_id => {
                    *destination = new_dest;
                }
                _ => {}
            }
        }

        function.blocks.remove(&block_id);

        // Add all the old block's predecessors to the new jump destination so
        // the CFG is preserved
        if let Some(destination) = function.blocks.get_mut(&new_dest) {
            destination.predecessors.remove(&block_id);
            destination.predecessors.extend(predecessors);
        }
    }
}
