//! Final block layout and fallthrough-jump elision.
//!
//! Lays blocks out so that a block's `direct_successor` — the branch it falls into without an
//! explicit jump in the source — is placed immediately after it whenever that successor hasn't
//! already been placed elsewhere in the order, then drops any trailing unconditional `Jmp` whose
//! target turned out to be the very next block once the layout is final.

use crate::cfg::ControlFlowGraph;
use crate::ids::BlockId;
use crate::ir::opcode::Opcode;
use std::collections::HashSet;

/// A linear emission order over every block reachable from `entry`, chaining `direct_successor`
/// edges so straight-line code lays out contiguously.
pub fn order_blocks(cfg: &ControlFlowGraph, entry: BlockId) -> Vec<BlockId> {
    let reachable = cfg.breadth_first_from(entry);
    let reachable_set: HashSet<BlockId> = reachable.iter().copied().collect();

    let mut placed: HashSet<BlockId> = HashSet::new();
    let mut order = Vec::with_capacity(reachable.len());

    for &start in &reachable {
        if placed.contains(&start) {
            continue;
        }
        let mut cursor = start;
        loop {
            order.push(cursor);
            placed.insert(cursor);
            match cfg.block(cursor).direct_successor {
                Some(next) if reachable_set.contains(&next) && !placed.contains(&next) => {
                    cursor = next;
                }
                _ => break,
            }
        }
    }

    order
}

/// Delete every trailing unconditional `Jmp` whose target is the block immediately following it
/// in `order` — control falls through there anyway once this layout is committed.
pub fn elide_redundant_jumps(cfg: &mut ControlFlowGraph, order: &[BlockId]) {
    for (i, &block) in order.iter().enumerate() {
        let next = order.get(i + 1).copied();
        if let Some(exit_inst) = cfg.block(block).exit {
            let inst = cfg.inst(exit_inst);
            if matches!(inst.opcode, Opcode::Jmp) && inst.if_block == next {
                cfg.delete_instruction(exit_inst);
            }
        }
    }
}
