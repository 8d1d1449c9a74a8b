//! Fixpoint clean-up of the block graph once useless moves (and the phis they resolved) are gone:
//! fold away empty blocks and merge straight-line single-predecessor/single-successor chains.
//!
//! Grounded on the usual post-regalloc CFG simplification pass (removing the basic-block
//! scaffolding SSA construction needs but machine code doesn't): every empty block this crate ever
//! creates is either a phi-join that lost its last instruction to `useless_moves::remove` or an
//! edge the front end inserted purely to keep the CFG well-formed during construction.

use crate::cfg::ControlFlowGraph;
use crate::ids::BlockId;
use crate::ir::block::BlockKind;

/// Repeatedly fold empty blocks into their sole successor and merge single-edge chains until
/// neither applies anywhere reachable from `entry`. `entry` itself is never folded away, so
/// `FunctionRecord::entry_block` always stays valid.
pub fn run(cfg: &mut ControlFlowGraph, entry: BlockId) {
    loop {
        let mut changed = false;
        changed |= fold_empty_blocks(cfg, entry);
        changed |= merge_chains(cfg, entry);
        if !changed {
            break;
        }
    }
}

fn fold_empty_blocks(cfg: &mut ControlFlowGraph, entry: BlockId) -> bool {
    let mut changed = false;
    let candidates: Vec<BlockId> = cfg
        .blocks()
        .filter(|b| {
            b.id != entry
                && b.kind == BlockKind::Normal
                && b.is_empty()
                && b.successors.len() == 1
                && b.successors[0] != b.id
        })
        .map(|b| b.id)
        .collect();

    for block in candidates {
        // A predecessor's edge into `block` may already have been retargeted by an earlier
        // iteration of this same pass; skip if so.
        if cfg.block(block).predecessors.is_empty() {
            continue;
        }
        let successor = cfg.block(block).successors[0];
        cfg.replace_target(block, successor);
        changed = true;
    }
    changed
}

fn merge_chains(cfg: &mut ControlFlowGraph, entry: BlockId) -> bool {
    let mut changed = false;
    let candidates: Vec<BlockId> = cfg
        .blocks()
        .filter(|b| b.successors.len() == 1)
        .map(|b| b.id)
        .collect();

    for first in candidates {
        let successors = cfg.block(first).successors.clone();
        if successors.len() != 1 {
            continue;
        }
        let second = successors[0];
        if second == first || second == entry {
            continue;
        }
        if cfg.block(second).predecessors != vec![first] {
            continue;
        }
        cfg.merge(first, second);
        changed = true;
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::InstId;
    use crate::ir::instruction::Instruction;
    use crate::ir::opcode::Opcode;
    use crate::cfg::LinkDirection;

    #[test]
    fn empty_middle_block_is_folded_away() {
        let mut cfg = ControlFlowGraph::new();
        let entry = cfg.create_block(BlockKind::FunctionEntry);
        let empty = cfg.create_block(BlockKind::Normal);
        let exit = cfg.create_block(BlockKind::FunctionExit);
        cfg.link(entry, empty, LinkDirection::Forward);
        cfg.link(empty, exit, LinkDirection::Forward);
        let mut jmp = Instruction::new(InstId::from_index(0), Opcode::Jmp);
        jmp.if_block = Some(empty);
        cfg.append_instruction(entry, jmp);
        cfg.append_instruction(exit, Instruction::new(InstId::from_index(0), Opcode::Ret));

        fold_empty_blocks(&mut cfg, entry);

        assert!(cfg.block(empty).predecessors.is_empty());
        assert_eq!(cfg.block(entry).successors, vec![exit]);
        assert_eq!(cfg.block(exit).predecessors, vec![entry]);
    }

    #[test]
    fn single_edge_chain_merges_into_one_block() {
        let mut cfg = ControlFlowGraph::new();
        let entry = cfg.create_block(BlockKind::FunctionEntry);
        let middle = cfg.create_block(BlockKind::Normal);
        cfg.link(entry, middle, LinkDirection::Forward);
        cfg.append_instruction(entry, Instruction::new(InstId::from_index(0), Opcode::Jmp));
        let marker = cfg.append_instruction(middle, Instruction::new(InstId::from_index(0), Opcode::Ret));

        run(&mut cfg, entry);

        assert_eq!(cfg.instructions_in(entry), vec![marker]);
    }
}
