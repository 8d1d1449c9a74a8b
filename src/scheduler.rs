//! Per-block instruction scheduling: an interface only.
//!
//! The source back end ships two incompatible sketches of a list scheduler and neither is wired
//! into the working pipeline; this crate exposes the slot a real scheduler would occupy, between
//! register allocation and post-allocation clean-up, and implements only the identity transform so
//! the pipeline type-checks end to end without one. A later scheduler would reorder instructions
//! within a block subject to the dependency edges already implicit in live-range interference,
//! without touching block boundaries or `ControlFlowGraph` edges.

use crate::cfg::ControlFlowGraph;
use crate::ids::BlockId;

/// Schedule instructions within `block`. The identity transform: every instruction stays in its
/// current program order. A real scheduler would reorder `cfg`'s instruction list for `block` in
/// place, honouring the same def/use dependencies `regalloc::liveness` already computes.
pub fn schedule_block(_cfg: &mut ControlFlowGraph, _block: BlockId) {}

/// Schedule every block reachable from `entry`. The identity transform: a no-op pass over the
/// whole function.
pub fn schedule_function(cfg: &mut ControlFlowGraph, entry: BlockId) {
    for block in cfg.breadth_first_from(entry) {
        schedule_block(cfg, block);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::InstId;
    use crate::ir::block::BlockKind;
    use crate::ir::instruction::Instruction;
    use crate::ir::opcode::Opcode;

    #[test]
    fn identity_schedule_preserves_instruction_order() {
        let mut cfg = ControlFlowGraph::new();
        let block = cfg.create_block(BlockKind::Normal);
        let i0 = cfg.append_instruction(block, Instruction::new(InstId::from_index(0), Opcode::Ret));

        schedule_function(&mut cfg, block);

        assert_eq!(cfg.instructions_in(block), vec![i0]);
    }
}
