//! Block-level live-in/live-out dataflow over live ranges.
//!
//! A standard backward bit-vector problem, computed here over `BTreeSet<LiveRangeId>` rather than
//! a bitset: this crate's live-range counts are small per function and the set representation
//! keeps the per-block fields self-describing when dumped by `ir::print`.

use crate::cfg::ControlFlowGraph;
use crate::ids::{BlockId, LiveRangeId};
use crate::ir::instruction::Operand;
use std::collections::BTreeSet;

fn def_use(cfg: &ControlFlowGraph, block: BlockId) -> (BTreeSet<LiveRangeId>, BTreeSet<LiveRangeId>) {
    let mut def = BTreeSet::new();
    let mut used = BTreeSet::new();
    for inst_id in cfg.instructions_in(block) {
        let inst = cfg.inst(inst_id);
        for operand in inst.use_slots() {
            if let Operand::Var(var) = operand {
                if let Some(lr) = var.associated_live_range {
                    if !def.contains(&lr) {
                        used.insert(lr);
                    }
                }
            }
        }
        for operand in inst.def_slots() {
            if let Operand::Var(var) = operand {
                if let Some(lr) = var.associated_live_range {
                    def.insert(lr);
                }
            }
        }
    }
    (def, used)
}

/// Recompute `live_in`/`live_out` on every block reachable from `entry`, iterating to a fixpoint.
/// Must run after `live_range::construct_all_live_ranges` has populated every operand's
/// `associated_live_range`.
pub fn compute_liveness(cfg: &mut ControlFlowGraph, entry: BlockId) {
    let order = cfg.post_order_traversal(entry);
    let defs_uses: Vec<(BlockId, BTreeSet<LiveRangeId>, BTreeSet<LiveRangeId>)> = order
        .iter()
        .map(|&b| {
            let (def, used) = def_use(cfg, b);
            (b, def, used)
        })
        .collect();

    for &block in &order {
        cfg.block_mut(block).live_in.clear();
        cfg.block_mut(block).live_out.clear();
    }

    let mut changed = true;
    while changed {
        changed = false;
        for (block, def, used) in &defs_uses {
            let mut live_out = BTreeSet::new();
            for &succ in &cfg.block(*block).successors {
                live_out.extend(cfg.block(succ).live_in.iter().copied());
            }
            let mut live_in = used.clone();
            for lr in &live_out {
                if !def.contains(lr) {
                    live_in.insert(*lr);
                }
            }
            if live_out != cfg.block(*block).live_out {
                cfg.block_mut(*block).live_out = live_out;
                changed = true;
            }
            if live_in != cfg.block(*block).live_in {
                cfg.block_mut(*block).live_in = live_in;
                changed = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{InstId, TempId};
    use crate::ir::block::BlockKind;
    use crate::ir::instruction::Instruction;
    use crate::ir::opcode::Opcode;
    use crate::ir::types::SizeClass;
    use crate::ir::variable::VirtualVariable;
    use crate::regalloc::live_range::construct_all_live_ranges;

    #[test]
    fn value_defined_in_entry_and_used_in_exit_is_live_across_the_edge() {
        let mut cfg = ControlFlowGraph::new();
        let entry = cfg.create_block(BlockKind::Normal);
        let exit = cfg.create_block(BlockKind::Normal);
        cfg.link(entry, exit, crate::cfg::LinkDirection::Forward);

        let t = cfg.ids_mut().next_temp();
        let var = VirtualVariable::temporary(t, SizeClass::Dword);

        let mut def_inst = Instruction::new(InstId::from_index(0), Opcode::Mov(SizeClass::Dword));
        def_inst.destination_register = Some(Operand::Var(var.clone()));
        cfg.append_instruction(entry, def_inst);

        let mut use_inst = Instruction::new(InstId::from_index(0), Opcode::Ret);
        use_inst.source_register = Some(Operand::Var(var));
        cfg.append_instruction(exit, use_inst);

        construct_all_live_ranges(&mut cfg);
        compute_liveness(&mut cfg, entry);

        assert!(!cfg.block(entry).live_out.is_empty());
        assert!(!cfg.block(exit).live_in.is_empty());
        let _ = TempId::from_index(0);
    }
}
