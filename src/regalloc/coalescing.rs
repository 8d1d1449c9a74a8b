//! Copy coalescing: eliminate pure register-to-register moves whose source and destination live
//! ranges don't interfere, folding the two ranges into one.
//!
//! Grounded on the copy-coalescing pass's sole-use reasoning: a move is safe to elide exactly
//! when source and destination can share a storage location for their whole combined lifetime,
//! which the interference graph already answers directly (no separate "immediately consumed"
//! check is needed once the graph is built correctly). The destination's identity is discarded and
//! the source's survives, matching the pass's own convention, so that a chain of copies collapses
//! onto the first range that ever held the value.

use crate::cfg::ControlFlowGraph;
use crate::ir::instruction::Operand;
use crate::ir::opcode::Opcode;
use crate::regalloc::interference::InterferenceGraph;
use crate::regalloc::live_range::LiveRange;

/// Repeatedly fold pure copies into their source range until no more are safe to remove, deleting
/// the now-redundant `Mov` instructions as they go. Runs to a fixpoint within one call since
/// folding one copy can make a previously-interfering neighbor copy safe to fold too (the merged
/// range's interference set is a superset of either original, so folding never unblocks a
/// previously-blocked merge; a single forward pass is sufficient, but the loop costs nothing extra
/// and protects against reordering assumptions in future edits).
pub fn coalesce(cfg: &mut ControlFlowGraph, ranges: &mut [LiveRange], graph: &mut InterferenceGraph) {
    loop {
        let mut made_progress = false;
        let block_ids: Vec<_> = cfg.blocks().map(|b| b.id).collect();

        'blocks: for block in block_ids {
            for inst_id in cfg.instructions_in(block) {
                let inst = cfg.inst(inst_id);
                if !inst.is_pure_copy() {
                    continue;
                }
                let (dest_lr, src_lr) = match (&inst.destination_register, &inst.source_register) {
                    (Some(Operand::Var(d)), Some(Operand::Var(s))) => {
                        match (d.associated_live_range, s.associated_live_range) {
                            (Some(d), Some(s)) => (d, s),
                            _ => continue,
                        }
                    }
                    _ => continue,
                };
                if dest_lr == src_lr {
                    cfg.delete_instruction(inst_id);
                    made_progress = true;
                    continue 'blocks;
                }
                if ranges[dest_lr.index()].eliminated || ranges[src_lr.index()].eliminated {
                    continue;
                }
                if graph.interferes(dest_lr, src_lr) {
                    continue;
                }
                let precolor_conflict = match (ranges[dest_lr.index()].precolored, ranges[src_lr.index()].precolored) {
                    (Some(a), Some(b)) => a != b,
                    _ => false,
                };
                if precolor_conflict {
                    continue;
                }

                rewrite_associated_live_range(cfg, dest_lr, src_lr);
                graph.merge_into(src_lr, dest_lr);

                let dest_cost = ranges[dest_lr.index()].spill_cost;
                let dest_must_spill = ranges[dest_lr.index()].must_be_spilled;
                let dest_precolor = ranges[dest_lr.index()].precolored;
                {
                    let survivor = &mut ranges[src_lr.index()];
                    survivor.spill_cost += dest_cost;
                    survivor.must_be_spilled |= dest_must_spill;
                    survivor.precolored = survivor.precolored.or(dest_precolor);
                }
                ranges[dest_lr.index()].eliminated = true;

                cfg.delete_instruction(inst_id);
                made_progress = true;
                continue 'blocks;
            }
        }

        if !made_progress {
            break;
        }
    }
}

fn rewrite_associated_live_range(
    cfg: &mut ControlFlowGraph,
    from: crate::ids::LiveRangeId,
    to: crate::ids::LiveRangeId,
) {
    let block_ids: Vec<_> = cfg.blocks().map(|b| b.id).collect();
    for block in block_ids {
        for inst_id in cfg.instructions_in(block) {
            let inst = cfg.inst_mut(inst_id);
            if matches!(inst.opcode, Opcode::Phi) {
                for phi_arg in &mut inst.phi_args {
                    if phi_arg.value.associated_live_range == Some(from) {
                        phi_arg.value.associated_live_range = Some(to);
                    }
                }
            }
            for operand in inst.all_slots_mut() {
                if let Operand::Var(var) = operand {
                    if var.associated_live_range == Some(from) {
                        var.associated_live_range = Some(to);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::InstId;
    use crate::ir::block::BlockKind;
    use crate::ir::instruction::Instruction;
    use crate::ir::types::SizeClass;
    use crate::ir::variable::VirtualVariable;
    use crate::regalloc::interference;
    use crate::regalloc::live_range::construct_all_live_ranges;
    use crate::regalloc::liveness::compute_liveness;

    #[test]
    fn non_interfering_copy_is_removed_and_ranges_merge() {
        let mut cfg = ControlFlowGraph::new();
        let block = cfg.create_block(BlockKind::Normal);
        let t0 = cfg.ids_mut().next_temp();
        let t1 = cfg.ids_mut().next_temp();
        let a = VirtualVariable::temporary(t0, SizeClass::Dword);
        let b = VirtualVariable::temporary(t1, SizeClass::Dword);

        let mut def_a = Instruction::new(InstId::from_index(0), Opcode::Mov(SizeClass::Dword));
        def_a.destination_register = Some(Operand::Var(a.clone()));
        cfg.append_instruction(block, def_a);

        let mut copy = Instruction::new(InstId::from_index(0), Opcode::Mov(SizeClass::Dword));
        copy.destination_register = Some(Operand::Var(b.clone()));
        copy.source_register = Some(Operand::Var(a));
        let copy_id = cfg.append_instruction(block, copy);

        let mut ret = Instruction::new(InstId::from_index(0), Opcode::Ret);
        ret.source_register = Some(Operand::Var(b));
        cfg.append_instruction(block, ret);

        let mut ranges = construct_all_live_ranges(&mut cfg);
        compute_liveness(&mut cfg, block);
        let mut graph = interference::build(&cfg, ranges.len());

        coalesce(&mut cfg, &mut ranges, &mut graph);

        assert!(cfg.instructions_in(block).iter().all(|&i| i != copy_id));
        let eliminated_count = ranges.iter().filter(|r| r.eliminated).count();
        assert_eq!(eliminated_count, 1);
    }
}
