//! Graph colouring: assign a physical register to every live range, or report the ranges that
//! must be spilled this iteration.
//!
//! Grounded on the graph-coloring allocator's `color_graph` heuristic: rather than the classic
//! Chaitin push/pop simplification stack, ranges are coloured directly in descending order of
//! spill cost, so the ranges most expensive to spill get first pick of a free register and the
//! ranges that end up uncolourable are, by construction, the cheapest ones to send to the stack.

use crate::ids::LiveRangeId;
use crate::isa::registers::{PhysReg, RegisterSet};
use crate::regalloc::interference::InterferenceGraph;
use crate::regalloc::live_range::LiveRange;

/// Attempt to colour every non-fixed, non-eliminated range in `ranges`. Precoloured ranges are
/// trusted as already assigned (their neighbors must simply avoid their colour); any range this
/// call could not colour is returned so `regalloc::spill` can insert stack traffic for it and the
/// driver can restart the pipeline.
pub fn color(ranges: &mut [LiveRange], graph: &InterferenceGraph) -> Vec<LiveRangeId> {
    for range in ranges.iter_mut() {
        if let Some(p) = range.precolored {
            range.color = Some(p);
        }
    }

    let mut order: Vec<usize> = ranges
        .iter()
        .enumerate()
        .filter(|(_, r)| !r.eliminated && !r.is_fixed())
        .map(|(i, _)| i)
        .collect();
    order.sort_by(|&a, &b| {
        ranges[b]
            .spill_cost
            .partial_cmp(&ranges[a].spill_cost)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut spills = Vec::new();

    for idx in order {
        let id = ranges[idx].id;
        let class = ranges[idx].class;
        let mut used = RegisterSet::empty();
        for neighbor in graph.neighbors(id) {
            if ranges[neighbor.index()].eliminated {
                continue;
            }
            if let Some(color) = ranges[neighbor.index()].color {
                if color.class() == class {
                    used.insert(color);
                }
            }
        }

        let chosen = match class {
            crate::isa::registers::RegisterClass::Gpr => used.free_gprs().next().map(PhysReg::Gpr),
            crate::isa::registers::RegisterClass::Xmm => used.free_xmms().next().map(PhysReg::Xmm),
        };

        match chosen {
            Some(reg) => ranges[idx].color = Some(reg),
            None => spills.push(id),
        }
    }

    spills
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::ControlFlowGraph;
    use crate::ids::InstId;
    use crate::ir::block::BlockKind;
    use crate::ir::instruction::{Instruction, Operand};
    use crate::ir::opcode::Opcode;
    use crate::ir::types::SizeClass;
    use crate::ir::variable::VirtualVariable;
    use crate::regalloc::interference;
    use crate::regalloc::live_range::construct_all_live_ranges;
    use crate::regalloc::liveness::compute_liveness;

    fn temp(cfg: &mut ControlFlowGraph) -> VirtualVariable {
        let id = cfg.ids_mut().next_temp();
        VirtualVariable::temporary(id, SizeClass::Dword)
    }

    #[test]
    fn two_interfering_ranges_get_distinct_colors() {
        let mut cfg = ControlFlowGraph::new();
        let block = cfg.create_block(BlockKind::Normal);
        let a = temp(&mut cfg);
        let b = temp(&mut cfg);

        let mut def_a = Instruction::new(InstId::from_index(0), Opcode::Mov(SizeClass::Dword));
        def_a.destination_register = Some(Operand::Var(a.clone()));
        cfg.append_instruction(block, def_a);
        let mut def_b = Instruction::new(InstId::from_index(0), Opcode::Mov(SizeClass::Dword));
        def_b.destination_register = Some(Operand::Var(b.clone()));
        cfg.append_instruction(block, def_b);
        let mut use_both = Instruction::new(InstId::from_index(0), Opcode::Add(SizeClass::Dword));
        use_both.destination_register = Some(Operand::Var(a.clone()));
        use_both.source_register = Some(Operand::Var(a));
        use_both.source_register2 = Some(Operand::Var(b));
        cfg.append_instruction(block, use_both);

        let mut ranges = construct_all_live_ranges(&mut cfg);
        compute_liveness(&mut cfg, block);
        let graph = interference::build(&cfg, ranges.len());

        let spills = color(&mut ranges, &graph);
        assert!(spills.is_empty());
        assert!(ranges.iter().all(|r| r.color.is_some()));
        assert_ne!(ranges[0].color, ranges[1].color);
    }
}
