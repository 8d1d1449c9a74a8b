//! Interference graph construction and instruction-driven precolouring.
//!
//! The graph is built bottom-up per block, walking instructions from exit to leader while
//! maintaining a "livenow" set seeded from `live_out`: defs interfere with everything currently
//! live, then leave the set (except a two-operand arithmetic op's destination, which x86 also
//! reads, so it rejoins the set instead of leaving it); uses join it. Grounded on the
//! graph-coloring allocator's
//! `build_interference_graph`, adapted to this crate's block-scoped live ranges and extended with
//! the ABI-driven precolouring (`call`/`div`/`ret`) the source C back end hard-codes into its own
//! code generator rather than its register allocator.

use crate::cfg::ControlFlowGraph;
use crate::ids::{InstId, LiveRangeId};
use crate::ir::instruction::Operand;
use crate::ir::opcode::Opcode;
use crate::isa::abi::{integer_param_reg, INTEGER_RETURN_REG, REMAINDER_REG};
use crate::isa::registers::PhysReg;
use crate::regalloc::live_range::LiveRange;
use std::collections::{BTreeSet, HashMap};

/// An undirected graph over live-range ids.
#[derive(Clone, Debug, Default)]
pub struct InterferenceGraph {
    adjacency: Vec<BTreeSet<LiveRangeId>>,
}

impl InterferenceGraph {
    fn with_capacity(n: usize) -> Self {
        Self { adjacency: vec![BTreeSet::new(); n] }
    }

    fn add_edge(&mut self, a: LiveRangeId, b: LiveRangeId) {
        if a == b {
            return;
        }
        self.adjacency[a.index()].insert(b);
        self.adjacency[b.index()].insert(a);
    }

    pub fn neighbors(&self, lr: LiveRangeId) -> impl Iterator<Item = LiveRangeId> + '_ {
        self.adjacency[lr.index()].iter().copied()
    }

    pub fn degree(&self, lr: LiveRangeId) -> usize {
        self.adjacency[lr.index()].len()
    }

    pub fn interferes(&self, a: LiveRangeId, b: LiveRangeId) -> bool {
        self.adjacency[a.index()].contains(&b)
    }

    /// Merge `b`'s edges into `a` and drop `b` (used by coalescing once a copy is eliminated).
    pub fn merge_into(&mut self, a: LiveRangeId, b: LiveRangeId) {
        let b_neighbors: Vec<LiveRangeId> = self.adjacency[b.index()].iter().copied().collect();
        for n in b_neighbors {
            self.adjacency[n.index()].remove(&b);
            if n != a {
                self.add_edge(a, n);
            }
        }
        self.adjacency[b.index()].clear();
    }
}

/// Pin ranges to specific physical registers based on what instruction uses them, independent of
/// the variable-flag-driven precolouring `live_range::construct_all_live_ranges` already applied
/// for parameters and the stack pointer.
pub fn apply_instruction_precoloring(cfg: &ControlFlowGraph, ranges: &mut [LiveRange]) {
    let lookup = |ranges: &mut [LiveRange], lr: LiveRangeId, reg: PhysReg| {
        ranges[lr.index()].precolored = Some(reg);
    };

    for block in cfg.blocks() {
        for inst_id in cfg.instructions_in(block.id) {
            let inst = cfg.inst(inst_id);
            match inst.opcode {
                Opcode::Ret => {
                    if let Some(Operand::Var(v)) = &inst.source_register {
                        if let Some(lr) = v.associated_live_range {
                            lookup(ranges, lr, PhysReg::Gpr(INTEGER_RETURN_REG));
                        }
                    }
                }
                Opcode::Call | Opcode::CallIndirect => {
                    for (i, param) in inst.call_params.iter().enumerate() {
                        if let (Operand::Var(v), Some(reg)) =
                            (param, integer_param_reg(i as u32 + 1))
                        {
                            if let Some(lr) = v.associated_live_range {
                                lookup(ranges, lr, PhysReg::Gpr(reg));
                            }
                        }
                    }
                    if let Some(Operand::Var(v)) = &inst.destination_register {
                        if let Some(lr) = v.associated_live_range {
                            lookup(ranges, lr, PhysReg::Gpr(INTEGER_RETURN_REG));
                        }
                    }
                }
                Opcode::Div(_) | Opcode::Idiv(_) => {
                    if let Some(Operand::Var(v)) = &inst.source_register {
                        if let Some(lr) = v.associated_live_range {
                            lookup(ranges, lr, PhysReg::Gpr(INTEGER_RETURN_REG));
                        }
                    }
                    if let Some(Operand::Var(v)) = &inst.destination_register {
                        if let Some(lr) = v.associated_live_range {
                            let target = if inst.for_mod { REMAINDER_REG } else { INTEGER_RETURN_REG };
                            lookup(ranges, lr, PhysReg::Gpr(target));
                        }
                    }
                }
                _ => {}
            }
        }
    }
}

/// Build the interference graph for `cfg`, given the live ranges and up-to-date block
/// `live_in`/`live_out` sets from `liveness::compute_liveness`.
pub fn build(cfg: &ControlFlowGraph, range_count: usize) -> InterferenceGraph {
    let mut graph = InterferenceGraph::with_capacity(range_count);

    for block in cfg.blocks() {
        let mut livenow: BTreeSet<LiveRangeId> = block.live_out.iter().copied().collect();
        let insts = cfg.instructions_in(block.id);
        for &inst_id in insts.iter().rev() {
            let inst = cfg.inst(inst_id);
            if matches!(inst.opcode, Opcode::Phi) {
                // Phi assignees are resolved into copies before interference matters; they do
                // not themselves constrain the graph.
                continue;
            }

            let move_source = if inst.is_pure_copy() {
                match &inst.source_register {
                    Some(Operand::Var(v)) => v.associated_live_range,
                    _ => None,
                }
            } else {
                None
            };

            for operand in inst.def_slots() {
                if let Operand::Var(var) = operand {
                    if let Some(def_lr) = var.associated_live_range {
                        for &live_lr in &livenow {
                            if Some(live_lr) == move_source {
                                continue;
                            }
                            graph.add_edge(def_lr, live_lr);
                        }
                        if inst.opcode.is_two_operand_arithmetic() {
                            // x86 reads `destination_register` as well as writing it, so it is
                            // live going into the instruction, not just out of it.
                            livenow.insert(def_lr);
                        } else {
                            livenow.remove(&def_lr);
                        }
                    }
                }
            }

            for operand in inst.use_slots() {
                if let Operand::Var(var) = operand {
                    if let Some(lr) = var.associated_live_range {
                        livenow.insert(lr);
                    }
                }
            }
        }
    }

    graph
}

/// For every `call`/`call_indirect` instruction, the live ranges alive immediately after it
/// executes — the set `prologue_epilogue::inject_caller_saves` must weigh against the caller-saved
/// register file to know what actually needs protecting across that one call site, rather than
/// over-approximating with every caller-saved register the function happens to use anywhere.
/// Requires up-to-date `live_out` sets from `liveness::compute_liveness`, and current
/// `associated_live_range` ids (i.e. run after any coalescing that merged ranges).
pub fn call_site_live_ranges(cfg: &ControlFlowGraph) -> HashMap<InstId, BTreeSet<LiveRangeId>> {
    let mut call_sites = HashMap::new();

    for block in cfg.blocks() {
        let mut livenow: BTreeSet<LiveRangeId> = block.live_out.iter().copied().collect();
        let insts = cfg.instructions_in(block.id);
        for &inst_id in insts.iter().rev() {
            let inst = cfg.inst(inst_id);
            if matches!(inst.opcode, Opcode::Call | Opcode::CallIndirect) {
                call_sites.insert(inst_id, livenow.clone());
            }
            if matches!(inst.opcode, Opcode::Phi) {
                continue;
            }

            for operand in inst.def_slots() {
                if let Operand::Var(var) = operand {
                    if let Some(def_lr) = var.associated_live_range {
                        if !inst.opcode.is_two_operand_arithmetic() {
                            livenow.remove(&def_lr);
                        }
                    }
                }
            }
            for operand in inst.use_slots() {
                if let Operand::Var(var) = operand {
                    if let Some(lr) = var.associated_live_range {
                        livenow.insert(lr);
                    }
                }
            }
        }
    }

    call_sites
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{BlockId, InstId, TempId};
    use crate::ir::block::BlockKind;
    use crate::ir::instruction::Instruction;
    use crate::ir::types::SizeClass;
    use crate::ir::variable::VirtualVariable;
    use crate::regalloc::live_range::construct_all_live_ranges;
    use crate::regalloc::liveness::compute_liveness;

    fn temp(cfg: &mut ControlFlowGraph) -> VirtualVariable {
        let id = cfg.ids_mut().next_temp();
        VirtualVariable::temporary(id, SizeClass::Dword)
    }

    #[test]
    fn two_simultaneously_live_defs_interfere() {
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

        let ranges = construct_all_live_ranges(&mut cfg);
        compute_liveness(&mut cfg, block);
        let graph = build(&cfg, ranges.len());

        assert_eq!(ranges.len(), 2);
        assert!(graph.interferes(ranges[0].id, ranges[1].id));
        let _ = BlockId::from_index(0);
        let _ = TempId::from_index(0);
    }

    #[test]
    fn pure_copy_does_not_force_interference_between_source_and_dest() {
        let mut cfg = ControlFlowGraph::new();
        let block = cfg.create_block(BlockKind::Normal);
        let a = temp(&mut cfg);
        let b = temp(&mut cfg);

        let mut def_a = Instruction::new(InstId::from_index(0), Opcode::Mov(SizeClass::Dword));
        def_a.destination_register = Some(Operand::Var(a.clone()));
        cfg.append_instruction(block, def_a);

        let mut copy = Instruction::new(InstId::from_index(0), Opcode::Mov(SizeClass::Dword));
        copy.destination_register = Some(Operand::Var(b.clone()));
        copy.source_register = Some(Operand::Var(a.clone()));
        cfg.append_instruction(block, copy);

        let mut ret = Instruction::new(InstId::from_index(0), Opcode::Ret);
        ret.source_register = Some(Operand::Var(b));
        cfg.append_instruction(block, ret);

        let ranges = construct_all_live_ranges(&mut cfg);
        compute_liveness(&mut cfg, block);
        let graph = build(&cfg, ranges.len());

        assert!(!graph.interferes(ranges[0].id, ranges[1].id));
    }

    #[test]
    fn two_operand_arithmetic_keeps_its_destination_live_across_the_instruction() {
        // `c = a + b` with a distinct `k` defined in between `a`/`b` and the add: `k` must end up
        // interfering with `c`, because x86's `addq %rbx, %rcx` reads `%rcx` (c's register) on
        // entry, so `c`'s live range has to reach back across the add to wherever `a`/`b` were
        // last written — past `k`'s definition — not just start at the add itself.
        let mut cfg = ControlFlowGraph::new();
        let block = cfg.create_block(BlockKind::Normal);
        let a = temp(&mut cfg);
        let b = temp(&mut cfg);
        let k = temp(&mut cfg);
        let c = temp(&mut cfg);

        let mut def_a = Instruction::new(InstId::from_index(0), Opcode::Mov(SizeClass::Dword));
        def_a.destination_register = Some(Operand::Var(a.clone()));
        cfg.append_instruction(block, def_a);

        let mut def_b = Instruction::new(InstId::from_index(0), Opcode::Mov(SizeClass::Dword));
        def_b.destination_register = Some(Operand::Var(b.clone()));
        cfg.append_instruction(block, def_b);

        let mut def_k = Instruction::new(InstId::from_index(0), Opcode::Mov(SizeClass::Dword));
        def_k.destination_register = Some(Operand::Var(k.clone()));
        cfg.append_instruction(block, def_k);

        let mut add = Instruction::new(InstId::from_index(0), Opcode::Add(SizeClass::Dword));
        add.destination_register = Some(Operand::Var(c.clone()));
        add.source_register = Some(Operand::Var(a));
        add.source_register2 = Some(Operand::Var(b));
        cfg.append_instruction(block, add);

        let mut ret = Instruction::new(InstId::from_index(0), Opcode::Ret);
        ret.source_register = Some(Operand::Var(c));
        cfg.append_instruction(block, ret);

        let ranges = construct_all_live_ranges(&mut cfg);
        compute_liveness(&mut cfg, block);
        let graph = build(&cfg, ranges.len());

        // Ranges are constructed in first-occurrence order: a, b, k, c.
        assert_eq!(ranges.len(), 4);
        let k_lr = ranges[2].id;
        let c_lr = ranges[3].id;
        assert!(graph.interferes(c_lr, k_lr));
    }
}
