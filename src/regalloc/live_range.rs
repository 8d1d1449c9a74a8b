//! Union-find construction of live ranges out of SSA virtual-variable occurrences.
//!
//! Grounded on the graph-coloring allocator's `LiveInterval` construction, generalised from its
//! single-function-local symbol table to this crate's phi-driven SSA form: two occurrences join
//! the same range not only when they share an origin (the same symbol or temporary) but also when
//! a `Phi` instruction says they do, since a phi's assignee and its incoming arguments are
//! distinct SSA names that must end up in the same storage location once phis are resolved into
//! copies.

use crate::cfg::ControlFlowGraph;
use crate::ir::instruction::Operand;
use crate::ir::opcode::Opcode;
use crate::ir::types::SizeClass;
use crate::ir::variable::VirtualVariable;
use crate::ids::LiveRangeId;
use crate::isa::abi::integer_param_reg;
use crate::isa::registers::{Gpr, PhysReg, RegisterClass};
use std::cell::RefCell;

/// A union-find node keyed by variable origin.
struct UnionFind {
    parent: RefCell<Vec<usize>>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self { parent: RefCell::new((0..n).collect()) }
    }

    fn find(&self, x: usize) -> usize {
        let mut root = x;
        loop {
            let p = self.parent.borrow()[root];
            if p == root {
                break;
            }
            root = p;
        }
        let mut cur = x;
        while self.parent.borrow()[cur] != root {
            let next = self.parent.borrow()[cur];
            self.parent.borrow_mut()[cur] = root;
            cur = next;
        }
        root
    }

    fn union(&self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent.borrow_mut()[ra] = rb;
        }
    }
}

/// A maximal set of SSA occurrences that must live in the same storage location.
#[derive(Clone, Debug)]
pub struct LiveRange {
    pub id: LiveRangeId,
    pub size_class: SizeClass,
    pub class: RegisterClass,
    /// Set for the stack-pointer pseudo-range and for any range an ABI obligation pins to a
    /// specific register (parameters, `call`/`div` fixed operands).
    pub precolored: Option<PhysReg>,
    /// An address was taken on some occurrence in this range; it must be spilled unconditionally
    /// regardless of what the colourer would otherwise choose.
    pub must_be_spilled: bool,
    /// Accumulated benefit of keeping this range in a register; the colourer spills the
    /// lowest-cost range first when it runs out of colours.
    pub spill_cost: f64,
    pub stack_offset: Option<i32>,
    pub color: Option<PhysReg>,
    /// Set by `coalescing::coalesce` when this range has been folded into another one; every
    /// later pass skips eliminated ranges rather than compacting the vector, so a `LiveRangeId`
    /// minted before coalescing stays a valid index afterward.
    pub eliminated: bool,
}

impl LiveRange {
    fn new(id: LiveRangeId, size_class: SizeClass) -> Self {
        let class = if size_class.is_float() { RegisterClass::Xmm } else { RegisterClass::Gpr };
        Self {
            id,
            size_class,
            class,
            precolored: None,
            must_be_spilled: false,
            spill_cost: 0.0,
            stack_offset: None,
            color: None,
            eliminated: false,
        }
    }

    /// Is this range excluded from ordinary colouring because it is either precoloured or
    /// condemned to the stack from the start?
    pub fn is_fixed(&self) -> bool {
        self.precolored.is_some() || self.must_be_spilled
    }
}

use crate::ir::variable::OriginKey;
use std::collections::HashMap;

fn key_index(key: OriginKey, keys: &mut Vec<OriginKey>, index: &mut HashMap<OriginKey, usize>) -> usize {
    *index.entry(key).or_insert_with(|| {
        keys.push(key);
        keys.len() - 1
    })
}

/// Rebuild the live-range partition for the whole function from scratch. Every call resets the
/// CFG's live-range id counter first, since the interference graph (and therefore the ids) is
/// rebuilt after every spill-and-restart iteration.
pub fn construct_all_live_ranges(cfg: &mut ControlFlowGraph) -> Vec<LiveRange> {
    cfg.ids_mut().reset_live_ranges();

    let mut keys: Vec<OriginKey> = Vec::new();
    let mut index: HashMap<OriginKey, usize> = HashMap::new();
    let mut size_classes: Vec<SizeClass> = Vec::new();

    let block_ids: Vec<_> = cfg.blocks().map(|b| b.id).collect();
    for &block in &block_ids {
        for inst_id in cfg.instructions_in(block) {
            let inst = cfg.inst(inst_id);
            for operand in inst.def_slots().chain(inst.use_slots()) {
                if let Operand::Var(var) = operand {
                    let idx = key_index(var.origin_identity(), &mut keys, &mut index);
                    if idx == size_classes.len() {
                        size_classes.push(var.size_class);
                    }
                }
            }
            for phi_arg in &inst.phi_args {
                let idx = key_index(phi_arg.value.origin_identity(), &mut keys, &mut index);
                if idx == size_classes.len() {
                    size_classes.push(phi_arg.value.size_class);
                }
            }
        }
    }

    let uf = UnionFind::new(keys.len());

    for &block in &block_ids {
        for inst_id in cfg.instructions_in(block) {
            let inst = cfg.inst(inst_id);
            if !matches!(inst.opcode, Opcode::Phi) {
                continue;
            }
            let assignee = match &inst.assignee {
                Some(Operand::Var(v)) => v,
                _ => continue,
            };
            let a_idx = index[&assignee.origin_identity()];
            for phi_arg in &inst.phi_args {
                let b_idx = index[&phi_arg.value.origin_identity()];
                uf.union(a_idx, b_idx);
            }
        }
    }

    let mut root_to_range: Vec<Option<usize>> = vec![None; keys.len()];
    let mut ranges: Vec<LiveRange> = Vec::new();
    for i in 0..keys.len() {
        let root = uf.find(i);
        if root_to_range[root].is_none() {
            let id = cfg.ids_mut().next_live_range();
            root_to_range[root] = Some(ranges.len());
            ranges.push(LiveRange::new(id, size_classes[root]));
        }
    }
    let range_of_root: Vec<usize> = (0..keys.len())
        .map(|i| root_to_range[uf.find(i)].unwrap())
        .collect();

    for &block in &block_ids {
        let freq = cfg.block(block).estimated_execution_frequency;
        for inst_id in cfg.instructions_in(block) {
            let inst = cfg.inst_mut(inst_id);
            for operand in inst.def_slots_mut().chain(inst.use_slots_mut()) {
                if let Operand::Var(var) = operand {
                    let idx = index[&var.origin_identity()];
                    let range_idx = range_of_root[idx];
                    let range = &mut ranges[range_idx];
                    var.associated_live_range = Some(range.id);
                    let weight = if var.flags.is_temporary { 2.0 } else { 1.0 };
                    if range.spill_cost.is_finite() {
                        range.spill_cost += freq * weight;
                    }
                    if var.flags.must_be_spilled {
                        range.must_be_spilled = true;
                    }
                    if var.flags.is_stack_pointer {
                        range.spill_cost = f64::INFINITY;
                        range.precolored = Some(PhysReg::Gpr(Gpr::Rsp));
                    }
                    if let Some(n) = var.flags.parameter_number {
                        if let Some(reg) = integer_param_reg(n) {
                            range.precolored = Some(PhysReg::Gpr(reg));
                        }
                    }
                }
            }
        }
    }

    ranges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{InstId, TempId};
    use crate::ir::block::BlockKind;
    use crate::ir::instruction::{Instruction, PhiArg};

    #[test]
    fn phi_unions_distinct_temporaries_into_one_range() {
        let mut cfg = ControlFlowGraph::new();
        let pred_a = cfg.create_block(BlockKind::Normal);
        let pred_b = cfg.create_block(BlockKind::Normal);
        let join = cfg.create_block(BlockKind::Normal);

        let t_a = cfg.ids_mut().next_temp();
        let t_b = cfg.ids_mut().next_temp();
        let t_join = cfg.ids_mut().next_temp();
        let var_a = VirtualVariable::temporary(t_a, SizeClass::Dword);
        let var_b = VirtualVariable::temporary(t_b, SizeClass::Dword);
        let var_join = VirtualVariable::temporary(t_join, SizeClass::Dword);

        let mut phi = Instruction::new(InstId::from_index(0), Opcode::Phi);
        phi.assignee = Some(Operand::Var(var_join.clone()));
        phi.phi_args = vec![
            PhiArg { from_block: pred_a, value: var_a.clone() },
            PhiArg { from_block: pred_b, value: var_b.clone() },
        ];
        cfg.append_instruction(join, phi);

        let mut use_a = Instruction::new(InstId::from_index(0), Opcode::Ret);
        use_a.source_register = Some(Operand::Var(var_a));
        cfg.append_instruction(pred_a, use_a);

        let ranges = construct_all_live_ranges(&mut cfg);
        assert_eq!(ranges.len(), 1);
        let _ = t_b;
    }

    #[test]
    fn stack_pointer_occurrence_gets_infinite_cost() {
        let mut cfg = ControlFlowGraph::new();
        let block = cfg.create_block(BlockKind::Normal);
        let sp_id = cfg.ids_mut().next_temp();
        let sp = VirtualVariable::stack_pointer(sp_id);
        let mut inst = Instruction::new(InstId::from_index(0), Opcode::Ret);
        inst.source_register = Some(Operand::Var(sp));
        cfg.append_instruction(block, inst);

        let ranges = construct_all_live_ranges(&mut cfg);
        assert_eq!(ranges.len(), 1);
        assert!(ranges[0].spill_cost.is_infinite());
    }
}
