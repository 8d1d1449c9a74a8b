//! Spill-code insertion: give every live range the colourer couldn't fit a stack slot, and rewrite
//! its defs/uses into explicit loads and stores.
//!
//! `Load`/`Store` instructions emitted here carry no `address_calc_reg` operand and are understood
//! by `emit::emit_function` as frame-relative (`offset(%rbp)`) specifically because of that
//! absence; ordinary memory operands produced by instruction selection always populate at least
//! one address-calc register.
//!
//! The "currently spilled" reload cache is scoped per basic block (see `DESIGN.md`): reloading a
//! range's value once inside a block is reused by every later use of that range in the *same*
//! block, but never carried across a block boundary, even when no intervening definition exists.
//! This keeps the reused value's liveness confined to a single block, which is exactly the
//! property the next `construct_all_live_ranges` pass over the rewritten code depends on.

use crate::cfg::ControlFlowGraph;
use crate::ids::{InstId, LiveRangeId};
use crate::ir::instruction::{Instruction, Operand};
use crate::ir::opcode::Opcode;
use crate::ir::types::SizeClass;
use crate::ir::variable::VirtualVariable;
use crate::regalloc::live_range::LiveRange;
use std::collections::HashMap;

/// Reserve an aligned stack slot for every range in `spilled`, starting from `frame_size`, and
/// return the new total.
fn assign_stack_slots(ranges: &mut [LiveRange], spilled: &[LiveRangeId], frame_size: u32) -> u32 {
    let mut offset = frame_size;
    for &lr in spilled {
        let range = &mut ranges[lr.index()];
        offset = align_up(offset + range.size_class.bytes(), range.size_class.alignment());
        range.stack_offset = Some(-(offset as i32));
    }
    offset
}

fn align_up(value: u32, alignment: u32) -> u32 {
    (value + alignment - 1) / alignment * alignment
}

/// Rewrite every block's instructions so that spilled ranges flow through the stack, and return
/// the function's new total frame size.
pub fn spill(cfg: &mut ControlFlowGraph, ranges: &mut [LiveRange], spilled: &[LiveRangeId], frame_size: u32) -> u32 {
    let new_frame_size = assign_stack_slots(ranges, spilled, frame_size);

    let slots: HashMap<LiveRangeId, (i32, SizeClass)> = spilled
        .iter()
        .map(|&lr| (lr, (ranges[lr.index()].stack_offset.unwrap(), ranges[lr.index()].size_class)))
        .collect();

    let block_ids: Vec<_> = cfg.blocks().map(|b| b.id).collect();
    for block in block_ids {
        let mut currently_spilled: HashMap<LiveRangeId, VirtualVariable> = HashMap::new();
        for inst_id in cfg.instructions_in(block) {
            rewrite_uses(cfg, inst_id, &slots, &mut currently_spilled);
            rewrite_defs(cfg, inst_id, &slots, &mut currently_spilled);
        }
    }

    new_frame_size
}

fn spilled_slots(
    lrs: &[Option<LiveRangeId>],
    slots: &HashMap<LiveRangeId, (i32, SizeClass)>,
) -> Vec<(usize, LiveRangeId, i32, SizeClass)> {
    lrs.iter()
        .enumerate()
        .filter_map(|(i, lr)| lr.and_then(|lr| slots.get(&lr).map(|&(o, s)| (i, lr, o, s))))
        .collect()
}

fn rewrite_uses(
    cfg: &mut ControlFlowGraph,
    inst_id: InstId,
    slots: &HashMap<LiveRangeId, (i32, SizeClass)>,
    currently_spilled: &mut HashMap<LiveRangeId, VirtualVariable>,
) {
    let pending: Vec<(usize, LiveRangeId, i32, SizeClass)> = {
        let inst = cfg.inst(inst_id);
        let lrs: Vec<Option<LiveRangeId>> = inst
            .use_slots()
            .map(|op| match op {
                Operand::Var(v) => v.associated_live_range,
                Operand::Imm(_) => None,
            })
            .collect();
        spilled_slots(&lrs, slots)
    };

    for (slot_index, lr, offset, size_class) in pending {
        let fresh = match currently_spilled.get(&lr) {
            Some(var) => var.clone(),
            None => {
                let temp_id = cfg.ids_mut().next_temp();
                let fresh = VirtualVariable::temporary(temp_id, size_class);
                let mut load = Instruction::new(InstId::from_index(0), Opcode::Load(size_class));
                load.destination_register = Some(Operand::Var(fresh.clone()));
                load.offset = Some(offset as i64);
                cfg.insert_before(inst_id, load);
                currently_spilled.insert(lr, fresh.clone());
                fresh
            }
        };
        let inst = cfg.inst_mut(inst_id);
        if let Some(op) = inst.use_slots_mut().nth(slot_index) {
            *op = Operand::Var(fresh);
        }
    }
}

fn rewrite_defs(
    cfg: &mut ControlFlowGraph,
    inst_id: InstId,
    slots: &HashMap<LiveRangeId, (i32, SizeClass)>,
    currently_spilled: &mut HashMap<LiveRangeId, VirtualVariable>,
) {
    let pending: Vec<(usize, LiveRangeId, i32, SizeClass)> = {
        let inst = cfg.inst(inst_id);
        let lrs: Vec<Option<LiveRangeId>> = inst
            .def_slots()
            .map(|op| match op {
                Operand::Var(v) => v.associated_live_range,
                Operand::Imm(_) => None,
            })
            .collect();
        spilled_slots(&lrs, slots)
    };

    for (slot_index, lr, offset, size_class) in pending {
        let temp_id = cfg.ids_mut().next_temp();
        let fresh = VirtualVariable::temporary(temp_id, size_class);
        {
            let inst = cfg.inst_mut(inst_id);
            if let Some(op) = inst.def_slots_mut().nth(slot_index) {
                *op = Operand::Var(fresh.clone());
            }
        }
        let mut store = Instruction::new(InstId::from_index(0), Opcode::Store(size_class));
        store.source_register = Some(Operand::Var(fresh.clone()));
        store.offset = Some(offset as i64);
        cfg.insert_after(inst_id, store);
        currently_spilled.insert(lr, fresh);
    }
}
