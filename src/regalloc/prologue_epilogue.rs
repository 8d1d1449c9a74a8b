//! Callee-saved register preservation and caller-saved register protection around calls.
//!
//! Runs once colouring has committed every range to a physical register, since only then is it
//! known which callee-saved registers this function actually touched (pushing/popping the full
//! callee-saved set regardless would be correct but wasteful, and the source back end is careful
//! to only save what it used).

use crate::cfg::ControlFlowGraph;
use crate::ids::{BlockId, InstId, LiveRangeId};
use crate::ir::block::BlockKind;
use crate::ir::function::FunctionRecord;
use crate::ir::instruction::Instruction;
use crate::ir::opcode::Opcode;
use crate::isa::registers::{Gpr, PhysReg, RegisterSet, ALLOCATABLE_GPRS};
use crate::regalloc::live_range::LiveRange;
use std::collections::{BTreeSet, HashMap};

/// Record which physical registers any coloured, non-eliminated range ended up assigned to.
pub fn collect_used_registers(ranges: &[LiveRange]) -> RegisterSet {
    let mut used = RegisterSet::empty();
    for range in ranges {
        if range.eliminated {
            continue;
        }
        if let Some(color) = range.color {
            used.insert(color);
        }
    }
    used
}

/// Insert the callee-save push sequence at the top of `entry` and the matching pop sequence
/// immediately before every `Ret` in the function, and reserve/release `function.stack_frame_size`
/// bytes of locals around them.
pub fn inject_callee_saves(cfg: &mut ControlFlowGraph, function: &FunctionRecord) {
    let to_save: Vec<Gpr> = ALLOCATABLE_GPRS
        .iter()
        .copied()
        .filter(|&r| r.is_callee_saved() && function.used_registers.contains_gpr(r))
        .collect();

    if let Some(leader) = cfg.block(function.entry_block).leader {
        let mut adjust = Instruction::new(crate::ids::InstId::from_index(0), Opcode::StackAdjust);
        adjust.offset = Some(function.stack_frame_size as i64);
        let mut cursor = cfg.insert_before(leader, adjust);
        for &reg in &to_save {
            let mut push = Instruction::new(crate::ids::InstId::from_index(0), Opcode::Push);
            push.source_register = Some(crate::ir::instruction::Operand::Var(
                physical_stand_in(cfg, reg),
            ));
            cursor = cfg.insert_after(cursor, push);
        }
    } else {
        // An empty entry block still needs its frame reserved.
        let mut adjust = Instruction::new(crate::ids::InstId::from_index(0), Opcode::StackAdjust);
        adjust.offset = Some(function.stack_frame_size as i64);
        cfg.append_instruction(function.entry_block, adjust);
    }

    let ret_blocks: Vec<BlockId> = cfg
        .blocks()
        .filter(|b| matches!(b.kind, BlockKind::FunctionExit))
        .map(|b| b.id)
        .collect();
    for block in ret_blocks {
        let ret_inst = match cfg.instructions_in(block).into_iter().find(|&i| matches!(cfg.inst(i).opcode, Opcode::Ret)) {
            Some(i) => i,
            None => continue,
        };
        for &reg in to_save.iter().rev() {
            let mut pop = Instruction::new(crate::ids::InstId::from_index(0), Opcode::Pop);
            pop.destination_register = Some(crate::ir::instruction::Operand::Var(physical_stand_in(cfg, reg)));
            cfg.insert_before(ret_inst, pop);
        }
        let mut release = Instruction::new(crate::ids::InstId::from_index(0), Opcode::StackAdjust);
        release.offset = Some(-(function.stack_frame_size as i64));
        cfg.insert_before(ret_inst, release);
    }
}

/// A post-colouring instruction's register operands are physical, but this crate's `Instruction`
/// only carries `VirtualVariable`s in its operand slots; push/pop operands generated here name
/// their register directly via `VirtualVariable::fixed` rather than through `associated_live_range`,
/// since they are synthesised after colouring has already run to completion.
fn physical_stand_in(cfg: &mut ControlFlowGraph, reg: Gpr) -> crate::ir::variable::VirtualVariable {
    let id = cfg.ids_mut().next_temp();
    crate::ir::variable::VirtualVariable::fixed(PhysReg::Gpr(reg), crate::ir::types::SizeClass::Qword, id)
}

/// Insert a caller-saved-register push before every `Call`/`CallIndirect` and the matching pop
/// immediately after, narrowed per call site to the registers actually live across that one call:
/// `call_live_ranges` (from `interference::call_site_live_ranges`) gives, for each call
/// instruction, the live ranges alive immediately after it returns; any of those coloured to a
/// caller-saved register would otherwise be clobbered by the callee.
pub fn inject_caller_saves(
    cfg: &mut ControlFlowGraph,
    ranges: &[LiveRange],
    call_live_ranges: &HashMap<InstId, BTreeSet<LiveRangeId>>,
) {
    let block_ids: Vec<_> = cfg.blocks().map(|b| b.id).collect();
    for block in block_ids {
        let call_insts: Vec<_> = cfg
            .instructions_in(block)
            .into_iter()
            .filter(|&i| matches!(cfg.inst(i).opcode, Opcode::Call | Opcode::CallIndirect))
            .collect();
        for call_inst in call_insts {
            let live = match call_live_ranges.get(&call_inst) {
                Some(live) => live,
                None => continue,
            };
            let to_protect: Vec<Gpr> = ALLOCATABLE_GPRS
                .iter()
                .copied()
                .filter(|&r| {
                    r.is_caller_saved()
                        && live.iter().any(|&lr| {
                            !ranges[lr.index()].eliminated && ranges[lr.index()].color == Some(PhysReg::Gpr(r))
                        })
                })
                .collect();
            if to_protect.is_empty() {
                continue;
            }
            for &reg in to_protect.iter().rev() {
                let mut push = Instruction::new(crate::ids::InstId::from_index(0), Opcode::Push);
                push.source_register = Some(crate::ir::instruction::Operand::Var(physical_stand_in(cfg, reg)));
                cfg.insert_before(call_inst, push);
            }
            let mut after = call_inst;
            for &reg in &to_protect {
                let mut pop = Instruction::new(crate::ids::InstId::from_index(0), Opcode::Pop);
                pop.destination_register = Some(crate::ir::instruction::Operand::Var(physical_stand_in(cfg, reg)));
                after = cfg.insert_after(after, pop);
            }
        }
    }
}
