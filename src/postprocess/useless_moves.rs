//! Delete `Mov` instructions that became no-ops once colouring committed a register to each side.
//!
//! Coalescing already folds every pure copy whose ranges don't interfere, but a copy between two
//! ranges that *do* interfere can still end up coloured identically by coincidence (most often a
//! parameter or return-value move whose destination was separately precoloured to the same
//! register the source already held), and every phi in the function is, by construction, exactly
//! this: its assignee and every incoming argument were unioned into one live range before
//! colouring ever ran, so a `Phi` left in the IR is always a no-op once allocation is done.

use crate::cfg::ControlFlowGraph;
use crate::ir::instruction::Operand;
use crate::ir::opcode::Opcode;
use crate::ir::variable::VirtualVariable;
use crate::isa::registers::PhysReg;
use crate::regalloc::live_range::LiveRange;

fn resolved_register(var: &VirtualVariable, ranges: &[LiveRange]) -> Option<PhysReg> {
    if let Some(reg) = var.fixed_register {
        return Some(reg);
    }
    var.associated_live_range.and_then(|lr| ranges[lr.index()].color)
}

/// Remove every `Phi` (always a no-op post-allocation) and every pure-copy `Mov` whose source and
/// destination resolved to the same physical register.
pub fn remove(cfg: &mut ControlFlowGraph, ranges: &[LiveRange]) {
    let block_ids: Vec<_> = cfg.blocks().map(|b| b.id).collect();
    for block in block_ids {
        for inst_id in cfg.instructions_in(block) {
            let inst = cfg.inst(inst_id);
            if matches!(inst.opcode, Opcode::Phi) {
                cfg.delete_instruction(inst_id);
                continue;
            }
            if !inst.is_pure_copy() {
                continue;
            }
            let (dest, src) = match (&inst.destination_register, &inst.source_register) {
                (Some(Operand::Var(d)), Some(Operand::Var(s))) => (d, s),
                _ => continue,
            };
            let dest_reg = resolved_register(dest, ranges);
            let src_reg = resolved_register(src, ranges);
            if dest_reg.is_some() && dest_reg == src_reg {
                cfg.delete_instruction(inst_id);
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
    use crate::isa::registers::Gpr;

    fn fixed(reg: Gpr, next_id: &mut u32) -> VirtualVariable {
        let id = crate::ids::TempId::from_index(*next_id);
        *next_id += 1;
        VirtualVariable::fixed(PhysReg::Gpr(reg), SizeClass::Qword, id)
    }

    #[test]
    fn move_between_identical_fixed_registers_is_removed() {
        let mut cfg = ControlFlowGraph::new();
        let block = cfg.create_block(BlockKind::Normal);
        let mut next_id = 0;
        let mut mov = Instruction::new(InstId::from_index(0), Opcode::Mov(SizeClass::Qword));
        mov.destination_register = Some(Operand::Var(fixed(Gpr::Rax, &mut next_id)));
        mov.source_register = Some(Operand::Var(fixed(Gpr::Rax, &mut next_id)));
        let mov_id = cfg.append_instruction(block, mov);

        remove(&mut cfg, &[]);

        assert!(!cfg.instructions_in(block).contains(&mov_id));
    }

    #[test]
    fn move_between_distinct_fixed_registers_survives() {
        let mut cfg = ControlFlowGraph::new();
        let block = cfg.create_block(BlockKind::Normal);
        let mut next_id = 0;
        let mut mov = Instruction::new(InstId::from_index(0), Opcode::Mov(SizeClass::Qword));
        mov.destination_register = Some(Operand::Var(fixed(Gpr::Rax, &mut next_id)));
        mov.source_register = Some(Operand::Var(fixed(Gpr::Rdi, &mut next_id)));
        let mov_id = cfg.append_instruction(block, mov);

        remove(&mut cfg, &[]);

        assert!(cfg.instructions_in(block).contains(&mov_id));
    }
}
