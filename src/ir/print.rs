//! Textual dumps of a function, used by `Flags::print_irs`/`Flags::enable_debug_printing` between
//! pipeline stages rather than by the emitter (which only ever produces assembly).

use crate::cfg::ControlFlowGraph;
use crate::ids::BlockId;
use crate::ir::instruction::Operand;
use crate::ir::opcode::Opcode;
use std::fmt::Write;

/// Which operand representation a dump should use.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrintMode {
    /// Operands printed as `name.generation`, before live ranges exist.
    VariableInline,
    /// Operands printed as their associated live range, after live-range construction but before
    /// colouring.
    LiveRanges,
    /// Operands printed as physical registers, after colouring. `Phi` instructions are suppressed
    /// in this mode: by the time colouring has run, every phi has already been resolved into the
    /// copies that implement it, and an uncoloured phi left dangling in the dump would look like a
    /// bug rather than the expected post-allocation shape.
    Registers,
}

fn print_operand(out: &mut String, operand: &Operand, mode: PrintMode) {
    match operand {
        Operand::Imm(c) => {
            let _ = write!(out, "{}", c);
        }
        Operand::Var(var) => match mode {
            PrintMode::VariableInline => {
                let _ = write!(out, "{}", var);
            }
            PrintMode::LiveRanges => match var.associated_live_range {
                Some(lr) => {
                    let _ = write!(out, "{}", lr);
                }
                None => {
                    let _ = write!(out, "{}", var);
                }
            },
            PrintMode::Registers => {
                let _ = write!(out, "{}", var);
            }
        },
    }
}

/// Render `cfg` to GAS-adjacent but non-assembleable pseudo-text, for inspection only.
pub fn print_function(cfg: &ControlFlowGraph, entry: BlockId, mode: PrintMode) -> String {
    let mut out = String::new();
    for block in cfg.blocks() {
        let _ = writeln!(out, "block{}:{}", block.id, if block.id == entry { " ; entry" } else { "" });
        for inst_id in cfg.instructions_in(block.id) {
            let inst = cfg.inst(inst_id);
            if mode == PrintMode::Registers && matches!(inst.opcode, Opcode::Phi) {
                continue;
            }
            out.push_str("    ");
            if let Some(assignee) = &inst.assignee {
                print_operand(&mut out, assignee, mode);
                out.push_str(" = ");
            } else if let Some(dest) = &inst.destination_register {
                print_operand(&mut out, dest, mode);
                out.push_str(" = ");
            }
            let _ = write!(out, "{}", inst.opcode);
            if let Some(src) = &inst.source_register {
                out.push(' ');
                print_operand(&mut out, src, mode);
            }
            if let Some(src2) = &inst.source_register2 {
                out.push_str(", ");
                print_operand(&mut out, src2, mode);
            }
            if let Some(target) = inst.if_block {
                let _ = write!(out, " -> block{}", target);
            }
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::block::BlockKind;
    use crate::ir::constant::Constant;
    use crate::ir::instruction::Instruction;
    use crate::ir::types::SizeClass;

    #[test]
    fn registers_mode_suppresses_phi() {
        let mut cfg = ControlFlowGraph::new();
        let block = cfg.create_block(BlockKind::Normal);
        let mut phi = Instruction::new(crate::ids::InstId::from_index(0), Opcode::Phi);
        phi.assignee = Some(Operand::Imm(Constant::I32(0)));
        cfg.append_instruction(block, phi);
        let mut ret = Instruction::new(crate::ids::InstId::from_index(0), Opcode::Ret);
        ret.source_register = Some(Operand::Imm(Constant::I32(0)));
        cfg.append_instruction(block, ret);

        let text = print_function(&cfg, block, PrintMode::Registers);
        assert!(!text.contains("phi"));
        assert!(text.contains("ret"));

        let inline_text = print_function(&cfg, block, PrintMode::VariableInline);
        assert!(inline_text.contains("phi"));
        let _ = SizeClass::Dword;
    }
}
