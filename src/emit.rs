//! GAS/AT&T assembly emission: the last stage, turning a post-allocation, post-reordering
//! `ControlFlowGraph` into text.
//!
//! Every operand at this point resolves to a physical register (via `fixed_register` or
//! `associated_live_range`'s colour) or a frame-relative spill slot (`stack_offset`); there is no
//! remaining virtual-variable indirection for the emitter to hide, mirroring the source back end's
//! final "codegen" pass over an already-allocated instruction stream.

use crate::cfg::ControlFlowGraph;
use crate::ids::BlockId;
use crate::ir::function::FunctionRecord;
use crate::ir::instruction::{Instruction, Operand};
use crate::ir::opcode::Opcode;
use crate::ir::variable::VirtualVariable;
use crate::isa::registers::Gpr;
use crate::regalloc::live_range::LiveRange;
use std::fmt::Write as _;
use std::io::{self, Write as _};

fn operand_text(operand: &Operand, ranges: &[LiveRange]) -> String {
    match operand {
        Operand::Imm(c) => c.to_string(),
        Operand::Var(var) => variable_text(var, ranges),
    }
}

fn variable_text(var: &VirtualVariable, ranges: &[LiveRange]) -> String {
    if let Some(reg) = var.fixed_register {
        return reg.to_string();
    }
    if let Some(lr) = var.associated_live_range {
        let range = &ranges[lr.index()];
        if let Some(color) = range.color {
            return color.to_string();
        }
        if let Some(offset) = var.stack_offset {
            return format!("{}(%rbp)", offset);
        }
    }
    if let Some(offset) = var.stack_offset {
        return format!("{}(%rbp)", offset);
    }
    // A variable with neither a colour nor a stack slot reached the emitter; this is a bug in an
    // earlier pass, not a condition this stage can recover from.
    panic!("variable {} reached emission with no assigned location", var);
}

/// Render a `Load`/`Store`/`Lea`'s memory operand: `offset(base, index)` when an index register
/// is present, `offset(base)` otherwise, or a bare `offset(%rbp)` frame slot when neither
/// address-calc register is populated (the convention `regalloc::spill` uses for spill traffic).
fn memory_operand_text(inst: &Instruction, ranges: &[LiveRange]) -> String {
    let offset = inst.offset.unwrap_or(0);
    match (&inst.address_calc_reg[0], &inst.address_calc_reg[1]) {
        (None, None) => format!("{}(%rbp)", offset),
        (Some(base), None) => format!("{}({})", offset, operand_text(base, ranges)),
        (Some(base), Some(index)) => {
            format!("{}({}, {})", offset, operand_text(base, ranges), operand_text(index, ranges))
        }
        (None, Some(index)) => format!("{}(, {})", offset, operand_text(index, ranges)),
    }
}

fn emit_instruction(out: &mut String, inst: &Instruction, ranges: &[LiveRange]) {
    match inst.opcode {
        // Always resolved to a no-op before emission by `postprocess::useless_moves`.
        Opcode::Phi => {}
        // `offset` carries the signed byte delta `regalloc::prologue_epilogue` computed: positive
        // reserves the frame (`sub`), negative releases it (`add` of the absolute value).
        Opcode::StackAdjust => {
            let delta = inst.offset.unwrap_or(0);
            if delta > 0 {
                let _ = writeln!(out, "\tsubq\t${}, %rsp", delta);
            } else if delta < 0 {
                let _ = writeln!(out, "\taddq\t${}, %rsp", -delta);
            }
        }
        Opcode::Call => {
            // A direct call's target is the callee's symbol name, carried as a string constant
            // rather than an address computed into a register; printed bare, not quoted.
            let name = match inst.source_register.as_ref() {
                Some(Operand::Imm(crate::ir::constant::Constant::String(name))) => name.clone(),
                _ => panic!("direct call target must be a symbol-name string constant"),
            };
            let _ = writeln!(out, "\tcall\t{}", name);
        }
        Opcode::CallIndirect => {
            let target = inst.source_register.as_ref().expect("indirect call target");
            let _ = writeln!(out, "\tcall\t*{}", operand_text(target, ranges));
        }
        Opcode::Jmp | Opcode::Jcc(_) => {
            if let Some(target) = inst.if_block {
                let _ = writeln!(out, "\t{}\t.L{}", inst.opcode, target);
            }
        }
        Opcode::JmpIndirect => {
            let target = inst.source_register.as_ref().expect("indirect jump target");
            let _ = writeln!(out, "\tjmp\t*{}", operand_text(target, ranges));
        }
        Opcode::Ret => {
            let _ = writeln!(out, "\tret");
        }
        Opcode::Push | Opcode::Pop => {
            let operand = inst
                .destination_register
                .as_ref()
                .or(inst.source_register.as_ref())
                .expect("push/pop operand");
            let _ = writeln!(out, "\t{}\t{}", inst.opcode, operand_text(operand, ranges));
        }
        Opcode::Cltd | Opcode::Cqto => {
            let _ = writeln!(out, "\t{}", inst.opcode);
        }
        Opcode::Load(_) => {
            let dest = inst.destination_register.as_ref().expect("load destination");
            let _ = writeln!(out, "\t{}\t{}, {}", inst.opcode, memory_operand_text(inst, ranges), operand_text(dest, ranges));
        }
        Opcode::Store(_) => {
            let src = inst.source_register.as_ref().expect("store source");
            let _ = writeln!(out, "\t{}\t{}, {}", inst.opcode, operand_text(src, ranges), memory_operand_text(inst, ranges));
        }
        Opcode::Lea => {
            let dest = inst.destination_register.as_ref().expect("lea destination");
            let _ = writeln!(out, "\tlea\t{}, {}", memory_operand_text(inst, ranges), operand_text(dest, ranges));
        }
        Opcode::Mov(_) => {
            let dest = inst.destination_register.as_ref().expect("mov destination");
            let src = inst.source_register.as_ref().expect("mov source");
            let _ = writeln!(out, "\t{}\t{}, {}", inst.opcode, operand_text(src, ranges), operand_text(dest, ranges));
        }
        Opcode::SetCc(_) => {
            let dest = inst.assignee.as_ref().expect("setcc destination");
            let _ = writeln!(out, "\t{}\t{}", inst.opcode, operand_text(dest, ranges));
        }
        Opcode::Div(_) | Opcode::Idiv(_) => {
            // The dividend (RDX:RAX) and quotient/remainder destination are implicit per System V
            // precolouring; the only operand printed is the divisor.
            let divisor = inst.source_register2.as_ref().expect("divisor operand");
            let _ = writeln!(out, "\t{}\t{}", inst.opcode, operand_text(divisor, ranges));
        }
        Opcode::Cmp(_) | Opcode::Test(_) => {
            let lhs = inst.source_register.as_ref().expect("comparison lhs");
            let rhs = inst.source_register2.as_ref().expect("comparison rhs");
            let _ = writeln!(out, "\t{}\t{}, {}", inst.opcode, operand_text(rhs, ranges), operand_text(lhs, ranges));
        }
        // Two-operand x86 arithmetic/logical/shift ops: `destination_register` is read and
        // written. Its entering value is supposed to equal `source_register`'s, but nothing
        // upstream of emission guarantees that (the IR builder can hand `emit_binary` a `dest`
        // distinct from `lhs`), so land `lhs` in `dest` with an explicit `mov` first whenever
        // colouring didn't already put them in the same place.
        Opcode::Add(sz) | Opcode::Sub(sz) | Opcode::Imul(sz) | Opcode::And(sz) | Opcode::Or(sz)
        | Opcode::Xor(sz) | Opcode::Shl(sz) | Opcode::Shr(sz) | Opcode::Sar(sz) => {
            let dest = inst.destination_register.as_ref().expect("arithmetic destination");
            let lhs = inst.source_register.as_ref().expect("arithmetic left operand");
            let rhs = inst.source_register2.as_ref().expect("arithmetic right operand");
            let dest_text = operand_text(dest, ranges);
            let lhs_text = operand_text(lhs, ranges);
            if lhs_text != dest_text {
                let _ = writeln!(out, "\tmov{}\t{}, {}", sz.suffix(), lhs_text, dest_text);
            }
            let _ = writeln!(out, "\t{}\t{}, {}", inst.opcode, operand_text(rhs, ranges), dest_text);
        }
    }
}

/// Render one function's body, in `order`, to AT&T assembly text, including its jump tables'
/// `.rodata` entries.
pub fn emit_function(
    cfg: &ControlFlowGraph,
    function: &FunctionRecord,
    ranges: &[LiveRange],
    order: &[BlockId],
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\t.text");
    let _ = writeln!(out, "\t.globl\t{}", function.name);
    let _ = writeln!(out, "\t.type\t{}, @function", function.name);
    let _ = writeln!(out, "{}:", function.name);

    for &block in order {
        let _ = writeln!(out, ".L{}:", block);
        for inst_id in cfg.instructions_in(block) {
            emit_instruction(&mut out, cfg.inst(inst_id), ranges);
        }
    }

    let _ = writeln!(out, "\t.size\t{}, . - {}", function.name, function.name);

    for table in cfg.jump_tables() {
        let _ = write!(out, "{}", table);
    }

    out
}

/// Write already-rendered assembly text to `writer`, surfacing I/O failure as [`CodegenError`].
///
/// [`CodegenError`]: crate::error::CodegenError
pub fn write_assembly(writer: &mut impl io::Write, text: &str) -> crate::error::CodegenResult<()> {
    writer.write_all(text.as_bytes())?;
    Ok(())
}
