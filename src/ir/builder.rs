//! Typed emission helpers the front end uses to lower expressions into three-address form.
//!
//! `IrBuilder` owns the running SSA generation counter per symbol and mints fresh temporaries; it
//! does not own the `ControlFlowGraph` it writes into; both are threaded through explicitly so a
//! caller can interleave builder calls with direct `ControlFlowGraph` edge manipulation (entry/exit
//! block wiring, phi insertion) without fighting a borrow.

use crate::cfg::ControlFlowGraph;
use crate::front_end::SymbolRecord;
use crate::ids::{BlockId, TempId};
use crate::ir::instruction::{Instruction, Operand};
use crate::ir::opcode::Opcode;
use crate::ir::types::SizeClass;
use crate::ir::variable::VirtualVariable;
use std::collections::HashMap;
use std::rc::Rc;

/// Tracks the next SSA generation to hand out for each symbol, keyed by pointer identity so two
/// distinct symbols with the same source name never share a counter.
#[derive(Default)]
pub struct IrBuilder {
    generations: HashMap<*const SymbolRecord, u32>,
}

impl IrBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next occurrence of `symbol`, advancing its counter.
    pub fn next_occurrence(&mut self, symbol: Rc<SymbolRecord>, size_class: SizeClass) -> VirtualVariable {
        let key = Rc::as_ptr(&symbol);
        let generation = self.generations.entry(key).or_insert(0);
        let this_generation = *generation;
        *generation += 1;
        VirtualVariable::symbol(symbol, this_generation, size_class)
    }

    /// Mint a fresh compiler-generated temporary, generation 0 by construction.
    pub fn fresh_temporary(&self, cfg: &mut ControlFlowGraph, size_class: SizeClass) -> VirtualVariable {
        let id: TempId = cfg.ids_mut().next_temp();
        VirtualVariable::temporary(id, size_class)
    }

    /// Emit `dest = lhs op rhs` into `block`.
    pub fn emit_binary(
        &self,
        cfg: &mut ControlFlowGraph,
        block: BlockId,
        opcode: Opcode,
        dest: VirtualVariable,
        lhs: Operand,
        rhs: Operand,
    ) {
        let mut inst = Instruction::new(crate::ids::InstId::from_index(0), opcode);
        inst.destination_register = Some(Operand::Var(dest));
        inst.source_register = Some(lhs);
        inst.source_register2 = Some(rhs);
        cfg.append_instruction(block, inst);
    }

    /// Emit `dest = src` (a plain-width `Mov`) into `block`.
    pub fn emit_assignment(&self, cfg: &mut ControlFlowGraph, block: BlockId, dest: VirtualVariable, src: Operand) {
        let size_class = dest.size_class;
        let mut inst = Instruction::new(crate::ids::InstId::from_index(0), Opcode::Mov(size_class));
        inst.destination_register = Some(Operand::Var(dest));
        inst.source_register = Some(src);
        cfg.append_instruction(block, inst);
    }

    /// Emit `dest = <constant>` into `block`. A thin wrapper over `emit_assignment` that exists
    /// because the front end's constant-folding path is the single heaviest caller of this shape.
    pub fn emit_assignment_of_constant(
        &self,
        cfg: &mut ControlFlowGraph,
        block: BlockId,
        dest: VirtualVariable,
        constant: crate::ir::constant::Constant,
    ) {
        self.emit_assignment(cfg, block, dest, Operand::Imm(constant));
    }

    /// Emit an unconditional return from `block`. `value` is `None` for a `void` function.
    pub fn emit_return(&self, cfg: &mut ControlFlowGraph, block: BlockId, value: Option<Operand>) {
        let mut inst = Instruction::new(crate::ids::InstId::from_index(0), Opcode::Ret);
        inst.source_register = value;
        cfg.append_instruction(block, inst);
    }

    /// Emit a typed conditional jump: compare `lhs`/`rhs` at `size_class`, then `Jcc` to `target`.
    pub fn emit_typed_conditional_jump(
        &self,
        cfg: &mut ControlFlowGraph,
        block: BlockId,
        size_class: SizeClass,
        condition: crate::ir::opcode::ConditionCode,
        lhs: Operand,
        rhs: Operand,
        target: BlockId,
    ) {
        let mut cmp = Instruction::new(crate::ids::InstId::from_index(0), Opcode::Cmp(size_class));
        cmp.source_register = Some(lhs);
        cmp.source_register2 = Some(rhs);
        cfg.append_instruction(block, cmp);

        let mut jcc = Instruction::new(crate::ids::InstId::from_index(0), Opcode::Jcc(condition));
        jcc.if_block = Some(target);
        cfg.append_instruction(block, jcc);
    }

    /// Emit an unconditional jump to `target`, recording it as `block`'s direct successor.
    pub fn emit_jump(&self, cfg: &mut ControlFlowGraph, block: BlockId, target: BlockId) {
        let mut inst = Instruction::new(crate::ids::InstId::from_index(0), Opcode::Jmp);
        inst.if_block = Some(target);
        cfg.append_instruction(block, inst);
        cfg.block_mut(block).direct_successor = Some(target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::block::BlockKind;
    use crate::ir::constant::Constant;

    #[test]
    fn generations_advance_per_symbol_independently() {
        let mut builder = IrBuilder::new();
        let x = SymbolRecord::local("x");
        let y = SymbolRecord::local("y");
        let x0 = builder.next_occurrence(Rc::clone(&x), SizeClass::Dword);
        let x1 = builder.next_occurrence(Rc::clone(&x), SizeClass::Dword);
        let y0 = builder.next_occurrence(y, SizeClass::Dword);
        assert_eq!(x0.generation, 0);
        assert_eq!(x1.generation, 1);
        assert_eq!(y0.generation, 0);
        assert!(x0.equal_up_to_ssa(&x1));
    }

    #[test]
    fn emit_assignment_of_constant_produces_a_mov() {
        let mut cfg = ControlFlowGraph::new();
        let block = cfg.create_block(BlockKind::Normal);
        let builder = IrBuilder::new();
        let dest = builder.fresh_temporary(&mut cfg, SizeClass::Dword);
        builder.emit_assignment_of_constant(&mut cfg, block, dest, Constant::I32(3));
        let insts = cfg.instructions_in(block);
        assert_eq!(insts.len(), 1);
        assert!(matches!(cfg.inst(insts[0]).opcode, Opcode::Mov(SizeClass::Dword)));
    }
}
