//! Three-address instructions.

use crate::ids::{BlockId, InstId};
use crate::ir::constant::Constant;
use crate::ir::opcode::Opcode;
use crate::ir::variable::VirtualVariable;

/// An operand: either a virtual variable or a typed compile-time constant.
#[derive(Clone, Debug)]
pub enum Operand {
    /// A virtual variable, pre- or post-allocation.
    Var(VirtualVariable),
    /// A typed immediate.
    Imm(Constant),
}

impl Operand {
    /// The variable carried by this operand, if it is one.
    pub fn as_var(&self) -> Option<&VirtualVariable> {
        match self {
            Operand::Var(v) => Some(v),
            Operand::Imm(_) => None,
        }
    }

    /// Mutable access to the variable carried by this operand, if it is one.
    pub fn as_var_mut(&mut self) -> Option<&mut VirtualVariable> {
        match self {
            Operand::Var(v) => Some(v),
            Operand::Imm(_) => None,
        }
    }
}

/// A single incoming edge of a phi-function: which predecessor block, and which variable
/// occurrence is live on that edge.
#[derive(Clone, Debug)]
pub struct PhiArg {
    /// The predecessor block this value flows in from.
    pub from_block: BlockId,
    /// The incoming variable occurrence. Perphi arguments are not treated as uses during
    /// live-range construction — they are resolved by `equal_up_to_ssa` matching against
    /// definitions produced in `from_block` or earlier.
    pub value: VirtualVariable,
}

/// A machine-level or synthetic three-address operation, doubly linked within its block.
///
/// Operand slots follow the source layout: `assignee` is the phi/compare-flag sink,
/// `destination_register`/`source_register`/`source_register2` are the ordinary three-address
/// operands, and the two `address_calc_reg` slots hold the base/index used to compute a memory
/// address for `Load`/`Store`/`Lea`. Exactly which slots a given opcode populates is documented on
/// the constructors below rather than enforced by the type (mirroring the source's one flat
/// instruction struct), but every pass in this crate accesses operands through the `operands`/
/// `operands_mut` iterators below rather than matching on fields directly, so adding a slot only
/// requires updating one place.
#[derive(Clone, Debug)]
pub struct Instruction {
    /// Stable handle, assigned once at construction.
    pub id: InstId,
    pub opcode: Opcode,
    /// True when a `Div`/`Idiv` wants its remainder (`RDX`) rather than its quotient (`RAX`).
    pub for_mod: bool,
    /// Phi/compare-flag sink.
    pub assignee: Option<Operand>,
    /// Ordinary destination operand.
    pub destination_register: Option<Operand>,
    /// First source operand. For `Call`, the callee's symbol name as
    /// `Operand::Imm(Constant::String(_))`; for `CallIndirect`, the register holding the computed
    /// callee address.
    pub source_register: Option<Operand>,
    /// Second source operand.
    pub source_register2: Option<Operand>,
    /// Base/index operands used to compute a memory address.
    pub address_calc_reg: [Option<Operand>; 2],
    /// Optional immediate displacement/shift-count/stack-adjust amount.
    pub offset: Option<i64>,
    /// Constant-or-variable argument list, used by `Call`/`CallIndirect`.
    pub call_params: Vec<Operand>,
    /// Branch target for jumps.
    pub if_block: Option<BlockId>,
    /// Incoming edges of a `Phi` instruction.
    pub phi_args: Vec<PhiArg>,
    pub block_contained_in: Option<BlockId>,
    pub prev: Option<InstId>,
    pub next: Option<InstId>,
}

impl Instruction {
    /// Construct a bare instruction with every optional slot empty. `cfg::ControlFlowGraph`'s
    /// `append_instruction`/`insert_after`/`insert_before` are the only code meant to set `id`,
    /// `block_contained_in`, `prev`, and `next` — callers build an instruction with this
    /// constructor and then hand it to the CFG.
    pub fn new(id: InstId, opcode: Opcode) -> Self {
        Self {
            id,
            opcode,
            for_mod: false,
            assignee: None,
            destination_register: None,
            source_register: None,
            source_register2: None,
            address_calc_reg: [None, None],
            offset: None,
            call_params: Vec::new(),
            if_block: None,
            phi_args: Vec::new(),
            block_contained_in: None,
            prev: None,
            next: None,
        }
    }

    /// Every operand slot that is a *definition*: `assignee` and `destination_register`.
    ///
    /// `Call`/`CallIndirect` use `destination_register` for the returned value (precoloured to
    /// `RAX`,); `Phi` and `SetCc` use `assignee`.
    pub fn def_slots(&self) -> impl Iterator<Item = &Operand> {
        self.assignee.iter().chain(self.destination_register.iter())
    }

    /// Mutable version of [`Instruction::def_slots`].
    pub fn def_slots_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        self.assignee
            .iter_mut()
            .chain(self.destination_register.iter_mut())
    }

    /// Every non-phi operand slot that is a *use*: both source registers, the two address-calc
    /// registers, and the call-parameter list. This iterator only ever reports slots that are
    /// *exclusively* reads. For opcodes where `destination_register` is also read (two-operand x86
    /// arithmetic, `Opcode::is_two_operand_arithmetic`), the interference builder handles that
    /// separately by keeping the destination's live range in `livenow` across the instruction
    /// instead of ending it there; it does not come through this iterator at all.
    pub fn use_slots(&self) -> impl Iterator<Item = &Operand> {
        self.source_register
            .iter()
            .chain(self.source_register2.iter())
            .chain(self.address_calc_reg[0].iter())
            .chain(self.address_calc_reg[1].iter())
            .chain(self.call_params.iter())
    }

    /// Mutable version of [`Instruction::use_slots`].
    pub fn use_slots_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        self.source_register
            .iter_mut()
            .chain(self.source_register2.iter_mut())
            .chain(self.address_calc_reg[0].iter_mut())
            .chain(self.address_calc_reg[1].iter_mut())
            .chain(self.call_params.iter_mut())
    }

    /// Every variable-carrying operand slot except phi arguments, read and write alike. Used by
    /// passes (coalescing, spill rewriting) that need to touch every place a live range's
    /// variables can appear.
    pub fn all_slots_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        self.assignee
            .iter_mut()
            .chain(self.destination_register.iter_mut())
            .chain(self.source_register.iter_mut())
            .chain(self.source_register2.iter_mut())
            .chain(self.address_calc_reg[0].iter_mut())
            .chain(self.address_calc_reg[1].iter_mut())
            .chain(self.call_params.iter_mut())
    }

    /// Is this a pure copy: a plain-width `Mov` between two register operands with no
    /// indirection? Used by both coalescing and useless-move elimination.
    pub fn is_pure_copy(&self) -> bool {
        self.opcode.is_copy_shaped()
            && matches!(self.destination_register, Some(Operand::Var(_)))
            && matches!(self.source_register, Some(Operand::Var(_)))
            && self.source_register2.is_none()
            && self.address_calc_reg == [None, None]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::TempId;
    use crate::ir::types::SizeClass;

    fn var(n: u32) -> Operand {
        Operand::Var(VirtualVariable::temporary(
            TempId::from_index(n),
            SizeClass::Dword,
        ))
    }

    #[test]
    fn pure_copy_detection() {
        let mut mov = Instruction::new(InstId::from_index(0), Opcode::Mov(SizeClass::Dword));
        mov.destination_register = Some(var(0));
        mov.source_register = Some(var(1));
        assert!(mov.is_pure_copy());

        mov.address_calc_reg[0] = Some(var(2));
        assert!(!mov.is_pure_copy());
    }

    #[test]
    fn def_and_use_slots_partition_correctly() {
        let mut add = Instruction::new(InstId::from_index(0), Opcode::Add(SizeClass::Dword));
        add.destination_register = Some(var(0));
        add.source_register = Some(var(1));
        assert_eq!(add.def_slots().count(), 1);
        assert_eq!(add.use_slots().count(), 1);
    }
}
