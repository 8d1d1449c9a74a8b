//! The control-flow graph: the arena owning every block, instruction, and jump table in one
//! function, plus the edge-maintenance operations every later pass builds on.
//!
//! Grounded on `cranelift-codegen`'s `flowgraph::ControlFlowGraph`, generalised from a
//! recomputed-from-scratch analysis over an immutable `Function` into a graph that is itself the
//! mutable source of truth (the source back end's blocks hold their own predecessor/successor
//! lists directly, which this crate follows instead of cranelift's recompute-on-demand model,
//! since the postprocessor needs to mutate edges in place).

use crate::ids::{BlockId, IdAllocator, InstId, JumpTableId};
use crate::ir::block::{BasicBlock, BlockKind};
use crate::ir::instruction::Instruction;
use crate::ir::jump_table::JumpTable;
use std::collections::VecDeque;

/// Whether `link` installs one direction or both.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkDirection {
    /// `from` gains `to` as a successor and `to` gains `from` as a predecessor.
    Forward,
    /// Both directions, used for the rare case of linking an already-partially-linked pair
    /// symmetrically in one call.
    Both,
}

/// One function's worth of blocks, instructions, and jump tables.
pub struct ControlFlowGraph {
    ids: IdAllocator,
    blocks: Vec<BasicBlock>,
    instructions: Vec<Instruction>,
    jump_tables: Vec<JumpTable>,
}

impl ControlFlowGraph {
    pub fn new() -> Self {
        Self {
            ids: IdAllocator::new(),
            blocks: Vec::new(),
            instructions: Vec::new(),
            jump_tables: Vec::new(),
        }
    }

    /// Allocate a new, empty block.
    pub fn create_block(&mut self, kind: BlockKind) -> BlockId {
        let id = self.ids.next_block();
        debug_assert_eq!(id.index(), self.blocks.len());
        self.blocks.push(BasicBlock::new(id, kind));
        id
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.index()]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        &mut self.blocks[id.index()]
    }

    pub fn blocks(&self) -> impl Iterator<Item = &BasicBlock> {
        self.blocks.iter()
    }

    pub fn inst(&self, id: InstId) -> &Instruction {
        &self.instructions[id.index()]
    }

    pub fn inst_mut(&mut self, id: InstId) -> &mut Instruction {
        &mut self.instructions[id.index()]
    }

    /// Every instruction in `block`, leader to exit, in program order.
    pub fn instructions_in(&self, block: BlockId) -> Vec<InstId> {
        let mut result = Vec::new();
        let mut cursor = self.block(block).leader;
        while let Some(id) = cursor {
            result.push(id);
            cursor = self.inst(id).next;
        }
        result
    }

    /// Create `inst` with a freshly minted id and append it to the end of `block`.
    pub fn append_instruction(&mut self, block: BlockId, mut inst: Instruction) -> InstId {
        let id = self.ids.next_inst();
        debug_assert_eq!(id.index(), self.instructions.len());
        inst.id = id;
        inst.block_contained_in = Some(block);
        let prev_exit = self.block(block).exit;
        inst.prev = prev_exit;
        inst.next = None;
        self.instructions.push(inst);
        if let Some(prev_id) = prev_exit {
            self.inst_mut(prev_id).next = Some(id);
        } else {
            self.block_mut(block).leader = Some(id);
        }
        self.block_mut(block).exit = Some(id);
        id
    }

    /// Insert `inst` immediately after `after` in the same block as `after`.
    pub fn insert_after(&mut self, after: InstId, mut inst: Instruction) -> InstId {
        let id = self.ids.next_inst();
        debug_assert_eq!(id.index(), self.instructions.len());
        let block = self.inst(after).block_contained_in.expect("instruction not in a block");
        let next = self.inst(after).next;
        inst.id = id;
        inst.block_contained_in = Some(block);
        inst.prev = Some(after);
        inst.next = next;
        self.instructions.push(inst);
        self.inst_mut(after).next = Some(id);
        match next {
            Some(next_id) => self.inst_mut(next_id).prev = Some(id),
            None => self.block_mut(block).exit = Some(id),
        }
        id
    }

    /// Insert `inst` immediately before `before` in the same block as `before`.
    pub fn insert_before(&mut self, before: InstId, mut inst: Instruction) -> InstId {
        let id = self.ids.next_inst();
        debug_assert_eq!(id.index(), self.instructions.len());
        let block = self.inst(before).block_contained_in.expect("instruction not in a block");
        let prev = self.inst(before).prev;
        inst.id = id;
        inst.block_contained_in = Some(block);
        inst.prev = prev;
        inst.next = Some(before);
        self.instructions.push(inst);
        self.inst_mut(before).prev = Some(id);
        match prev {
            Some(prev_id) => self.inst_mut(prev_id).next = Some(id),
            None => self.block_mut(block).leader = Some(id),
        }
        id
    }

    /// Unlink `inst` from its block's instruction list. The `Instruction` itself stays in the
    /// arena (dead, unreachable from any block) so existing `InstId`s elsewhere never dangle.
    pub fn delete_instruction(&mut self, inst: InstId) {
        let block = self.inst(inst).block_contained_in.expect("instruction not in a block");
        let prev = self.inst(inst).prev;
        let next = self.inst(inst).next;
        match prev {
            Some(prev_id) => self.inst_mut(prev_id).next = next,
            None => self.block_mut(block).leader = next,
        }
        match next {
            Some(next_id) => self.inst_mut(next_id).prev = prev,
            None => self.block_mut(block).exit = prev,
        }
        self.inst_mut(inst).block_contained_in = None;
        self.inst_mut(inst).prev = None;
        self.inst_mut(inst).next = None;
    }

    /// Create a directed edge `from -> to`. Idempotent: linking the same pair twice leaves a
    /// single edge, since the postprocessor's block-merging pass can otherwise produce duplicate
    /// successors when two predecessors of a removed block both already pointed at its remaining
    /// neighbour.
    pub fn link(&mut self, from: BlockId, to: BlockId, direction: LinkDirection) {
        if !self.block(from).successors.contains(&to) {
            self.block_mut(from).successors.push(to);
        }
        if !self.block(to).predecessors.contains(&from) {
            self.block_mut(to).predecessors.push(from);
        }
        if direction == LinkDirection::Both {
            self.link(to, from, LinkDirection::Forward);
        }
    }

    /// Remove the directed edge `from -> to`, if present.
    pub fn unlink(&mut self, from: BlockId, to: BlockId) {
        self.block_mut(from).successors.retain(|&b| b != to);
        self.block_mut(to).predecessors.retain(|&b| b != from);
    }

    /// Allocate a jump table with `len` entries defaulting to `default_target`.
    pub fn create_jump_table(&mut self, len: usize, default_target: BlockId) -> JumpTableId {
        let id = self.ids.next_jump_table();
        debug_assert_eq!(id.index(), self.jump_tables.len());
        self.jump_tables.push(JumpTable::new(id, len, default_target));
        id
    }

    pub fn jump_table(&self, id: JumpTableId) -> &JumpTable {
        &self.jump_tables[id.index()]
    }

    pub fn jump_table_mut(&mut self, id: JumpTableId) -> &mut JumpTable {
        &mut self.jump_tables[id.index()]
    }

    pub fn jump_tables(&self) -> impl Iterator<Item = &JumpTable> {
        self.jump_tables.iter()
    }

    pub fn ids_mut(&mut self) -> &mut IdAllocator {
        &mut self.ids
    }

    /// Atomically rewrite every jump, conditional jump, and jump-table slot that targets `old` so
    /// it targets `new` instead, and repoints `old`'s predecessors/successors accordingly. Used by
    /// the postprocessor's `clean` pass when an empty block is removed or two blocks are merged,
    /// and required to touch jump tables too or a switch left dangling a stale block reference
    /// after the reordering pass discarded it.
    pub fn replace_target(&mut self, old: BlockId, new: BlockId) {
        if old == new {
            return;
        }
        let preds: Vec<BlockId> = self.block(old).predecessors.clone();
        for &pred in &preds {
            for inst_id in self.instructions_in(pred) {
                let inst = self.inst_mut(inst_id);
                if inst.if_block == Some(old) {
                    inst.if_block = Some(new);
                }
            }
            if let Some(table_id) = self.block(pred).jump_table {
                self.jump_table_mut(table_id).replace_target(old, new);
            }
            if self.block(pred).direct_successor == Some(old) {
                self.block_mut(pred).direct_successor = Some(new);
            }
            self.unlink(pred, old);
            self.link(pred, new, LinkDirection::Forward);
        }
        // `old` itself is typically `new`'s direct predecessor (the very edge being collapsed,
        // e.g. an empty block folded into its sole successor); once every other predecessor has
        // been redirected, `old` is orphaned and must not linger in `new`'s predecessor list.
        self.unlink(old, new);
    }

    /// Merge `second` into `first`: `first` must be `second`'s sole predecessor and `second` must
    /// be `first`'s sole successor, and neither may be `second` itself. `first`'s terminator (a
    /// fallthrough `Jmp` to `second`, by construction of the builder) is dropped and `second`'s
    /// instructions are appended in place; every edge `second` held to its own successors becomes
    /// an edge of `first`.
    pub fn merge(&mut self, first: BlockId, second: BlockId) {
        debug_assert_ne!(first, second);
        debug_assert_eq!(self.block(first).successors, vec![second]);
        debug_assert_eq!(self.block(second).predecessors, vec![first]);

        if let Some(exit) = self.block(first).exit {
            if self.inst(exit).opcode.is_unconditional_jump() {
                self.delete_instruction(exit);
            }
        }

        let moved: Vec<InstId> = self.instructions_in(second);
        for inst_id in moved {
            self.block_mut(second).leader = self.inst(inst_id).next;
            if let Some(next) = self.inst(inst_id).next {
                self.inst_mut(next).prev = None;
            } else {
                self.block_mut(second).exit = None;
            }
            self.inst_mut(inst_id).prev = None;
            self.inst_mut(inst_id).next = None;
            self.inst_mut(inst_id).block_contained_in = None;
            let prev_exit = self.block(first).exit;
            let new_inst_id = inst_id;
            self.inst_mut(new_inst_id).prev = prev_exit;
            self.inst_mut(new_inst_id).block_contained_in = Some(first);
            if let Some(prev_id) = prev_exit {
                self.inst_mut(prev_id).next = Some(new_inst_id);
            } else {
                self.block_mut(first).leader = Some(new_inst_id);
            }
            self.block_mut(first).exit = Some(new_inst_id);
        }

        self.unlink(first, second);
        let successors: Vec<BlockId> = self.block(second).successors.clone();
        for succ in successors {
            self.unlink(second, succ);
            self.link(first, succ, LinkDirection::Forward);
        }
        let direct = self.block(second).direct_successor;
        self.block_mut(first).direct_successor = direct;
        if !matches!(self.block(first).kind, BlockKind::FunctionEntry) {
            self.block_mut(first).kind = self.block(second).kind;
        }
        if let Some(table_id) = self.block(second).jump_table {
            self.block_mut(first).jump_table = Some(table_id);
            self.block_mut(first).kind = BlockKind::SwitchHead;
        }
    }

    /// Visit every block reachable from `entry` in post-order (each block emitted only after all
    /// of its successors have been). Used by liveness to compute a reverse post-order over the
    /// reverse graph.
    pub fn post_order_traversal(&mut self, entry: BlockId) -> Vec<BlockId> {
        for block in &mut self.blocks {
            block.visited = false;
        }
        let mut order = Vec::new();
        let mut stack: Vec<(BlockId, usize)> = vec![(entry, 0)];
        self.block_mut(entry).visited = true;
        while let Some((block, next_succ)) = stack.pop() {
            let successors = self.block(block).successors.clone();
            if next_succ < successors.len() {
                stack.push((block, next_succ + 1));
                let succ = successors[next_succ];
                if !self.block(succ).visited {
                    self.block_mut(succ).visited = true;
                    stack.push((succ, 0));
                }
            } else {
                order.push(block);
            }
        }
        for block in &mut self.blocks {
            block.visited = false;
        }
        order
    }

    /// Breadth-first traversal from `entry`, used by the postprocessor's reordering pass as its
    /// starting visitation order before it greedily re-threads `direct_successor` chains.
    pub fn breadth_first_from(&self, entry: BlockId) -> Vec<BlockId> {
        let mut seen = vec![false; self.blocks.len()];
        let mut order = Vec::new();
        let mut queue = VecDeque::new();
        queue.push_back(entry);
        seen[entry.index()] = true;
        while let Some(block) = queue.pop_front() {
            order.push(block);
            let unconditional_target = self.block(block).exit.and_then(|exit| {
                let inst = self.inst(exit);
                if inst.opcode.is_unconditional_jump() {
                    inst.if_block
                } else {
                    None
                }
            });
            let mut ordered_successors = Vec::new();
            if let Some(target) = unconditional_target {
                ordered_successors.push(target);
            }
            for &succ in &self.block(block).successors {
                if Some(succ) != unconditional_target {
                    ordered_successors.push(succ);
                }
            }
            for succ in ordered_successors {
                if !seen[succ.index()] {
                    seen[succ.index()] = true;
                    queue.push_back(succ);
                }
            }
        }
        order
    }
}

impl Default for ControlFlowGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::instruction::Instruction;
    use crate::ir::opcode::Opcode;

    #[test]
    fn append_and_walk_instructions() {
        let mut cfg = ControlFlowGraph::new();
        let b = cfg.create_block(BlockKind::Normal);
        let i0 = cfg.append_instruction(b, Instruction::new(InstId::from_index(0), Opcode::Ret));
        let i1 = cfg.append_instruction(b, Instruction::new(InstId::from_index(0), Opcode::Ret));
        assert_eq!(cfg.instructions_in(b), vec![i0, i1]);
        assert_eq!(cfg.block(b).leader, Some(i0));
        assert_eq!(cfg.block(b).exit, Some(i1));
    }

    #[test]
    fn link_is_idempotent() {
        let mut cfg = ControlFlowGraph::new();
        let a = cfg.create_block(BlockKind::Normal);
        let b = cfg.create_block(BlockKind::Normal);
        cfg.link(a, b, LinkDirection::Forward);
        cfg.link(a, b, LinkDirection::Forward);
        assert_eq!(cfg.block(a).successors, vec![b]);
        assert_eq!(cfg.block(b).predecessors, vec![a]);
    }

    #[test]
    fn replace_target_rewrites_jumps_and_edges() {
        let mut cfg = ControlFlowGraph::new();
        let a = cfg.create_block(BlockKind::Normal);
        let old = cfg.create_block(BlockKind::Normal);
        let new = cfg.create_block(BlockKind::Normal);
        cfg.link(a, old, LinkDirection::Forward);
        let mut jmp = Instruction::new(InstId::from_index(0), Opcode::Jmp);
        jmp.if_block = Some(old);
        cfg.append_instruction(a, jmp);

        cfg.replace_target(old, new);

        let jump_inst = cfg.instructions_in(a)[0];
        assert_eq!(cfg.inst(jump_inst).if_block, Some(new));
        assert_eq!(cfg.block(a).successors, vec![new]);
        assert!(cfg.block(old).predecessors.is_empty());
    }

    #[test]
    fn merge_concatenates_instructions_and_forwards_successors() {
        let mut cfg = ControlFlowGraph::new();
        let first = cfg.create_block(BlockKind::Normal);
        let second = cfg.create_block(BlockKind::Normal);
        let third = cfg.create_block(BlockKind::Normal);
        cfg.link(first, second, LinkDirection::Forward);
        cfg.link(second, third, LinkDirection::Forward);

        let jmp = Instruction::new(InstId::from_index(0), Opcode::Jmp);
        cfg.append_instruction(first, jmp);
        let marker = cfg.append_instruction(second, Instruction::new(InstId::from_index(0), Opcode::Ret));

        cfg.merge(first, second);

        assert_eq!(cfg.instructions_in(first), vec![marker]);
        assert_eq!(cfg.block(first).successors, vec![third]);
        assert_eq!(cfg.block(third).predecessors, vec![first]);
    }

    #[test]
    fn post_order_visits_successors_before_self() {
        let mut cfg = ControlFlowGraph::new();
        let a = cfg.create_block(BlockKind::Normal);
        let b = cfg.create_block(BlockKind::Normal);
        let c = cfg.create_block(BlockKind::Normal);
        cfg.link(a, b, LinkDirection::Forward);
        cfg.link(b, c, LinkDirection::Forward);
        let order = cfg.post_order_traversal(a);
        assert_eq!(order, vec![c, b, a]);
    }
}
