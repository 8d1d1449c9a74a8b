//! Switch-dispatch jump tables.

use crate::ids::{BlockId, JumpTableId};
use std::fmt;

/// A dense array of block targets, indexed by a bounds-checked switch selector and emitted to
/// `.rodata` as an array of 8-byte block-label pointers.
#[derive(Clone, Debug)]
pub struct JumpTable {
    pub id: JumpTableId,
    entries: Vec<BlockId>,
}

impl JumpTable {
    /// Allocate a table with `len` entries, all initially pointing at `default_target` (the
    /// switch's default/out-of-range case); `set` then overwrites the in-range entries.
    pub fn new(id: JumpTableId, len: usize, default_target: BlockId) -> Self {
        Self {
            id,
            entries: vec![default_target; len],
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Overwrite the target at `index`. Panics on out-of-range index: the switch lowering that
    /// populates a table always knows its own bounds, so an out-of-range `set` is a builder bug,
    /// not a runtime condition.
    pub fn set(&mut self, index: usize, target: BlockId) {
        self.entries[index] = target;
    }

    /// The target stored at `index`, if in range.
    pub fn get(&self, index: usize) -> Option<BlockId> {
        self.entries.get(index).copied()
    }

    /// Every entry, in index order.
    pub fn entries(&self) -> &[BlockId] {
        &self.entries
    }

    /// Rewrite every entry pointing at `old` to point at `new`. Used by
    /// `cfg::ControlFlowGraph::replace_target` to keep a table consistent when the postprocessor's
    /// `clean` pass removes or merges a block a switch can reach.
    pub fn replace_target(&mut self, old: BlockId, new: BlockId) {
        for entry in &mut self.entries {
            if *entry == old {
                *entry = new;
            }
        }
    }
}

impl fmt::Display for JumpTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, ".section .rodata")?;
        writeln!(f, "\t.align 8")?;
        writeln!(f, ".{}:", self.id)?;
        for target in &self.entries {
            writeln!(f, "\t.quad .L{}", target)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_overwrites_only_the_targeted_entry() {
        let default = BlockId::from_index(0);
        let case = BlockId::from_index(1);
        let mut table = JumpTable::new(JumpTableId::from_index(0), 3, default);
        table.set(1, case);
        assert_eq!(table.get(0), Some(default));
        assert_eq!(table.get(1), Some(case));
        assert_eq!(table.get(2), Some(default));
    }

    #[test]
    fn replace_target_rewrites_every_matching_entry() {
        let default = BlockId::from_index(0);
        let replacement = BlockId::from_index(9);
        let mut table = JumpTable::new(JumpTableId::from_index(0), 4, default);
        table.replace_target(default, replacement);
        assert!(table.entries().iter().all(|&t| t == replacement));
    }
}
