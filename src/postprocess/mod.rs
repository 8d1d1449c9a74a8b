//! Post-allocation clean-up: everything that runs after `regalloc::allocate` has committed a
//! physical register (or a spill slot) to every live range, and before `emit` turns the result
//! into text.
//!
//! `useless_moves` deletes phis and same-register copies that colouring left behind, `clean` folds
//! the now-empty blocks those deletions create and merges the straight-line chains that leaves,
//! and `reorder` picks the final linear block order and drops the jumps that order makes
//! redundant.

pub mod clean;
pub mod reorder;
pub mod useless_moves;

use crate::cfg::ControlFlowGraph;
use crate::ids::BlockId;
use crate::ir::function::FunctionRecord;
use crate::regalloc::live_range::LiveRange;

/// Run the full post-allocation pipeline and return the block order `emit` should lay out code
/// in.
pub fn run(cfg: &mut ControlFlowGraph, function: &FunctionRecord, ranges: &[LiveRange]) -> Vec<BlockId> {
    useless_moves::remove(cfg, ranges);
    clean::run(cfg, function.entry_block);
    let order = reorder::order_blocks(cfg, function.entry_block);
    reorder::elide_redundant_jumps(cfg, &order);
    order
}
