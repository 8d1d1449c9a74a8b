//! Register allocation: the pipeline that turns a function's virtual-variable IR into one where
//! every surviving variable names a physical register, plus the stack traffic for whatever didn't
//! fit.
//!
//! Stages run in this order, restarting from the top whenever colouring reports a spill: live
//! ranges are rebuilt from scratch (`live_range`), liveness is recomputed (`liveness`), ABI
//! obligations are pinned (`interference::apply_instruction_precoloring`), the interference graph
//! is built (`interference::build`), pure copies are folded (`coalescing`), and the result is
//! coloured (`coloring`). A function that colours cleanly exits the loop; one that doesn't has
//! `spill::spill` rewrite the uncolourable ranges into explicit stack traffic and tries again.
//! Once the loop exits clean, `prologue_epilogue` commits the used-register set into push/pop
//! sequences.

pub mod coalescing;
pub mod coloring;
pub mod interference;
pub mod live_range;
pub mod liveness;
pub mod prologue_epilogue;
pub mod spill;

use crate::cfg::ControlFlowGraph;
use crate::ir::function::FunctionRecord;
use live_range::LiveRange;

/// Hard ceiling on spill-and-restart iterations. A function with fewer live ranges than
/// allocatable registers converges in one pass; pathological inputs are cut off here rather than
/// looping forever, with the last attempt's (incomplete) colouring returned as-is.
const MAX_ITERATIONS: u32 = 64;

/// Run the whole register-allocation pipeline over `function`'s body in `cfg`, returning the
/// final live ranges with every non-eliminated entry's `color` set. `function.stack_frame_size`
/// and `function.used_registers` are updated in place, and callee/caller-saved push/pop
/// instructions are injected directly into `cfg`.
pub fn allocate(cfg: &mut ControlFlowGraph, function: &mut FunctionRecord) -> Vec<LiveRange> {
    let mut ranges;
    let mut iteration = 0;

    loop {
        ranges = live_range::construct_all_live_ranges(cfg);
        liveness::compute_liveness(cfg, function.entry_block);
        interference::apply_instruction_precoloring(cfg, &mut ranges);
        let mut graph = interference::build(cfg, ranges.len());
        coalescing::coalesce(cfg, &mut ranges, &mut graph);
        let spills = coloring::color(&mut ranges, &graph);

        if spills.is_empty() {
            log::debug!(
                "{}: register allocation converged after {} iteration(s)",
                function.name,
                iteration + 1
            );
            break;
        }

        iteration += 1;
        if iteration >= MAX_ITERATIONS {
            log::error!(
                "{}: register allocation did not converge after {} iterations, {} range(s) left uncoloured",
                function.name,
                iteration,
                spills.len()
            );
            break;
        }

        log::debug!(
            "{}: spilling {} live range(s) on iteration {}",
            function.name,
            spills.len(),
            iteration
        );
        function.stack_frame_size = spill::spill(cfg, &mut ranges, &spills, function.stack_frame_size);
    }

    // Coalescing above folded some live ranges into others, rewriting every operand's
    // `associated_live_range` to the survivor; refresh `live_in`/`live_out` against those ids
    // before reading per-call-site liveness off them.
    liveness::compute_liveness(cfg, function.entry_block);
    let call_live_ranges = interference::call_site_live_ranges(cfg);

    function.used_registers = prologue_epilogue::collect_used_registers(&ranges);
    prologue_epilogue::inject_callee_saves(cfg, function);
    prologue_epilogue::inject_caller_saves(cfg, &ranges, &call_live_ranges);

    ranges
}
