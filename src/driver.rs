//! Top-level orchestration: the one entry point a caller outside this crate uses to turn a built
//! `ControlFlowGraph` into assembly text.
//!
//! Mirrors `cranelift-codegen`'s `Context::compile`, minus the parts of that pipeline (legalization,
//! instruction selection from a generic `ir::Function`) that live upstream of this crate, in the
//! instruction selector that builds the `ControlFlowGraph` in the first place.

use crate::cfg::ControlFlowGraph;
use crate::error::CodegenResult;
use crate::ir::function::FunctionRecord;
use crate::ir::print::{print_function, PrintMode};
use crate::settings::Flags;
use crate::{emit, postprocess, regalloc, scheduler};

/// Run register allocation, post-allocation clean-up, and assembly emission over one function,
/// returning its rendered assembly text. `cfg` is left in its final, reordered, emitted-from
/// state; callers that need the IR afterward (tests, `--print-irs`) should dump it before or
/// during this call via `flags`.
pub fn compile_function(
    cfg: &mut ControlFlowGraph,
    function: &mut FunctionRecord,
    flags: &Flags,
) -> CodegenResult<String> {
    if flags.print_irs {
        log::debug!(
            "{}: IR before allocation:\n{}",
            function.name,
            print_function(cfg, function.entry_block, PrintMode::VariableInline)
        );
    }

    let ranges = regalloc::allocate(cfg, function);

    if flags.print_irs {
        log::debug!(
            "{}: IR after allocation:\n{}",
            function.name,
            print_function(cfg, function.entry_block, PrintMode::Registers)
        );
    }

    scheduler::schedule_function(cfg, function.entry_block);

    let order = postprocess::run(cfg, function, &ranges);

    if flags.enable_debug_printing {
        log::debug!("{}: final block order: {:?}", function.name, order);
    }

    Ok(emit::emit_function(cfg, function, &ranges, &order))
}
