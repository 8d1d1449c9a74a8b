//! A Chaitin-style graph-colouring register allocator and post-allocation clean-up pipeline for
//! the Ollie language compiler's x86-64 System V back end.
//!
//! The pipeline a caller drives through [`driver::compile_function`]:
//!
//! 1. An instruction selector upstream of this crate lowers Ollie IR into a [`cfg::ControlFlowGraph`]
//!    of three-address [`ir::instruction::Instruction`]s over [`ir::variable::VirtualVariable`]
//!    operands, with SSA phi-functions represented directly as `Phi` instructions.
//! 2. [`regalloc::allocate`] builds live ranges by unioning SSA occurrences of the same source
//!    variable or temporary, computes liveness, pins down ABI-mandated precolourings, builds the
//!    interference graph, coalesces pure copies, and greedily colours — spilling and restarting
//!    from scratch when colouring can't converge within the allocatable register set.
//! 3. [`scheduler::schedule_function`] is the identity transform today; it exists as the slot a
//!    real per-block instruction scheduler would occupy.
//! 4. [`postprocess::run`] deletes the moves and phis that colouring rendered into no-ops, folds
//!    and merges the empty/straight-line blocks that leaves behind, and picks the final linear
//!    block emission order.
//! 5. [`emit::emit_function`] renders the result to AT&T/GAS assembly text.

pub mod cfg;
pub mod driver;
pub mod emit;
pub mod error;
pub mod front_end;
pub mod ids;
pub mod ir;
pub mod isa;
pub mod postprocess;
pub mod regalloc;
pub mod scheduler;
pub mod settings;

pub use driver::compile_function;
pub use error::{CodegenError, CodegenResult};
pub use settings::Flags;
