//! Recoverable error types.
//!
//! Per the back end's error model: programmer-invariant violations (a null block, an edge-count
//! overflow, a live range with no member variable, an unrecognised opcode reaching a printer) are
//! fatal and have no `Result` path — they indicate a bug upstream of this crate and are reported
//! with `panic!`/`assert!` at the point of detection. Only I/O at emission time is surfaced here.
//! Register-allocation failure (a range that can't be coloured) is never an error: it is recovered
//! locally by the allocator's spill-and-restart loop and never escapes `regalloc::allocate`.

use std::io;

/// Errors that can escape the back end and reach the driver.
#[derive(Debug, thiserror::Error)]
pub enum CodegenError {
    /// The assembly listing could not be written to its destination.
    #[error("failed to write assembly output: {0}")]
    Io(#[from] io::Error),
}

/// Convenience alias for fallible back-end operations.
pub type CodegenResult<T> = Result<T, CodegenError>;
