//! The System V x86-64 calling convention, just the slice of it this back end needs.

use crate::isa::registers::Gpr;

/// Integer/pointer argument registers, in order. Parameters beyond the 6th are out of scope
/// (the front end stub never produces more than 6, so the builder does not implement a stack-passed
/// fallback).
pub const INTEGER_PARAM_REGS: [Gpr; 6] = [
    Gpr::Rdi,
    Gpr::Rsi,
    Gpr::Rdx,
    Gpr::Rcx,
    Gpr::R8,
    Gpr::R9,
];

/// Integer/pointer return register.
pub const INTEGER_RETURN_REG: Gpr = Gpr::Rax;

/// Register holding a division's remainder, as opposed to `INTEGER_RETURN_REG`/`Rax` holding its
/// quotient.
pub const REMAINDER_REG: Gpr = Gpr::Rdx;

/// The 1-based parameter register for `number`, or `None` beyond the 6-register window.
pub fn integer_param_reg(number: u32) -> Option<Gpr> {
    INTEGER_PARAM_REGS.get((number as usize).checked_sub(1)?).copied()
}
