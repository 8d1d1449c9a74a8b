//! The x86-64 physical register file: 15 allocatable GPRs plus the 16 XMM scalar-float registers.
//!
//! Grounded on the source back end's fixed enumeration (no attempt to model multiple ISAs or
//! register banks beyond GPR/XMM, unlike `cranelift-codegen`'s fully parametric `RegClass`/
//! `RegInfo`, which this crate deliberately does not need).

use std::fmt;

/// Which pool a live range is coloured from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RegisterClass {
    Gpr,
    Xmm,
}

/// A physical register from either pool, the currency the colourer actually assigns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PhysReg {
    Gpr(Gpr),
    Xmm(Xmm),
}

impl PhysReg {
    pub fn class(self) -> RegisterClass {
        match self {
            PhysReg::Gpr(_) => RegisterClass::Gpr,
            PhysReg::Xmm(_) => RegisterClass::Xmm,
        }
    }

    pub fn unit(self) -> u32 {
        match self {
            PhysReg::Gpr(r) => r.unit(),
            PhysReg::Xmm(r) => r.unit(),
        }
    }
}

impl fmt::Display for PhysReg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PhysReg::Gpr(r) => write!(f, "{}", r),
            PhysReg::Xmm(r) => write!(f, "{}", r),
        }
    }
}

/// A general-purpose register. `Rsp` is reserved for the stack pointer and never handed out by
/// the colourer; it exists in this enum so prologue/epilogue code and the emitter can name it
/// uniformly alongside the allocatable registers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Gpr {
    Rax,
    Rbx,
    Rcx,
    Rdx,
    Rsi,
    Rdi,
    Rbp,
    Rsp,
    R8,
    R9,
    R10,
    R11,
    R12,
    R13,
    R14,
    R15,
}

/// The 15 registers the colourer is allowed to assign, in priority order (caller-saved scratch
/// registers first, so that all else equal a greedy colourer favours registers that don't force a
/// callee-save push/pop pair).
pub const ALLOCATABLE_GPRS: [Gpr; 15] = [
    Gpr::Rax,
    Gpr::Rcx,
    Gpr::Rdx,
    Gpr::Rsi,
    Gpr::Rdi,
    Gpr::R8,
    Gpr::R9,
    Gpr::R10,
    Gpr::R11,
    Gpr::Rbx,
    Gpr::R12,
    Gpr::R13,
    Gpr::R14,
    Gpr::R15,
    Gpr::Rbp,
];

impl Gpr {
    /// Dense 0..16 encoding matching the x86-64 `REX`-extended register numbering, used as a bit
    /// index into `RegisterSet`.
    pub fn unit(self) -> u32 {
        match self {
            Gpr::Rax => 0,
            Gpr::Rcx => 1,
            Gpr::Rdx => 2,
            Gpr::Rbx => 3,
            Gpr::Rsp => 4,
            Gpr::Rbp => 5,
            Gpr::Rsi => 6,
            Gpr::Rdi => 7,
            Gpr::R8 => 8,
            Gpr::R9 => 9,
            Gpr::R10 => 10,
            Gpr::R11 => 11,
            Gpr::R12 => 12,
            Gpr::R13 => 13,
            Gpr::R14 => 14,
            Gpr::R15 => 15,
        }
    }

    /// Is this callee-saved under the System V ABI (must be preserved across a call, so the
    /// prologue/epilogue pass pushes/pops it if the colourer ever assigns it)?
    pub fn is_callee_saved(self) -> bool {
        matches!(self, Gpr::Rbx | Gpr::Rbp | Gpr::R12 | Gpr::R13 | Gpr::R14 | Gpr::R15)
    }

    /// Is this caller-saved (clobbered by a call, so live ranges holding it must be saved around
    /// one)?
    pub fn is_caller_saved(self) -> bool {
        !self.is_callee_saved() && self != Gpr::Rsp
    }
}

impl fmt::Display for Gpr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Gpr::Rax => "%rax",
            Gpr::Rbx => "%rbx",
            Gpr::Rcx => "%rcx",
            Gpr::Rdx => "%rdx",
            Gpr::Rsi => "%rsi",
            Gpr::Rdi => "%rdi",
            Gpr::Rbp => "%rbp",
            Gpr::Rsp => "%rsp",
            Gpr::R8 => "%r8",
            Gpr::R9 => "%r9",
            Gpr::R10 => "%r10",
            Gpr::R11 => "%r11",
            Gpr::R12 => "%r12",
            Gpr::R13 => "%r13",
            Gpr::R14 => "%r14",
            Gpr::R15 => "%r15",
        })
    }
}

/// The 16 scalar SSE registers used for `SseSingle`/`SseDouble` live ranges. None are
/// callee-saved under System V; all are caller-saved scratch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Xmm(pub u8);

pub const ALLOCATABLE_XMMS: [Xmm; 16] = [
    Xmm(0), Xmm(1), Xmm(2), Xmm(3), Xmm(4), Xmm(5), Xmm(6), Xmm(7),
    Xmm(8), Xmm(9), Xmm(10), Xmm(11), Xmm(12), Xmm(13), Xmm(14), Xmm(15),
];

impl Xmm {
    pub fn unit(self) -> u32 {
        16 + self.0 as u32
    }
}

impl fmt::Display for Xmm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "%xmm{}", self.0)
    }
}

/// A bitset over the combined 32-unit register space (16 GPRs at bits 0..16, 16 XMMs at bits
/// 16..32), mirroring `cranelift-codegen`'s `regalloc::RegisterSet` but sized for this back end's
/// fixed, much smaller register file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RegisterSet(u32);

impl RegisterSet {
    pub fn empty() -> Self {
        RegisterSet(0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn insert_gpr(&mut self, reg: Gpr) {
        self.0 |= 1 << reg.unit();
    }

    pub fn remove_gpr(&mut self, reg: Gpr) {
        self.0 &= !(1 << reg.unit());
    }

    pub fn contains_gpr(self, reg: Gpr) -> bool {
        self.0 & (1 << reg.unit()) != 0
    }

    pub fn insert_xmm(&mut self, reg: Xmm) {
        self.0 |= 1 << reg.unit();
    }

    pub fn contains_xmm(self, reg: Xmm) -> bool {
        self.0 & (1 << reg.unit()) != 0
    }

    /// Every allocatable GPR not in this set, in priority order. Used by the colourer to find a
    /// free register once the interference neighbourhood's used colours have been collected here.
    pub fn free_gprs(self) -> impl Iterator<Item = Gpr> {
        ALLOCATABLE_GPRS.into_iter().filter(move |&r| !self.contains_gpr(r))
    }

    pub fn free_xmms(self) -> impl Iterator<Item = Xmm> {
        ALLOCATABLE_XMMS.into_iter().filter(move |&r| !self.contains_xmm(r))
    }

    pub fn insert(&mut self, reg: PhysReg) {
        match reg {
            PhysReg::Gpr(r) => self.insert_gpr(r),
            PhysReg::Xmm(r) => self.insert_xmm(r),
        }
    }

    pub fn contains(self, reg: PhysReg) -> bool {
        match reg {
            PhysReg::Gpr(r) => self.contains_gpr(r),
            PhysReg::Xmm(r) => self.contains_xmm(r),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_unit_encoding_matches_x86_numbering() {
        assert_eq!(Gpr::Rax.unit(), 0);
        assert_eq!(Gpr::Rsp.unit(), 4);
        assert_eq!(Gpr::R15.unit(), 15);
        assert_eq!(Xmm(0).unit(), 16);
        assert_eq!(Xmm(15).unit(), 31);
    }

    #[test]
    fn insert_and_contains_round_trip() {
        let mut set = RegisterSet::empty();
        assert!(set.is_empty());
        set.insert_gpr(Gpr::Rcx);
        assert!(set.contains_gpr(Gpr::Rcx));
        assert!(!set.contains_gpr(Gpr::Rdx));
        set.remove_gpr(Gpr::Rcx);
        assert!(!set.contains_gpr(Gpr::Rcx));
    }

    #[test]
    fn free_gprs_excludes_reserved_set() {
        let mut set = RegisterSet::empty();
        set.insert_gpr(Gpr::Rax);
        let free: Vec<_> = set.free_gprs().collect();
        assert!(!free.contains(&Gpr::Rax));
        assert_eq!(free.len(), ALLOCATABLE_GPRS.len() - 1);
    }

    #[test]
    fn callee_saved_partition_is_disjoint_from_caller_saved() {
        for &reg in &ALLOCATABLE_GPRS {
            assert_ne!(reg.is_callee_saved(), reg.is_caller_saved());
        }
    }
}
