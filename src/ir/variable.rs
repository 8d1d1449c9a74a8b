//! Virtual variables: the pre-allocation operand currency.

use crate::front_end::SymbolRecord;
use crate::ids::{LiveRangeId, TempId};
use crate::ir::types::SizeClass;
use crate::isa::registers::PhysReg;
use std::fmt;
use std::rc::Rc;

/// What a virtual variable is backed by.
///
/// Two virtual variables are "equal up to SSA" when they share an origin, regardless of
/// generation: the same symbol-table record, or the same temporary id.
#[derive(Clone, Debug)]
pub enum VarOrigin {
    /// Bound to a front-end symbol-table entry. Compared by pointer identity, since two distinct
    /// symbols could otherwise coincidentally compare equal on name alone.
    Symbol(Rc<SymbolRecord>),
    /// A compiler-generated temporary with no source-level name.
    Temporary(TempId),
}

/// Hashable identity of a [`VirtualVariable`]'s origin, ignoring SSA generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OriginKey {
    Symbol(*const SymbolRecord),
    Temporary(TempId),
}

impl VarOrigin {
    fn equal_up_to_ssa(&self, other: &VarOrigin) -> bool {
        match (self, other) {
            (VarOrigin::Symbol(a), VarOrigin::Symbol(b)) => Rc::ptr_eq(a, b),
            (VarOrigin::Temporary(a), VarOrigin::Temporary(b)) => a == b,
            _ => false,
        }
    }
}

/// Flags carried by a virtual variable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VarFlags {
    /// This variable denotes `%rsp` itself.
    pub is_stack_pointer: bool,
    /// This variable has no source-level name (redundant with `VarOrigin::Temporary`, kept as its
    /// own flag because it is cheaper to test than matching the origin).
    pub is_temporary: bool,
    /// An address was taken somewhere upstream of register allocation; the live range this
    /// variable joins must be spilled unconditionally.
    pub must_be_spilled: bool,
    /// 1-based position if this variable is a function parameter, precoloured to the
    /// corresponding ABI parameter register.
    pub parameter_number: Option<u32>,
}

/// A single SSA-numbered occurrence of a source variable or temporary.
///
/// Every operand slot in every instruction holds its own `VirtualVariable` value (the source back
/// end used a similar by-value-at-each-use-site layout, not one node shared by reference); live
/// range construction is what later re-establishes which occurrences denote "the same" range by
/// walking instructions and testing `equal_up_to_ssa`.
#[derive(Clone, Debug)]
pub struct VirtualVariable {
    origin: VarOrigin,
    /// SSA subscript. Two occurrences with the same origin but different generations are
    /// still "equal up to SSA" and therefore join the same live range.
    pub generation: u32,
    /// Register/memory width.
    pub size_class: SizeClass,
    /// Filled in by `regalloc::live_range::construct_all_live_ranges`; `None` before that pass
    /// runs, and never `None` afterward for any operand reachable from an instruction.
    pub associated_live_range: Option<LiveRangeId>,
    /// Stack offset assigned after a spill. `None` until `regalloc::spill` runs for this
    /// variable's live range.
    pub stack_offset: Option<i32>,
    pub flags: VarFlags,
    /// Set only for operands synthesised after colouring has already committed (prologue/epilogue
    /// push/pop, caller-save protection): names a physical register directly rather than going
    /// through `associated_live_range`, since these operands never participate in another
    /// colouring pass. `None` for every operand that went through `construct_all_live_ranges`.
    pub fixed_register: Option<PhysReg>,
}

impl VirtualVariable {
    /// A fresh compiler-generated temporary at generation 0.
    pub fn temporary(id: TempId, size_class: SizeClass) -> Self {
        Self {
            origin: VarOrigin::Temporary(id),
            generation: 0,
            size_class,
            associated_live_range: None,
            stack_offset: None,
            flags: VarFlags {
                is_temporary: true,
                ..VarFlags::default()
            },
            fixed_register: None,
        }
    }

    /// An occurrence of a source-level symbol at a given SSA generation.
    pub fn symbol(symbol: Rc<SymbolRecord>, generation: u32, size_class: SizeClass) -> Self {
        let parameter_number = symbol.parameter_number;
        Self {
            origin: VarOrigin::Symbol(symbol),
            generation,
            size_class,
            associated_live_range: None,
            stack_offset: None,
            flags: VarFlags {
                parameter_number,
                ..VarFlags::default()
            },
            fixed_register: None,
        }
    }

    /// The shared stack-pointer pseudo-variable: infinite spill cost, precoloured, and excluded
    /// from every later pass's candidate pool.
    pub fn stack_pointer(id: TempId) -> Self {
        Self {
            origin: VarOrigin::Temporary(id),
            generation: 0,
            size_class: SizeClass::Qword,
            associated_live_range: None,
            stack_offset: None,
            flags: VarFlags {
                is_stack_pointer: true,
                ..VarFlags::default()
            },
            fixed_register: None,
        }
    }

    /// An operand naming a physical register directly, bypassing live-range colouring entirely.
    /// Used only by `regalloc::prologue_epilogue` to build push/pop operands after colouring has
    /// already run to completion.
    pub fn fixed(reg: PhysReg, size_class: SizeClass, id: TempId) -> Self {
        Self {
            origin: VarOrigin::Temporary(id),
            generation: 0,
            size_class,
            associated_live_range: None,
            stack_offset: None,
            flags: VarFlags::default(),
            fixed_register: Some(reg),
        }
    }

    /// Are `self` and `other` the same variable across SSA generations ("Variable
    /// equality")?
    pub fn equal_up_to_ssa(&self, other: &VirtualVariable) -> bool {
        self.origin.equal_up_to_ssa(&other.origin)
    }

    /// A hashable, comparable key identifying this occurrence's origin: equal for any two
    /// occurrences that are `equal_up_to_ssa`, distinct otherwise. Used as the union-find node key
    /// when grouping occurrences into live ranges.
    pub fn origin_identity(&self) -> OriginKey {
        match &self.origin {
            VarOrigin::Symbol(rc) => OriginKey::Symbol(Rc::as_ptr(rc)),
            VarOrigin::Temporary(id) => OriginKey::Temporary(*id),
        }
    }

    /// Create a new occurrence of the same origin at a later generation, as produced by a new
    /// SSA definition of a source variable (e.g. after a spill-reload rewrite).
    pub fn next_generation(&self) -> Self {
        Self {
            origin: self.origin.clone(),
            generation: self.generation + 1,
            size_class: self.size_class,
            associated_live_range: None,
            stack_offset: None,
            flags: self.flags,
            fixed_register: None,
        }
    }

    /// A brand-new, unrelated temporary sharing this variable's size class — used by the spiller
    /// to mint the fresh live range a reload loads into.
    pub fn fresh_temporary(id: TempId, size_class: SizeClass) -> Self {
        VirtualVariable::temporary(id, size_class)
    }
}

impl fmt::Display for VirtualVariable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.origin {
            VarOrigin::Symbol(sym) => write!(f, "{}.{}", sym.name, self.generation),
            VarOrigin::Temporary(id) => write!(f, "{}.{}", id, self.generation),
        }
    }
}
