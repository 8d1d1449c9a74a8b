//! External-interface stubs for the front end.
//!
//! Lexing, parsing, AST construction, the type system, and the symbol table are out of scope for
//! this crate: they are named collaborators whose shapes this crate depends on, not
//! subsystems it implements. `FrontEndResults` is the bundle the IR builder receives from the
//! front end; `SymbolRecord` is a deliberately minimal stand-in for whatever richer symbol-table
//! entry the real front end hands back, just enough for `ir::variable::VirtualVariable` to carry a
//! stable reference to it.

use crate::ir::variable::VirtualVariable;
use std::rc::Rc;

/// A stand-in for a front-end symbol-table entry.
///
/// The real Ollie front end's symbol table carries scoping, type, and storage-class information
/// that this crate never inspects; it only needs two values out of a symbol record to build live
/// ranges and precolour parameters: equality (to recognise the same source variable
/// across SSA generations) and, for parameters, the parameter index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymbolRecord {
    /// Name as written in source, kept only for diagnostics and IR printing.
    pub name: String,
    /// 1-based parameter number if this symbol is a function parameter, `None` otherwise.
    pub parameter_number: Option<u32>,
}

impl SymbolRecord {
    /// A symbol record for a non-parameter local variable.
    pub fn local(name: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            parameter_number: None,
        })
    }

    /// A symbol record for the `n`-th (1-based) parameter of the enclosing function.
    pub fn parameter(name: impl Into<String>, parameter_number: u32) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            parameter_number: Some(parameter_number),
        })
    }
}

/// The bundle the front end hands to the IR builder.
///
/// Carries only what the back end actually consumes: a reference to the shared stack-pointer
/// virtual variable (every function's live ranges are seeded with it, precoloured and unspillable)
/// and nothing from the type table or global symbol table, since this crate never inspects source
/// types beyond the `SizeClass` already attached to each virtual variable by instruction
/// selection.
pub struct FrontEndResults {
    /// The virtual variable denoting `%rsp`, shared across every function in the compilation
    /// unit. Its live range is built with infinite spill cost and the `RSP` precolour, never
    /// considered for allocation or spilling.
    pub stack_pointer: VirtualVariable,
}
