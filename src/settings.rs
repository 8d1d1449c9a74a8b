//! Back-end configuration.
//!
//! CLI parsing is the enclosing driver's job, not this crate's. `Flags` is the
//! narrow surface the driver populates and passes in; it mirrors the handful of knobs the driver
//! is documented to honour and nothing else. Compare `cranelift-codegen`'s own `settings::Flags`,
//! which plays the same role for a much larger set of target options.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Flags {
    /// Dump every IR between passes (`--print-irs`).
    pub print_irs: bool,
    /// Emit verbose per-block dumps from the allocator and scheduler (`--enable-debug-printing`).
    pub enable_debug_printing: bool,
}

impl Flags {
    /// Flags with every knob off, equivalent to running the driver with no debug flags.
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_flags_are_quiet() {
        let flags = Flags::new();
        assert!(!flags.print_irs);
        assert!(!flags.enable_debug_printing);
    }
}
