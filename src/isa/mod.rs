//! The one target this back end knows: x86-64 System V.

pub mod abi;
pub mod registers;
