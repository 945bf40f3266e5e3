//! Command implementations for the vaultfix CLI.
//!
//! Each submodule contains related command functions.

pub mod fix;

pub use fix::{fix, FixArgs};
