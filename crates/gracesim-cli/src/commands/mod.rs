//! Subcommand implementations.

pub mod check_permissions;
pub mod listen;
pub mod sanity_check;
pub mod simulate;
