//! Implementations of the subcommands.

pub mod fixtures;
pub mod verify;
