//! Test utilities for the lite client: deterministic validators, block builders and JSON scenarios

#[allow(clippy::missing_panics_doc)]
pub mod fixtures;
pub mod generator;
