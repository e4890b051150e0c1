//! Command line verifier for tendermint lite client traces.
//!
//! `verify` replays a trace of light blocks against a trusted root and reports the outcome of
//! every block. `fixtures` turns a declarative scenario into such a trace.
#![deny(
    clippy::nursery,
    clippy::pedantic,
    warnings,
    missing_docs,
    unused_crate_dependencies
)]

// Only the binary installs the subscriber
use tracing_subscriber as _;

pub mod cli;
pub mod config;
pub mod runners;
pub mod trace;
