//! Header verification and trust chaining for a Tendermint lite client.
//!
//! A lite client holds a trusted header together with the validator set that header commits to
//! for the next block. [`verifier::Verifier`] decides whether a newer, untrusted header can be
//! trusted from that anchor, either directly (adjacent heights) or by skipping ahead when enough of
//! the previously trusted voting power signed the new header. [`store::TrustLog`] keeps the linear
//! sequence of accepted transitions.
#![deny(
    clippy::nursery,
    clippy::pedantic,
    warnings,
    missing_docs,
    unused_crate_dependencies
)]

#[macro_use]
extern crate tendermint_lite_utils;

pub mod crypto;
pub mod error;
pub mod hash;
pub mod header;
pub mod store;
pub mod trust_level;
pub mod validator;
pub mod verifier;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::{ErrorKind, VerificationError};
pub use header::{BlockId, Commit, CommitSig, Header, SignedHeader};
pub use store::{verify_sequence, LightBlock, TrustLog, TrustedState};
pub use trust_level::TrustLevel;
pub use validator::{Validator, ValidatorSet};
pub use verifier::{verify, Options, Verifier};
