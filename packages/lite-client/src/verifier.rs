//! This module implements the header verification state machine: preconditions, then either the
//! adjacent or the skipping path.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tendermint_lite_utils::serde::duration_secs;
use time::OffsetDateTime;

use crate::{
    crypto::{Ed25519Verifier, SignatureVerifier},
    error::{CommitError, VerificationError},
    header::SignedHeader,
    trust_level::{has_full_quorum, TrustLevel},
    validator::ValidatorSet,
};

/// Default trusting period, two weeks
pub const DEFAULT_TRUSTING_PERIOD: Duration = Duration::from_secs(14 * 24 * 60 * 60);

/// Default tolerated clock drift between the caller and the chain
pub const DEFAULT_CLOCK_DRIFT: Duration = Duration::from_secs(15);

/// Verification parameters
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub struct Options {
    /// Fraction of trusted voting power required to skip ahead
    #[serde(default)]
    pub trust_level: TrustLevel,
    /// How long a trusted header can anchor verification
    #[serde(with = "duration_secs")]
    pub trusting_period: Duration,
    /// How far in the future of `now` an untrusted header may be
    #[serde(with = "duration_secs", default = "default_clock_drift")]
    pub clock_drift: Duration,
}

const fn default_clock_drift() -> Duration {
    DEFAULT_CLOCK_DRIFT
}

impl Default for Options {
    fn default() -> Self {
        Self {
            trust_level: TrustLevel::default(),
            trusting_period: DEFAULT_TRUSTING_PERIOD,
            clock_drift: DEFAULT_CLOCK_DRIFT,
        }
    }
}

/// Decides whether an untrusted header can be trusted from a trusted one.
///
/// The verifier holds no state besides its signature backend, so a single instance can be shared
/// across threads and every call is a pure function of its arguments.
#[derive(Clone, Copy, Debug)]
pub struct Verifier<V = Ed25519Verifier> {
    signature_verifier: V,
}

impl Default for Verifier {
    fn default() -> Self {
        Self::new(Ed25519Verifier)
    }
}

impl<V: SignatureVerifier> Verifier<V> {
    /// Creates a verifier checking signatures with `signature_verifier`.
    #[must_use]
    pub const fn new(signature_verifier: V) -> Self {
        Self { signature_verifier }
    }

    /// Verifies `untrusted` against the trusted header and the validator set it committed to for
    /// the next block.
    ///
    /// Preconditions are checked in order and the first failure is returned: chain id, the trusted
    /// next validators against the hash the trusted header published, height, expiry of the
    /// trusted header, header time, and the untrusted validator set hash. Then an
    /// adjacent header must continue the trusted next validator set and carry more than two thirds
    /// of its power, while a non-adjacent header needs `options.trust_level` of the trusted next
    /// validators and more than two thirds of its own validator set.
    /// # Errors
    /// Returns the first check that fails.
    #[allow(clippy::too_many_arguments)]
    #[tracing::instrument(
        skip_all,
        fields(
            chain_id = %chain_id,
            trusted_height = trusted.height(),
            untrusted_height = untrusted.height()
        )
    )]
    pub fn verify(
        &self,
        chain_id: &str,
        trusted: &SignedHeader,
        trusted_next_vals: &ValidatorSet,
        untrusted: &SignedHeader,
        untrusted_vals: &ValidatorSet,
        options: &Options,
        now: OffsetDateTime,
    ) -> Result<(), VerificationError> {
        check_chain_id(chain_id, trusted)?;
        check_chain_id(chain_id, untrusted)?;

        let trusted_next = trusted_next_vals.hash();
        ensure!(
            trusted.header().next_validators_hash == trusted_next,
            VerificationError::InvalidTrustedState {
                expected: trusted.header().next_validators_hash,
                found: trusted_next,
            }
        );

        check_height(trusted, untrusted)?;
        check_expiry(trusted, options.trusting_period, now)?;
        check_time(trusted, untrusted, options.clock_drift, now)?;

        let provided = untrusted_vals.hash();
        ensure!(
            untrusted.header().validators_hash == provided,
            VerificationError::InvalidValidatorSet {
                header: untrusted.header().validators_hash,
                provided,
            }
        );

        if trusted.height().checked_add(1) == Some(untrusted.height()) {
            self.verify_adjacent(chain_id, trusted_next_vals, untrusted)?;
        } else {
            self.verify_skipping(
                chain_id,
                trusted_next_vals,
                untrusted,
                untrusted_vals,
                options.trust_level,
            )?;
        }

        tracing::debug!(hash = %untrusted.hash(), "header verified");
        Ok(())
    }

    fn verify_adjacent(
        &self,
        chain_id: &str,
        trusted_next_vals: &ValidatorSet,
        untrusted: &SignedHeader,
    ) -> Result<(), VerificationError> {
        let trusted_next = trusted_next_vals.hash();
        ensure!(
            untrusted.header().validators_hash == trusted_next,
            VerificationError::ValidatorSetDiscontinuity {
                trusted_next,
                untrusted: untrusted.header().validators_hash,
            }
        );

        let signed = trusted_next_vals.verify_commit_light(
            chain_id,
            &untrusted.block_id(),
            untrusted.commit(),
            &self.signature_verifier,
        )?;
        let total = trusted_next_vals.total_voting_power();
        ensure!(
            has_full_quorum(signed, total),
            CommitError::InsufficientQuorum { signed, total }.into()
        );

        tracing::debug!(signed, total, "adjacent header has full quorum");
        Ok(())
    }

    fn verify_skipping(
        &self,
        chain_id: &str,
        trusted_next_vals: &ValidatorSet,
        untrusted: &SignedHeader,
        untrusted_vals: &ValidatorSet,
        trust_level: TrustLevel,
    ) -> Result<(), VerificationError> {
        let block_id = untrusted.block_id();

        let signed = trusted_next_vals.verify_commit_light(
            chain_id,
            &block_id,
            untrusted.commit(),
            &self.signature_verifier,
        )?;
        let total = trusted_next_vals.total_voting_power();
        ensure!(
            trust_level.voting_power_meets(signed, total),
            VerificationError::InsufficientVotingPower {
                signed,
                total,
                trust_level,
            }
        );
        tracing::debug!(signed, total, %trust_level, "trusted validators bridge the gap");

        let signed = untrusted_vals.verify_commit_light(
            chain_id,
            &block_id,
            untrusted.commit(),
            &self.signature_verifier,
        )?;
        let total = untrusted_vals.total_voting_power();
        ensure!(
            has_full_quorum(signed, total),
            CommitError::InsufficientQuorum { signed, total }.into()
        );

        tracing::debug!(signed, total, "skipped header has full quorum");
        Ok(())
    }
}

fn check_chain_id(chain_id: &str, header: &SignedHeader) -> Result<(), VerificationError> {
    ensure!(
        header.chain_id() == chain_id,
        VerificationError::ChainIdMismatch {
            expected: chain_id.to_string(),
            found: header.chain_id().to_string(),
        }
    );
    Ok(())
}

fn check_height(trusted: &SignedHeader, untrusted: &SignedHeader) -> Result<(), VerificationError> {
    if untrusted.height() == trusted.height() && untrusted.hash() != trusted.hash() {
        return Err(VerificationError::ConflictingHeaders {
            height: trusted.height(),
            trusted_hash: trusted.hash(),
            untrusted_hash: untrusted.hash(),
        });
    }
    ensure!(
        untrusted.height() > trusted.height(),
        VerificationError::NonIncreasingHeight {
            trusted: trusted.height(),
            untrusted: untrusted.height(),
        }
    );
    Ok(())
}

fn check_expiry(
    trusted: &SignedHeader,
    trusting_period: Duration,
    now: OffsetDateTime,
) -> Result<(), VerificationError> {
    if now - trusted.time() > trusting_period {
        let period = time::Duration::try_from(trusting_period).unwrap_or(time::Duration::MAX);
        return Err(VerificationError::ExpiredTrustedHeader {
            expired_at: trusted.time().saturating_add(period),
            now,
        });
    }
    Ok(())
}

fn check_time(
    trusted: &SignedHeader,
    untrusted: &SignedHeader,
    clock_drift: Duration,
    now: OffsetDateTime,
) -> Result<(), VerificationError> {
    ensure!(
        untrusted.time() > trusted.time(),
        VerificationError::NonMonotonicTime {
            trusted: trusted.time(),
            untrusted: untrusted.time(),
        }
    );
    ensure!(
        untrusted.time() - now < clock_drift,
        VerificationError::HeaderFromFuture {
            header_time: untrusted.time(),
            now,
            clock_drift,
        }
    );
    Ok(())
}

/// Verifies `untrusted` with the default clock drift and ed25519 signatures.
///
/// See [`Verifier::verify`].
/// # Errors
/// Returns the first check that fails.
#[allow(clippy::too_many_arguments)]
pub fn verify(
    chain_id: &str,
    trusted: &SignedHeader,
    trusted_next_vals: &ValidatorSet,
    untrusted: &SignedHeader,
    untrusted_vals: &ValidatorSet,
    trusting_period: Duration,
    now: OffsetDateTime,
    trust_level: TrustLevel,
) -> Result<(), VerificationError> {
    let options = Options {
        trust_level,
        trusting_period,
        clock_drift: DEFAULT_CLOCK_DRIFT,
    };
    Verifier::<Ed25519Verifier>::default().verify(
        chain_id,
        trusted,
        trusted_next_vals,
        untrusted,
        untrusted_vals,
        &options,
        now,
    )
}
