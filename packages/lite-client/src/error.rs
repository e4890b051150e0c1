//! This module defines [`VerificationError`] and its stable [`ErrorKind`] classification.

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::{crypto::SignatureError, hash::Hash, trust_level::TrustLevel, validator::Address};

/// Errors returned while constructing lite client types or verifying a header transition.
///
/// Every variant renders a deterministic message built only from its fields.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[allow(clippy::module_name_repetitions)]
pub enum VerificationError {
    /// A header belongs to another chain
    #[error("header chain id ({found}) does not match the expected chain id ({expected})")]
    ChainIdMismatch {
        /// Chain id the caller verifies against
        expected: String,
        /// Chain id found in the header
        found: String,
    },

    /// Untrusted header is not strictly higher than the trusted one
    #[error(
        "expected new header height {untrusted} to be greater than one of old header {trusted}"
    )]
    NonIncreasingHeight {
        /// Trusted height
        trusted: u64,
        /// Untrusted height
        untrusted: u64,
    },

    /// Two different headers at the same height, possible fork evidence
    #[error(
        "conflicting headers at height {height}: trusted {trusted_hash} but received {untrusted_hash}"
    )]
    ConflictingHeaders {
        /// The shared height
        height: u64,
        /// Hash of the trusted header
        trusted_hash: Hash,
        /// Hash of the untrusted header
        untrusted_hash: Hash,
    },

    /// The trusted header is older than the trusting period
    #[error(
        "old header has expired at {expired_at} (now: {now})",
        expired_at = rfc3339(.expired_at),
        now = rfc3339(.now)
    )]
    ExpiredTrustedHeader {
        /// Trusted header time plus the trusting period
        expired_at: OffsetDateTime,
        /// Time supplied by the caller
        now: OffsetDateTime,
    },

    /// Untrusted header time is not after the trusted header time
    #[error(
        "expected new header time {untrusted} to be after old header time {trusted}",
        untrusted = rfc3339(.untrusted),
        trusted = rfc3339(.trusted)
    )]
    NonMonotonicTime {
        /// Trusted header time
        trusted: OffsetDateTime,
        /// Untrusted header time
        untrusted: OffsetDateTime,
    },

    /// Untrusted header time is beyond the allowed clock drift
    #[error(
        "new header has a time from the future {header_time} (now: {now}, max clock drift: {drift}s)",
        header_time = rfc3339(.header_time),
        now = rfc3339(.now),
        drift = .clock_drift.as_secs()
    )]
    HeaderFromFuture {
        /// Untrusted header time
        header_time: OffsetDateTime,
        /// Time supplied by the caller
        now: OffsetDateTime,
        /// Tolerated drift
        clock_drift: Duration,
    },

    /// Supplied validator set does not hash to the one the header commits to
    #[error(
        "expected new header validators ({header}) to match those that were supplied ({provided})"
    )]
    InvalidValidatorSet {
        /// `validators_hash` of the untrusted header
        header: Hash,
        /// Hash of the supplied validator set
        provided: Hash,
    },

    /// Adjacent header does not continue the trusted next validator set
    #[error(
        "expected old header next validators ({trusted_next}) to match those from new header ({untrusted})"
    )]
    ValidatorSetDiscontinuity {
        /// Hash of the trusted next validator set
        trusted_next: Hash,
        /// `validators_hash` of the untrusted header
        untrusted: Hash,
    },

    /// Not enough of the trusted voting power signed the untrusted header
    #[error(
        "cannot trust new validator set: signed voting power {signed} of {total} does not meet trust level {trust_level}"
    )]
    InsufficientVotingPower {
        /// Trusted voting power that signed
        signed: u64,
        /// Total trusted voting power
        total: u64,
        /// Required fraction
        trust_level: TrustLevel,
    },

    /// Commit is malformed or fails its own quorum
    #[error("invalid commit: {0}")]
    InvalidCommit(#[from] CommitError),

    /// Header and commit do not form a valid signed header
    #[error("invalid header: {0}")]
    InvalidHeader(#[from] HeaderError),

    /// Trust level outside of `(0, 1]`
    #[error("trust level {numerator}/{denominator} must be within (0, 1]")]
    InvalidTrustLevel {
        /// Numerator
        numerator: u64,
        /// Denominator
        denominator: u64,
    },

    /// Trust level string is not `numerator/denominator`
    #[error("malformed trust level {input:?}, expected `numerator/denominator`")]
    MalformedTrustLevel {
        /// Rejected input
        input: String,
    },

    /// Two validators with the same address
    #[error("duplicate validator {address} in validator set")]
    DuplicateValidator {
        /// Repeated address
        address: Address,
    },

    /// Validator set without members
    #[error("validator set must not be empty")]
    EmptyValidatorSet,

    /// Validator set whose members hold no voting power at all
    #[error("validator set must have a positive total voting power")]
    ZeroVotingPower,

    /// Total voting power over the allowed maximum
    #[error("total voting power exceeds maximum of {max}")]
    VotingPowerOverflow {
        /// Maximum total voting power
        max: u64,
    },

    /// Trusted next validator set does not hash to the trusted header's `next_validators_hash`
    #[error(
        "trusted next validators ({found}) do not match the next validators hash of the trusted header ({expected})"
    )]
    InvalidTrustedState {
        /// `next_validators_hash` of the trusted header
        expected: Hash,
        /// Hash of the supplied next validator set
        found: Hash,
    },
}

/// Reasons a commit fails verification
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[allow(clippy::module_name_repetitions)]
pub enum CommitError {
    /// Commit is for another block
    #[error("commit is for block {found} but expected block {expected}")]
    BlockIdMismatch {
        /// Expected block hash
        expected: Hash,
        /// Block hash found in the commit
        found: Hash,
    },

    /// A validator appears twice among the signatures
    #[error("validator {address} signed more than once")]
    DuplicateSignature {
        /// Validator address
        address: Address,
    },

    /// A known validator's signature does not verify
    #[error("wrong signature (#{index}) from validator {address}: {source}")]
    InvalidSignature {
        /// Position of the signature in the commit
        index: usize,
        /// Validator address
        address: Address,
        /// Underlying signature failure
        #[source]
        source: SignatureError,
    },

    /// Signed voting power is not more than two thirds of the set
    #[error("insufficient voting power: got {signed}, needed more than 2/3 of {total}")]
    InsufficientQuorum {
        /// Voting power that signed
        signed: u64,
        /// Total voting power of the set
        total: u64,
    },
}

/// Reasons a header and commit cannot be paired
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[allow(clippy::module_name_repetitions)]
pub enum HeaderError {
    /// Height zero is reserved
    #[error("header height must be greater than zero")]
    ZeroHeight,

    /// Chain id is empty
    #[error("header chain id must not be empty")]
    EmptyChainId,

    /// Commit height and header height differ
    #[error("commit height {commit} does not match header height {header}")]
    CommitHeightMismatch {
        /// Header height
        header: u64,
        /// Commit height
        commit: u64,
    },

    /// Commit signs a different block than the header
    #[error("commit signs block {commit_hash} but header hashes to {header_hash}")]
    CommitBlockIdMismatch {
        /// Hash of the header
        header_hash: Hash,
        /// Block hash in the commit
        commit_hash: Hash,
    },
}

/// Stable classification of [`VerificationError`], used by callers and fixtures to tell failure
/// classes apart without matching on messages.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
#[allow(clippy::module_name_repetitions)]
pub enum ErrorKind {
    /// See [`VerificationError::ExpiredTrustedHeader`]
    ExpiredTrustedHeader,
    /// See [`VerificationError::NonIncreasingHeight`]
    NonIncreasingHeight,
    /// See [`VerificationError::ConflictingHeaders`]
    ConflictingHeaders,
    /// See [`VerificationError::NonMonotonicTime`]
    NonMonotonicTime,
    /// See [`VerificationError::HeaderFromFuture`]
    HeaderFromFuture,
    /// Validator set construction or hash mismatch
    InvalidValidatorSet,
    /// See [`VerificationError::ValidatorSetDiscontinuity`]
    ValidatorSetDiscontinuity,
    /// See [`VerificationError::InsufficientVotingPower`]
    InsufficientVotingPower,
    /// See [`VerificationError::InvalidCommit`]
    InvalidCommit,
    /// See [`VerificationError::ChainIdMismatch`]
    ChainIdMismatch,
    /// See [`VerificationError::InvalidHeader`]
    InvalidHeader,
    /// Invalid or malformed trust level
    InvalidTrustLevel,
    /// See [`VerificationError::DuplicateValidator`]
    DuplicateValidator,
    /// See [`VerificationError::VotingPowerOverflow`]
    VotingPowerOverflow,
}

impl ErrorKind {
    /// The snake case code of this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ExpiredTrustedHeader => "expired_trusted_header",
            Self::NonIncreasingHeight => "non_increasing_height",
            Self::ConflictingHeaders => "conflicting_headers",
            Self::NonMonotonicTime => "non_monotonic_time",
            Self::HeaderFromFuture => "header_from_future",
            Self::InvalidValidatorSet => "invalid_validator_set",
            Self::ValidatorSetDiscontinuity => "validator_set_discontinuity",
            Self::InsufficientVotingPower => "insufficient_voting_power",
            Self::InvalidCommit => "invalid_commit",
            Self::ChainIdMismatch => "chain_id_mismatch",
            Self::InvalidHeader => "invalid_header",
            Self::InvalidTrustLevel => "invalid_trust_level",
            Self::DuplicateValidator => "duplicate_validator",
            Self::VotingPowerOverflow => "voting_power_overflow",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl VerificationError {
    /// Returns the stable classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::ChainIdMismatch { .. } => ErrorKind::ChainIdMismatch,
            Self::NonIncreasingHeight { .. } => ErrorKind::NonIncreasingHeight,
            Self::ConflictingHeaders { .. } => ErrorKind::ConflictingHeaders,
            Self::ExpiredTrustedHeader { .. } => ErrorKind::ExpiredTrustedHeader,
            Self::NonMonotonicTime { .. } => ErrorKind::NonMonotonicTime,
            Self::HeaderFromFuture { .. } => ErrorKind::HeaderFromFuture,
            Self::InvalidValidatorSet { .. }
            | Self::EmptyValidatorSet
            | Self::ZeroVotingPower
            | Self::InvalidTrustedState { .. } => ErrorKind::InvalidValidatorSet,
            Self::ValidatorSetDiscontinuity { .. } => ErrorKind::ValidatorSetDiscontinuity,
            Self::InsufficientVotingPower { .. } => ErrorKind::InsufficientVotingPower,
            Self::InvalidCommit(_) => ErrorKind::InvalidCommit,
            Self::InvalidHeader(_) => ErrorKind::InvalidHeader,
            Self::InvalidTrustLevel { .. } | Self::MalformedTrustLevel { .. } => {
                ErrorKind::InvalidTrustLevel
            }
            Self::DuplicateValidator { .. } => ErrorKind::DuplicateValidator,
            Self::VotingPowerOverflow { .. } => ErrorKind::VotingPowerOverflow,
        }
    }
}

/// Formats a timestamp as RFC 3339, falling back to the `time` debug rendering for years that
/// RFC 3339 cannot represent.
pub(crate) fn rfc3339(time: &OffsetDateTime) -> String {
    time.format(&Rfc3339).unwrap_or_else(|_| time.to_string())
}
