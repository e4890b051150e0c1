//! This module keeps the linear log of trusted states, each verified from the one before it.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    crypto::SignatureVerifier,
    error::VerificationError,
    header::SignedHeader,
    validator::ValidatorSet,
    verifier::{Options, Verifier},
};

/// A trusted header and the validator set it commits to for the next block
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
#[serde(try_from = "RawTrustedState")]
pub struct TrustedState {
    signed_header: SignedHeader,
    next_validators: ValidatorSet,
}

#[derive(Deserialize)]
struct RawTrustedState {
    signed_header: SignedHeader,
    next_validators: ValidatorSet,
}

impl TryFrom<RawTrustedState> for TrustedState {
    type Error = VerificationError;

    fn try_from(raw: RawTrustedState) -> Result<Self, Self::Error> {
        Self::new(raw.signed_header, raw.next_validators)
    }
}

impl TrustedState {
    /// Creates a trusted state.
    /// # Errors
    /// Returns [`VerificationError::InvalidTrustedState`] if `next_validators` does not hash to the
    /// header's `next_validators_hash`.
    pub fn new(
        signed_header: SignedHeader,
        next_validators: ValidatorSet,
    ) -> Result<Self, VerificationError> {
        let expected = signed_header.header().next_validators_hash;
        let found = next_validators.hash();
        ensure!(
            expected == found,
            VerificationError::InvalidTrustedState { expected, found }
        );
        Ok(Self {
            signed_header,
            next_validators,
        })
    }

    /// The trusted signed header.
    #[must_use]
    pub const fn signed_header(&self) -> &SignedHeader {
        &self.signed_header
    }

    /// The validator set expected to sign the next block.
    #[must_use]
    pub const fn next_validators(&self) -> &ValidatorSet {
        &self.next_validators
    }

    /// Height of the trusted header.
    #[must_use]
    pub const fn height(&self) -> u64 {
        self.signed_header.height()
    }
}

/// A signed header with the validator sets for its own and the next block
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct LightBlock {
    /// Header and commit
    pub signed_header: SignedHeader,
    /// Validators that signed this block
    pub validators: ValidatorSet,
    /// Validators for the next block
    pub next_validators: ValidatorSet,
}

impl LightBlock {
    /// Height of the block.
    #[must_use]
    pub const fn height(&self) -> u64 {
        self.signed_header.height()
    }

    /// Turns the block into a trusted state, dropping its own validator set.
    /// # Errors
    /// Returns [`VerificationError::InvalidTrustedState`] if `next_validators` does not match the
    /// header.
    pub fn into_trusted(self) -> Result<TrustedState, VerificationError> {
        TrustedState::new(self.signed_header, self.next_validators)
    }
}

/// The sequence of accepted trusted states, starting from a root the caller trusts.
///
/// Each state is verified against the one before it, and a failed verification leaves the log
/// untouched.
#[derive(Clone, Debug)]
pub struct TrustLog {
    chain_id: String,
    root: TrustedState,
    accepted: Vec<TrustedState>,
}

impl TrustLog {
    /// Starts a log at `root`.
    #[must_use]
    pub fn new(root: TrustedState) -> Self {
        Self {
            chain_id: root.signed_header.chain_id().to_string(),
            root,
            accepted: Vec::new(),
        }
    }

    /// The chain every entry belongs to.
    #[must_use]
    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    /// The most recently accepted state, or the root.
    #[must_use]
    pub fn latest(&self) -> &TrustedState {
        self.accepted.last().unwrap_or(&self.root)
    }

    /// Number of states including the root.
    #[must_use]
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.accepted.len() + 1
    }

    /// Iterates the states from the root to the latest.
    pub fn iter(&self) -> impl Iterator<Item = &TrustedState> {
        std::iter::once(&self.root).chain(&self.accepted)
    }

    /// Verifies `block` against the latest state and appends it on success.
    /// # Errors
    /// Returns the verification failure, or [`VerificationError::InvalidTrustedState`] if the
    /// block's next validators do not match its header. The log is unchanged on error.
    #[tracing::instrument(skip_all, fields(height = block.height()))]
    pub fn verify_and_append<V: SignatureVerifier>(
        &mut self,
        verifier: &Verifier<V>,
        options: &Options,
        block: LightBlock,
        now: OffsetDateTime,
    ) -> Result<&TrustedState, VerificationError> {
        let latest = self.latest();
        verifier.verify(
            &self.chain_id,
            latest.signed_header(),
            latest.next_validators(),
            &block.signed_header,
            &block.validators,
            options,
            now,
        )?;

        let state = block.into_trusted()?;
        tracing::info!(height = state.height(), "trusted state appended");
        self.accepted.push(state);
        Ok(self.latest())
    }
}

/// Applies `blocks` to `log` in order, reporting the accepted height or the error for each.
///
/// A rejected block does not move the anchor, so later blocks are verified against the last
/// accepted state.
pub fn verify_sequence<V, I>(
    log: &mut TrustLog,
    verifier: &Verifier<V>,
    options: &Options,
    blocks: I,
    now: OffsetDateTime,
) -> Vec<Result<u64, VerificationError>>
where
    V: SignatureVerifier,
    I: IntoIterator<Item = LightBlock>,
{
    blocks
        .into_iter()
        .map(|block| {
            log.verify_and_append(verifier, options, block, now)
                .map(TrustedState::height)
                .inspect_err(|err| tracing::warn!(kind = %err.kind(), %err, "block rejected"))
        })
        .collect()
}

#[cfg(test)]
mod test {
    use rstest::rstest;

    use super::{verify_sequence, TrustLog, TrustedState};
    use crate::{
        error::{ErrorKind, VerificationError},
        test_utils::{
            fixtures,
            generator::{validator_set, BlockBuilder, TestValidator},
        },
        verifier::{Options, Verifier},
    };

    fn abc() -> Vec<TestValidator> {
        vec![
            TestValidator::new(1, 1),
            TestValidator::new(2, 1),
            TestValidator::new(3, 1),
        ]
    }

    fn at(secs: i64) -> time::OffsetDateTime {
        fixtures::GENESIS + time::Duration::seconds(secs)
    }

    fn root() -> TrustedState {
        BlockBuilder::new("test-chain", 1, at(0), abc())
            .build()
            .unwrap()
            .into_trusted()
            .unwrap()
    }

    #[test]
    fn test_trusted_state_rejects_wrong_next_validators() {
        let block = BlockBuilder::new("test-chain", 1, at(0), abc()).build().unwrap();
        let other = validator_set(&[TestValidator::new(9, 1)]).unwrap();

        let err = TrustedState::new(block.signed_header.clone(), other.clone()).unwrap_err();
        assert_eq!(
            err,
            VerificationError::InvalidTrustedState {
                expected: block.signed_header.header().next_validators_hash,
                found: other.hash(),
            }
        );
        assert_eq!(err.kind(), ErrorKind::InvalidValidatorSet);
    }

    #[test]
    fn test_trusted_state_serde_validates() {
        let state = root();
        let json = serde_json::to_value(&state).unwrap();
        let decoded: TrustedState = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(decoded, state);

        let mut tampered = json;
        tampered["next_validators"] =
            serde_json::to_value(validator_set(&[TestValidator::new(9, 1)]).unwrap()).unwrap();
        assert!(serde_json::from_value::<TrustedState>(tampered).is_err());
    }

    #[test]
    fn test_append_moves_the_anchor() {
        let mut log = TrustLog::new(root());
        let verifier = Verifier::default();

        let block = BlockBuilder::new("test-chain", 2, at(10), abc()).build().unwrap();
        let latest = log
            .verify_and_append(&verifier, &Options::default(), block, at(20))
            .unwrap();
        assert_eq!(latest.height(), 2);
        assert_eq!(log.len(), 2);
        assert_eq!(log.latest().height(), 2);
        assert_eq!(log.iter().map(TrustedState::height).collect::<Vec<_>>(), [1, 2]);
    }

    #[test]
    fn test_rejection_leaves_log_untouched() {
        let mut log = TrustLog::new(root());
        let verifier = Verifier::default();

        let block = BlockBuilder::new("test-chain", 2, at(10), abc())
            .signers(&[1])
            .build()
            .unwrap();
        let err = log
            .verify_and_append(&verifier, &Options::default(), block, at(20))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCommit);
        assert_eq!(log.len(), 1);
        assert_eq!(log.latest(), &root());
    }

    #[test]
    fn test_verify_sequence_reports_each_block() {
        let mut log = TrustLog::new(root());
        let blocks = vec![
            BlockBuilder::new("test-chain", 2, at(10), abc()).build().unwrap(),
            // rejected: only one of three signs
            BlockBuilder::new("test-chain", 3, at(20), abc())
                .signers(&[1])
                .build()
                .unwrap(),
            // still verified against height 2
            BlockBuilder::new("test-chain", 3, at(30), abc()).build().unwrap(),
        ];

        let outcomes = verify_sequence(
            &mut log,
            &Verifier::default(),
            &Options::default(),
            blocks,
            at(40),
        );
        let outcomes: Vec<_> = outcomes
            .into_iter()
            .map(|outcome| outcome.map_err(|e| e.kind()))
            .collect();
        assert_eq!(
            outcomes,
            [Ok(2), Err(ErrorKind::InvalidCommit), Ok(3)]
        );
        assert_eq!(log.latest().height(), 3);
    }

    #[rstest]
    #[case::adjacent_full_quorum("adjacent_full_quorum")]
    #[case::skip_trust_level("skip_trust_level")]
    #[case::skip_insufficient_voting_power("skip_insufficient_voting_power")]
    #[case::expired_trusted_header("expired_trusted_header")]
    #[case::mixed_sequence("mixed_sequence")]
    #[case::validator_rotation("validator_rotation")]
    fn test_fixture_scenarios(#[case] name: &str) {
        let scenario: fixtures::Scenario = fixtures::load(name);
        let mismatches = scenario.mismatches().unwrap();
        assert!(
            mismatches.is_empty(),
            "{}: {}\n{}",
            name,
            scenario.description,
            mismatches.join("\n")
        );
    }
}
