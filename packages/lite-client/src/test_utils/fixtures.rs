//! JSON scenarios describing a trusted root, a sequence of blocks, and the expected outcome of
//! verifying each block

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};
use tendermint_lite_utils::serde::duration_secs;
use time::{macros::datetime, OffsetDateTime};

use super::generator::{validator_set, BlockBuilder, TestValidator};
use crate::{
    error::{ErrorKind, VerificationError},
    store::{verify_sequence, LightBlock, TrustLog, TrustedState},
    trust_level::TrustLevel,
    verifier::{Options, Verifier, DEFAULT_CLOCK_DRIFT},
};

/// Reference time every scenario offset is relative to
pub const GENESIS: OffsetDateTime = datetime!(2020-01-01 0:00 UTC);

/// A validator in a scenario
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub struct ValidatorSpec {
    /// Key seed
    pub seed: u8,
    /// Voting power
    pub power: u64,
}

/// A block in a scenario
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct BlockSpec {
    /// Block height
    pub height: u64,
    /// Seconds after [`GENESIS`]
    pub time_offset: i64,
    /// Validators of the block
    pub validators: Vec<ValidatorSpec>,
    /// Validators of the next block, defaults to `validators`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_validators: Option<Vec<ValidatorSpec>>,
}

/// A block to verify and the expected outcome
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct StepSpec {
    /// The block
    #[serde(flatten)]
    pub block: BlockSpec,
    /// Chain id of the block, defaults to the scenario chain id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<String>,
    /// Seeds that sign the block, defaults to all validators
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signers: Option<Vec<u8>>,
    /// Seeds whose signatures are corrupted
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub corrupt_signers: Vec<u8>,
    /// Validator set handed to the verifier instead of the block's own
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provided_validators: Option<Vec<ValidatorSpec>>,
    /// `null` when the block must be accepted
    pub expected: Option<ErrorKind>,
}

/// A complete verification scenario
#[serde_as]
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct Scenario {
    /// What the scenario exercises
    pub description: String,
    /// Chain id of every block
    pub chain_id: String,
    /// Trust level as `numerator/denominator`
    #[serde_as(as = "DisplayFromStr")]
    pub trust_level: TrustLevel,
    /// Trusting period in seconds
    #[serde(with = "duration_secs")]
    pub trusting_period: Duration,
    /// Verification time, seconds after [`GENESIS`]
    pub now_offset: i64,
    /// The trusted root
    pub initial: BlockSpec,
    /// Blocks verified in order
    pub steps: Vec<StepSpec>,
}

fn test_validators(specs: &[ValidatorSpec]) -> Vec<TestValidator> {
    specs
        .iter()
        .map(|spec| TestValidator::new(spec.seed, spec.power))
        .collect()
}

fn block_builder(chain_id: &str, spec: &BlockSpec) -> BlockBuilder {
    let builder = BlockBuilder::new(
        chain_id,
        spec.height,
        GENESIS + time::Duration::seconds(spec.time_offset),
        test_validators(&spec.validators),
    );
    match &spec.next_validators {
        Some(next) => builder.next_validators(test_validators(next)),
        None => builder,
    }
}

impl Scenario {
    /// The verification time.
    #[must_use]
    pub fn now(&self) -> OffsetDateTime {
        GENESIS + time::Duration::seconds(self.now_offset)
    }

    /// Verification options, with the default clock drift.
    #[must_use]
    pub const fn options(&self) -> Options {
        Options {
            trust_level: self.trust_level,
            trusting_period: self.trusting_period,
            clock_drift: DEFAULT_CLOCK_DRIFT,
        }
    }

    /// Builds the trusted root and the signed blocks.
    /// # Errors
    /// Returns an error if a described validator set or block is itself invalid.
    pub fn materialize(&self) -> Result<(TrustedState, Vec<LightBlock>), VerificationError> {
        let root = block_builder(&self.chain_id, &self.initial)
            .build()?
            .into_trusted()?;

        let blocks: Vec<LightBlock> = self
            .steps
            .iter()
            .map(|step| -> Result<LightBlock, VerificationError> {
                let chain_id = step.chain_id.as_deref().unwrap_or(&self.chain_id);
                let mut builder =
                    block_builder(chain_id, &step.block).corrupt_signers(&step.corrupt_signers);
                if let Some(signers) = &step.signers {
                    builder = builder.signers(signers);
                }
                let mut block = builder.build()?;
                if let Some(provided) = &step.provided_validators {
                    block.validators = validator_set(&test_validators(provided))?;
                }
                Ok(block)
            })
            .collect::<Result<_, _>>()?;

        Ok((root, blocks))
    }

    /// Verifies every step in order, each against the last accepted state.
    /// # Errors
    /// Returns an error if the scenario cannot be materialized.
    pub fn run(&self) -> Result<Vec<Result<u64, VerificationError>>, VerificationError> {
        let (root, blocks) = self.materialize()?;
        let mut log = TrustLog::new(root);
        Ok(verify_sequence(
            &mut log,
            &Verifier::default(),
            &self.options(),
            blocks,
            self.now(),
        ))
    }

    /// Describes every step whose outcome differs from `expected`. Unexpected acceptance,
    /// unexpected rejection and a different error kind all count.
    /// # Errors
    /// Returns an error if the scenario cannot be materialized.
    pub fn mismatches(&self) -> Result<Vec<String>, VerificationError> {
        let outcomes = self.run()?;
        Ok(self
            .steps
            .iter()
            .zip(outcomes)
            .enumerate()
            .filter_map(|(index, (step, outcome))| {
                let height = step.block.height;
                match (step.expected, outcome) {
                    (None, Ok(_)) => None,
                    (Some(expected), Err(err)) if err.kind() == expected => None,
                    (None, Err(err)) => Some(format!(
                        "step {index} (height {height}): expected acceptance, got {}: {err}",
                        err.kind()
                    )),
                    (Some(expected), Err(err)) => Some(format!(
                        "step {index} (height {height}): expected {expected}, got {}: {err}",
                        err.kind()
                    )),
                    (Some(expected), Ok(_)) => Some(format!(
                        "step {index} (height {height}): expected {expected}, but it was accepted"
                    )),
                }
            })
            .collect())
    }
}

/// Loads a test fixture from `src/test_utils/fixtures/<name>.json`.
/// # Panics
/// Panics if the file cannot be opened or the contents cannot be deserialized
#[must_use]
pub fn load<T>(name: &str) -> T
where
    T: serde::de::DeserializeOwned,
{
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("src/test_utils/fixtures");
    path.push(format!("{name}.json"));

    let file = std::fs::File::open(path).unwrap();
    serde_json::from_reader(file).unwrap()
}

#[cfg(test)]
mod test {
    use super::{load, Scenario};
    use crate::error::ErrorKind;

    #[test]
    fn test_missing_error_is_a_mismatch() {
        let mut scenario: Scenario = load("adjacent_full_quorum");
        scenario.steps[0].expected = Some(ErrorKind::InvalidCommit);

        let mismatches = scenario.mismatches().unwrap();
        assert_eq!(mismatches.len(), 1);
        assert!(mismatches[0].contains("expected invalid_commit, but it was accepted"));
    }

    #[test]
    fn test_wrong_kind_is_a_mismatch() {
        let mut scenario: Scenario = load("skip_insufficient_voting_power");
        scenario.steps[0].expected = Some(ErrorKind::InvalidCommit);

        let mismatches = scenario.mismatches().unwrap();
        assert_eq!(mismatches.len(), 1);
        assert!(mismatches[0].contains("got insufficient_voting_power"));
    }

    #[test]
    fn test_unexpected_error_is_a_mismatch() {
        let mut scenario: Scenario = load("expired_trusted_header");
        scenario.steps[0].expected = None;

        let mismatches = scenario.mismatches().unwrap();
        assert_eq!(mismatches.len(), 1);
        assert!(mismatches[0].contains("expected acceptance, got expired_trusted_header"));
    }
}
