//! The trace file format: a trusted root and the blocks to verify from it.

use std::{fs::File, path::Path};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tendermint_lite_client::{
    test_utils::fixtures::Scenario, LightBlock, TrustedState, VerificationError,
};
use time::OffsetDateTime;

/// A trusted root and the blocks to verify from it, in order
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TraceFile {
    /// Chain every block must belong to
    pub chain_id: String,
    /// Verification time
    #[serde(with = "time::serde::rfc3339")]
    pub now: OffsetDateTime,
    /// The trusted root
    pub trusted: TrustedState,
    /// Blocks to verify
    pub blocks: Vec<LightBlock>,
}

impl TraceFile {
    /// Reads a trace from a JSON file.
    /// # Errors
    /// Returns an error if the file cannot be read or is not a valid trace.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file =
            File::open(path).with_context(|| format!("failed to open trace {}", path.display()))?;
        serde_json::from_reader(file)
            .with_context(|| format!("failed to parse trace {}", path.display()))
    }

    /// Materializes a scenario into a trace.
    /// # Errors
    /// Returns an error if the scenario describes an invalid validator set or block.
    pub fn from_scenario(scenario: &Scenario) -> Result<Self, VerificationError> {
        let (trusted, blocks) = scenario.materialize()?;
        Ok(Self {
            chain_id: scenario.chain_id.clone(),
            now: scenario.now(),
            trusted,
            blocks,
        })
    }
}
