//! Runner for the `verify` subcommand.

use std::{
    fmt,
    io::{self, Write},
};

use tendermint_lite_client::{verify_sequence, Options, TrustLog, VerificationError, Verifier};

use crate::{cli::command::VerifyCmd, config::Config, trace::TraceFile};

/// Outcome of verifying one block of a trace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockOutcome {
    /// Height of the block
    pub height: u64,
    /// The verification result
    pub result: Result<(), VerificationError>,
}

impl fmt::Display for BlockOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.result {
            Ok(()) => write!(f, "height {}: accepted", self.height),
            Err(err) => write!(f, "height {}: rejected ({}): {err}", self.height, err.kind()),
        }
    }
}

/// Verifies every block of `trace` in order, each against the last accepted block.
/// # Errors
/// Returns an error if the trace chain id differs from the chain of its trusted root.
pub fn verify_trace(trace: TraceFile, options: &Options) -> anyhow::Result<Vec<BlockOutcome>> {
    let mut log = TrustLog::new(trace.trusted);
    anyhow::ensure!(
        log.chain_id() == trace.chain_id,
        "trace chain id {} does not match the trusted root chain id {}",
        trace.chain_id,
        log.chain_id()
    );

    let heights: Vec<u64> = trace.blocks.iter().map(|block| block.height()).collect();
    let results = verify_sequence(
        &mut log,
        &Verifier::default(),
        options,
        trace.blocks,
        trace.now,
    );
    tracing::info!(
        latest = log.latest().height(),
        accepted = log.len() - 1,
        "trace verified"
    );

    Ok(heights
        .into_iter()
        .zip(results)
        .map(|(height, result)| BlockOutcome {
            height,
            result: result.map(|_| ()),
        })
        .collect())
}

/// Verifies the trace given on the command line and prints one line per block.
/// # Errors
/// Returns an error if the inputs cannot be loaded or any block is rejected.
pub fn run(args: VerifyCmd) -> anyhow::Result<()> {
    let config = args.config.as_ref().map(Config::load).transpose()?.unwrap_or_default();
    let options = config.options(&args.trust_options);
    tracing::debug!(?options, "verification options");

    let trace = TraceFile::load(&args.trace)?;
    let outcomes = verify_trace(trace, &options)?;

    let mut stdout = io::stdout().lock();
    for outcome in &outcomes {
        writeln!(stdout, "{outcome}")?;
    }

    let rejected = outcomes.iter().filter(|o| o.result.is_err()).count();
    anyhow::ensure!(
        rejected == 0,
        "{rejected} of {} blocks rejected",
        outcomes.len()
    );
    Ok(())
}
