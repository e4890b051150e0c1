//! Runner for the `fixtures` subcommand.

use std::fs::File;

use anyhow::Context;
use tendermint_lite_client::test_utils::fixtures::Scenario;

use crate::{
    cli::command::{FixturesCmd, OutputPath},
    trace::TraceFile,
};

/// Materializes the scenario given on the command line and writes the trace.
/// # Errors
/// Returns an error if the scenario cannot be read or materialized, or the trace cannot be written.
pub fn run(args: FixturesCmd) -> anyhow::Result<()> {
    let file = File::open(&args.scenario)
        .with_context(|| format!("failed to open scenario {}", args.scenario.display()))?;
    let scenario: Scenario = serde_json::from_reader(file)
        .with_context(|| format!("failed to parse scenario {}", args.scenario.display()))?;

    let trace = TraceFile::from_scenario(&scenario)?;
    tracing::info!(
        description = %scenario.description,
        blocks = trace.blocks.len(),
        "scenario materialized"
    );

    match args.output_path {
        OutputPath::File(path) => {
            std::fs::write(path, serde_json::to_string_pretty(&trace)?)?;
        }
        OutputPath::Stdout => {
            println!("{}", serde_json::to_string_pretty(&trace)?);
        }
    }

    Ok(())
}
