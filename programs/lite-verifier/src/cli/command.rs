//! Contains the command line interface for the application.

use std::{convert::Infallible, path::PathBuf, str::FromStr};

use clap::{Parser, Subcommand};
use tendermint_lite_client::TrustLevel;

/// The command line interface for the lite verifier.
#[derive(Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct LiteVerifierCli {
    /// Log filter, e.g. `debug` or `info,tendermint_lite_client=trace`.
    #[clap(long, global = true, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// The subcommands for the lite verifier.
#[derive(Clone, Subcommand)]
pub enum Commands {
    /// Verify every block of a trace file against its trusted root.
    Verify(VerifyCmd),
    /// Materialize a scenario fixture into a trace file.
    Fixtures(FixturesCmd),
}

/// The trust options for verification. Each one overrides the config file.
#[derive(Clone, Default, Parser)]
pub struct TrustOptions {
    /// Trust level.
    #[clap(
        long,
        value_parser = TrustLevel::from_str,
        help = "Trust level as a fraction, e.g. '2/3' [default: 1/3]",
    )]
    pub trust_level: Option<TrustLevel>,

    /// Trusting period in seconds. [default: two weeks]
    #[clap(long)]
    pub trusting_period: Option<u64>,

    /// Maximum clock drift in seconds. [default: 15]
    #[clap(long)]
    pub clock_drift: Option<u64>,
}

/// The arguments for the `verify` subcommand.
#[derive(Clone, Parser)]
pub struct VerifyCmd {
    /// Trace file to verify.
    #[clap(long)]
    pub trace: PathBuf,

    /// TOML config file with the default trust options.
    #[clap(long, env = "LITE_VERIFIER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Trust options
    #[clap(flatten)]
    pub trust_options: TrustOptions,
}

/// The arguments for the `fixtures` subcommand.
#[derive(Clone, Parser)]
pub struct FixturesCmd {
    /// Scenario fixture to materialize.
    #[clap(long)]
    pub scenario: PathBuf,

    /// Trace path. If not provided, the output will be written to stdout.
    #[clap(long, short = 'o', value_parser = parse_output_path, default_value = "-")]
    pub output_path: OutputPath,
}

/// The output path for files.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputPath {
    /// Write the output to stdout.
    Stdout,
    /// Write the output to a file.
    File(PathBuf),
}

fn parse_output_path(path: &str) -> Result<OutputPath, Infallible> {
    if path == "-" {
        Ok(OutputPath::Stdout)
    } else {
        Ok(OutputPath::File(PathBuf::from(path)))
    }
}
