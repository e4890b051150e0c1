use anyhow::Result;
use clap::Parser;
use tendermint_lite_verifier::{
    cli::command::{Commands, LiteVerifierCli},
    runners,
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = LiteVerifierCli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&cli.log_level)?)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Verify(cmd) => runners::verify::run(cmd),
        Commands::Fixtures(cmd) => runners::fixtures::run(cmd),
    }
}
