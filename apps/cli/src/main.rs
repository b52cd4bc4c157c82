//! GraphOps CLI — operator toolkit for an external knowledge-graph tool.
//!
//! Prepares input corpora (HTML ingestion, prefix batch splitting) and
//! drives the tool's init / prompt-tune / index / query subcommands with
//! filesystem-based resume bookkeeping.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
