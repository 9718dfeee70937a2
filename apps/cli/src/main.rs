//! QueryHarvest CLI: harvest SPARQL examples from a public query catalog.
//!
//! Lists the catalog, extracts each query, optionally runs it against the
//! endpoint and writes one JSON document per example.

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
