//! promptlib CLI: batch prompt-library import tool.
//!
//! Extracts numbered prompts from a document, enriches them with AI
//! translations, tags and categories, and bulk-loads them into a table store.

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
