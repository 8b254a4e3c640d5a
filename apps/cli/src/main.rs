//! confluence-export: export Confluence pages to Markdown, HTML, plain text
//! and PDF, keeping or flattening the page hierarchy.

mod commands;
mod progress;
mod settings;

use std::process::ExitCode;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    // Values from .env become visible to clap's `env` fallbacks.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    commands::run(cli).await
}
