// src/main.rs

//! scriptgrader
//!
//! Entry point for the scriptgrader CLI.
//!
//! Responsibilities of this file:
//! - Parse CLI arguments
//! - Initialise logging and the async runtime
//! - Hand off execution to the runner

use anyhow::Result;
use clap::Parser;

use scriptgrader::{cli, logging, runner};

/// Program entry point.
///
/// Uses Tokio because submissions are spawned and awaited as child
/// processes, several at a time.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    logging::init();

    runner::run(cli).await
}
