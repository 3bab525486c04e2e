// src/cli.rs

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG;
use crate::report::OutputMode;

/// Automatic grader for student scripts.
///
/// The activity config (`config.yaml` or `config.json`) is the single
/// source of truth: it lists questions, the commands that run each
/// submission, the input they receive and the checks applied to their
/// output.
#[derive(Parser, Debug)]
#[command(name = "scriptgrader", version, disable_help_subcommand = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// All supported CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the corrections and print the results.
    Grade {
        /// Path to config file
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,

        /// Grade only this question (1-based)
        #[arg(short, long)]
        question: Option<usize>,

        /// Report format
        #[arg(short, long, value_enum, default_value_t = OutputMode::Simple)]
        output: OutputMode,

        /// Maximum number of submissions running at once
        ///
        /// Defaults to the number of available CPUs.
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Re-grade whenever the config or a script changes
        #[arg(long)]
        watch: bool,
    },

    /// Load and resolve the config without running anything.
    Validate {
        /// Path to config file
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,
    },

    /// Create a starter config.yaml and sample script.
    ///
    /// Existing files are never overwritten.
    Init,
}
