//! scriptgrader
//!
//! Grading engine for student-submitted scripts: resolves a hierarchical
//! activity configuration, runs every correction as a bounded external
//! process, verifies the captured output and aggregates scores.

pub mod activity;
pub mod checks;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod process;
pub mod report;
pub mod resolve;
pub mod run_id;
pub mod runner;
pub mod score;
pub mod sinks;

pub use activity::{
    Activity, Correction, CorrectionId, CorrectionState, ExecutionResult, Outcome, Question,
};
pub use config::load_activity;
pub use engine::Grader;
pub use error::{ConfigError, RunError};
pub use resolve::{merge, resolve};
pub use score::{ActivitySummary, QuestionSummary};
