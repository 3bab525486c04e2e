// src/error.rs

//! Typed errors for the grading engine.
//!
//! There are only two classes of failure:
//! - [`ConfigError`]: the configuration could not be loaded or resolved.
//!   These are fatal and reported once, before any grading happens.
//! - [`RunError`]: a run trigger was refused (unknown target, or the
//!   correction is already running).
//!
//! Anything that goes wrong *inside* a run (the script could not start,
//! exited nonzero, timed out) is not an error at all: it is folded into an
//! [`ExecutionResult`](crate::activity::ExecutionResult) so siblings keep
//! grading.

use std::path::PathBuf;

use thiserror::Error;

use crate::activity::CorrectionId;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file was read but is not a valid JSON/YAML document.
    #[error("failed to parse config file {path:?}: {message}")]
    Parse { path: PathBuf, message: String },

    /// A required key has no value anywhere in the ancestor chain.
    #[error("missing required field `{field}` at {at}")]
    MissingField { field: String, at: String },

    /// A value has the wrong shape (e.g. a map where a list is expected).
    #[error("malformed config at {at}: expected {expected}")]
    Malformed { at: String, expected: &'static str },

    /// `func_expect` names a check that is not in the registry.
    #[error("unknown verification check `{name}` at {at} (known checks: {known})")]
    UnknownCheck {
        name: String,
        at: String,
        known: String,
    },

    /// The argument of a regex check does not compile. Look-around and
    /// backreferences are not part of the supported syntax.
    #[error(
        "invalid pattern {pattern:?} at {at}: {message} \
         (look-around and backreferences are not supported)"
    )]
    InvalidPattern {
        pattern: String,
        at: String,
        message: String,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RunError {
    #[error("correction {0} is already running")]
    AlreadyRunning(CorrectionId),

    #[error("no question with index {0}")]
    UnknownQuestion(usize),

    #[error("no correction {0}")]
    UnknownCorrection(CorrectionId),
}
