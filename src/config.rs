// src/config.rs

//! Loading the activity configuration from disk.
//!
//! The configuration is a single JSON or YAML document (see
//! [`crate::resolve`] for its shape). A file ending in `.json` is parsed as
//! JSON; anything else is parsed as YAML, which also accepts plain JSON.
//!
//! Loading is all-or-nothing: a missing, unparsable or unresolvable file is
//! a [`ConfigError`] and no partial activity is ever produced.

use serde_json::Value;
use std::{fs, path::Path};

use crate::activity::Activity;
use crate::error::ConfigError;
use crate::resolve::resolve_in;

/// Default configuration file name, looked up in the current directory.
pub const DEFAULT_CONFIG: &str = "config.yaml";

/// Read and parse the raw document without resolving it.
pub fn load_document(path: &Path) -> Result<Value, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    let parsed: Result<Value, String> = if is_json {
        serde_json::from_str(&raw).map_err(|e| e.to_string())
    } else {
        serde_yaml::from_str(&raw).map_err(|e| e.to_string())
    };

    parsed.map_err(|message| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    })
}

/// Load and resolve an activity.
///
/// Correction processes run in the directory containing the config file,
/// and relative script paths are resolved against it.
pub fn load_activity(path: &Path) -> Result<Activity, ConfigError> {
    let document = load_document(path)?;
    let base = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    let activity = resolve_in(&document, Some(base))?;

    tracing::debug!(
        path = %path.display(),
        title = %activity.title,
        questions = activity.questions.len(),
        "configuration loaded"
    );

    Ok(activity)
}
