// src/checks.rs

//! Output verification.
//!
//! This module is responsible for:
//! - The closed registry of named checks (`regex_match`, `not_regex_match`)
//! - Validating configuration-supplied check names against that registry
//! - Applying an ordered list of verifications to captured stdout
//!
//! Check names coming from the configuration are untrusted input. They are
//! only ever looked up by exact name, never evaluated. Adding a check means
//! adding an entry to [`REGISTRY`].
//!
//! Every registered check takes a regex argument. It is compiled once, when
//! the [`Verification`] is built during resolution, and reused for every run.

use regex::Regex;
use serde::{Serialize, Serializer};
use std::fmt;

/// Signature shared by every check: `(captured output, pattern) -> passed`.
pub type CheckFn = fn(&str, &Regex) -> bool;

/// A named entry of the registry.
#[derive(Clone, Copy)]
pub struct Check {
    name: &'static str,
    func: CheckFn,
}

impl Check {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn apply(&self, output: &str, pattern: &Regex) -> bool {
        (self.func)(output, pattern)
    }
}

impl PartialEq for Check {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Check {}

impl fmt::Debug for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Check").field(&self.name).finish()
    }
}

impl Serialize for Check {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name)
    }
}

/// Every check a configuration may name.
pub const REGISTRY: &[Check] = &[
    Check {
        name: "regex_match",
        func: regex_match,
    },
    Check {
        name: "not_regex_match",
        func: not_regex_match,
    },
];

/// Exact-name lookup in [`REGISTRY`].
pub fn lookup(name: &str) -> Option<Check> {
    REGISTRY.iter().copied().find(|c| c.name == name)
}

/// Comma-separated list of registered names, for error messages.
pub fn known_checks() -> String {
    REGISTRY
        .iter()
        .map(|c| c.name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Succeeds iff `pattern` matches anywhere in the trimmed output.
///
/// Leading/trailing newlines, carriage returns, tabs and spaces are removed
/// first.
pub fn regex_match(output: &str, pattern: &Regex) -> bool {
    let trimmed = output.trim_matches(|c| matches!(c, '\n' | '\r' | '\t' | ' '));
    pattern.is_match(trimmed)
}

pub fn not_regex_match(output: &str, pattern: &Regex) -> bool {
    !regex_match(output, pattern)
}

/// One resolved verification: a registered check plus its compiled argument.
#[derive(Debug, Clone, Serialize)]
pub struct Verification {
    pub check: Check,
    pub argument: String,
    #[serde(skip)]
    pattern: Regex,
}

impl Verification {
    /// Compile `argument` for `check`.
    ///
    /// Fails with the compiler's message when the pattern does not compile.
    /// Look-around and backreferences are not supported.
    pub fn new(check: Check, argument: impl Into<String>) -> Result<Self, regex::Error> {
        let argument = argument.into();
        let pattern = Regex::new(&argument)?;
        Ok(Self {
            check,
            argument,
            pattern,
        })
    }

    pub fn passes(&self, output: &str) -> bool {
        self.check.apply(output, &self.pattern)
    }
}

impl PartialEq for Verification {
    fn eq(&self, other: &Self) -> bool {
        self.check == other.check && self.argument == other.argument
    }
}

impl Eq for Verification {}

/// First verification that did not pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationFailed {
    /// Position in the verification list.
    pub index: usize,
    pub check: &'static str,
    /// The correction's fixed error message.
    pub message: String,
}

/// Apply `verifications` in order to `output`.
///
/// Stops at the first failing check. The failure always carries the
/// correction's own `error_message`, never a check-specific one.
/// An empty list passes.
pub fn verify(
    output: &str,
    verifications: &[Verification],
    error_message: &str,
) -> Result<(), VerificationFailed> {
    for (index, v) in verifications.iter().enumerate() {
        if !v.passes(output) {
            return Err(VerificationFailed {
                index,
                check: v.check.name(),
                message: error_message.to_string(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(name: &str, argument: &str) -> Verification {
        Verification::new(lookup(name).expect("registered check"), argument).unwrap()
    }

    fn re(pattern: &str) -> Regex {
        Regex::new(pattern).unwrap()
    }

    #[test]
    fn regex_match_trims_surrounding_blanks() {
        assert!(regex_match("  hello\r\n", &re("^hello$")));
        assert!(regex_match("\tfoo bar\n", &re("o b")));
        assert!(!regex_match("hello\n", &re("^world")));
    }

    #[test]
    fn not_regex_match_negates() {
        assert!(not_regex_match("hello\n", &re("world")));
        assert!(!not_regex_match("hello\n", &re("hel+o")));
    }

    #[test]
    fn lookup_is_exact() {
        assert_eq!(lookup("regex_match").map(|c| c.name()), Some("regex_match"));
        assert!(lookup("testar_regex").is_none());
        assert!(lookup("Regex_Match").is_none());
        assert!(lookup("regex_match ").is_none());
    }

    #[test]
    fn bad_pattern_is_rejected_when_building() {
        let check = lookup("regex_match").unwrap();
        assert!(Verification::new(check, "(unclosed").is_err());
        assert!(Verification::new(check, "(?!lookahead)").is_err());
        assert!(Verification::new(check, "ok+").is_ok());
    }

    #[test]
    fn compiled_pattern_is_reused() {
        let verification = v("regex_match", "^a+$");
        assert!(verification.passes("aaa\n"));
        assert!(!verification.passes("b"));
        assert_eq!(verification, v("regex_match", "^a+$"));
    }

    #[test]
    fn empty_list_passes() {
        assert_eq!(verify("anything", &[], "wrong"), Ok(()));
    }

    #[test]
    fn all_must_pass() {
        let list = [v("regex_match", "a"), v("not_regex_match", "z")];
        assert_eq!(verify("abc", &list, "wrong"), Ok(()));
    }

    #[test]
    fn first_failure_short_circuits_with_fixed_message() {
        let list = [v("regex_match", "nope"), v("regex_match", "abc")];
        let err = verify("abc", &list, "Expected greeting.").unwrap_err();
        assert_eq!(err.index, 0);
        assert_eq!(err.check, "regex_match");
        assert_eq!(err.message, "Expected greeting.");
    }

    #[test]
    fn later_failure_is_reported_at_its_index() {
        let list = [v("regex_match", "abc"), v("not_regex_match", "b")];
        let err = verify("abc", &list, "msg").unwrap_err();
        assert_eq!(err.index, 1);
        assert_eq!(err.check, "not_regex_match");
    }
}
