// src/activity.rs

//! The resolved grading tree.
//!
//! An [`Activity`] is built once by [`crate::resolve`] and is read-only from
//! then on. The only mutable piece is the per-correction [`ResultSlot`],
//! which holds the state of the latest run and is replaced as a whole on
//! every re-run.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::checks::Verification;
use crate::score::{ActivitySummary, QuestionSummary};

#[derive(Debug, Serialize)]
pub struct Activity {
    pub title: String,
    pub questions: Vec<Question>,
}

#[derive(Debug, Serialize)]
pub struct Question {
    pub description: String,
    /// `None` or negative: points are neither displayed nor awarded.
    pub points: Option<i64>,
    pub corrections: Vec<Correction>,
}

#[derive(Debug, Serialize)]
pub struct Correction {
    /// Interpreter or binary, e.g. `python3`.
    pub command: String,
    /// Path of the submission to execute.
    pub script: String,
    /// Passed as one literal argument, never shell-split.
    pub args: String,
    /// Text written to the process's stdin.
    pub stdin: String,
    /// Shown when a verification fails.
    pub error_message: String,
    pub verifications: Vec<Verification>,
    /// Process working directory; relative scripts resolve against it.
    pub workdir: Option<PathBuf>,
    #[serde(rename = "state")]
    slot: ResultSlot,
}

/// Address of a correction inside an activity (0-based indices).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CorrectionId {
    pub question: usize,
    pub correction: usize,
}

impl fmt::Display for CorrectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Q{}.{}", self.question + 1, self.correction + 1)
    }
}

impl Activity {
    pub fn correction(&self, id: CorrectionId) -> Option<&Correction> {
        self.questions
            .get(id.question)?
            .corrections
            .get(id.correction)
    }

    /// Every correction address, in declaration order.
    pub fn correction_ids(&self) -> Vec<CorrectionId> {
        self.questions
            .iter()
            .enumerate()
            .flat_map(|(q, question)| {
                (0..question.corrections.len()).map(move |c| CorrectionId {
                    question: q,
                    correction: c,
                })
            })
            .collect()
    }

    pub fn summary(&self) -> ActivitySummary {
        ActivitySummary::of(self)
    }
}

impl Question {
    pub fn summary(&self) -> QuestionSummary {
        QuestionSummary::of(self)
    }

    /// Points to display next to the description, if any.
    pub fn display_points(&self) -> Option<i64> {
        self.points.filter(|p| *p >= 0)
    }
}

impl Correction {
    pub fn new(
        command: String,
        script: String,
        args: String,
        stdin: String,
        error_message: String,
        verifications: Vec<Verification>,
    ) -> Self {
        Self {
            command,
            script,
            args,
            stdin,
            error_message,
            verifications,
            workdir: None,
            slot: ResultSlot::default(),
        }
    }

    /// The process argument vector: exactly `[command, script, args]`.
    ///
    /// `args` stays a single element even when empty or containing spaces.
    pub fn argv(&self) -> [&str; 3] {
        [&self.command, &self.script, &self.args]
    }

    /// Human-readable command line (`args` omitted when empty).
    pub fn command_line(&self) -> String {
        let mut line = format!("{} {}", self.command, self.script);
        if !self.args.is_empty() {
            line.push(' ');
            line.push_str(&self.args);
        }
        line
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> CorrectionState {
        self.slot.get()
    }

    pub fn is_correct(&self) -> bool {
        self.slot.lock().is_correct()
    }

    pub(crate) fn slot(&self) -> &ResultSlot {
        &self.slot
    }
}

/* ---------------- results ---------------- */

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    VerificationFailed,
    ExitedNonZero,
    TimedOut,
    NotStarted,
    Aborted,
}

/// Outcome of running one correction's process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub outcome: Outcome,
    pub exit_code: i32,
    pub stdout: String,
    /// Captured stderr, or a diagnostic replacing it.
    pub stderr: String,
    pub duration_ms: u64,
}

impl ExecutionResult {
    /// Placeholder written when a run is dropped before it completes.
    pub(crate) fn aborted() -> Self {
        Self {
            success: false,
            outcome: Outcome::Aborted,
            exit_code: -1,
            stdout: String::new(),
            stderr: "Run aborted before completion.".to_string(),
            duration_ms: 0,
        }
    }
}

/// `NotRun -> Running -> {Correct, Incorrect}`; re-runs start over.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "result", rename_all = "snake_case")]
pub enum CorrectionState {
    #[default]
    NotRun,
    Running,
    Correct(ExecutionResult),
    Incorrect(ExecutionResult),
}

impl CorrectionState {
    pub fn is_correct(&self) -> bool {
        matches!(self, CorrectionState::Correct(_))
    }

    pub fn result(&self) -> Option<&ExecutionResult> {
        match self {
            CorrectionState::Correct(r) | CorrectionState::Incorrect(r) => Some(r),
            CorrectionState::NotRun | CorrectionState::Running => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CorrectionState::NotRun => "Not run",
            CorrectionState::Running => "Running",
            CorrectionState::Correct(_) => "Correct",
            CorrectionState::Incorrect(_) => "Incorrect",
        }
    }
}

impl From<ExecutionResult> for CorrectionState {
    fn from(result: ExecutionResult) -> Self {
        if result.success {
            CorrectionState::Correct(result)
        } else {
            CorrectionState::Incorrect(result)
        }
    }
}

/* ---------------- result slot ---------------- */

/// The single mutable "last result" of a correction.
///
/// Every write replaces the whole state under the lock, so readers see
/// either the previous state or the new one, never a mixture.
#[derive(Debug, Default)]
pub struct ResultSlot(Mutex<CorrectionState>);

impl Serialize for ResultSlot {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.get().serialize(serializer)
    }
}

impl ResultSlot {
    fn lock(&self) -> MutexGuard<'_, CorrectionState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self) -> CorrectionState {
        self.lock().clone()
    }

    /// Move to `Running`, discarding any previous terminal state.
    ///
    /// Returns `None` if a run is already in progress.
    pub fn begin(&self) -> Option<RunTicket<'_>> {
        let mut state = self.lock();
        if matches!(*state, CorrectionState::Running) {
            return None;
        }
        *state = CorrectionState::Running;
        Some(RunTicket {
            slot: self,
            finished: false,
        })
    }
}

/// Exclusive right to write the result of the run in progress.
///
/// Dropping it without [`RunTicket::finish`] records an aborted run.
#[derive(Debug)]
pub struct RunTicket<'a> {
    slot: &'a ResultSlot,
    finished: bool,
}

impl RunTicket<'_> {
    pub fn finish(mut self, result: ExecutionResult) {
        *self.slot.lock() = result.into();
        self.finished = true;
    }
}

impl Drop for RunTicket<'_> {
    fn drop(&mut self) {
        if !self.finished {
            *self.slot.lock() = ExecutionResult::aborted().into();
        }
    }
}
