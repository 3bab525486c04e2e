// src/engine/mod.rs

//! Run triggers.
//!
//! A [`Grader`] owns the resolved activity and hands corrections to the
//! process runner, one tokio task per correction, at most `jobs` at a time.
//! Each correction writes only its own result slot; summaries are computed
//! after the tasks that produced them have been joined.

use std::num::NonZeroUsize;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::activity::{Activity, CorrectionId, ExecutionResult};
use crate::error::RunError;
use crate::process;
use crate::run_id::RunId;
use crate::score::{ActivitySummary, QuestionSummary};

pub mod events;
pub mod sink;

use events::{GradingEvent, GradingEventKind};
use sink::EventSink;

pub struct Grader {
    activity: Arc<Activity>,
    sink: Arc<dyn EventSink>,
    jobs: usize,
}

impl Grader {
    pub fn new(activity: Activity, sink: Arc<dyn EventSink>) -> Self {
        Self {
            activity: Arc::new(activity),
            sink,
            jobs: default_jobs(),
        }
    }

    /// Limit how many processes run at once (minimum 1).
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn activity(&self) -> &Activity {
        &self.activity
    }

    pub fn summary(&self) -> ActivitySummary {
        self.activity.summary()
    }

    /// Run a single correction and return its result.
    ///
    /// Fails with [`RunError::AlreadyRunning`] if that correction has a run
    /// in progress.
    pub async fn run_correction(&self, id: CorrectionId) -> Result<ExecutionResult, RunError> {
        execute(&self.activity, id, self.sink.as_ref()).await
    }

    /// Run every correction of question `question` (0-based).
    pub async fn run_question(&self, question: usize) -> Result<QuestionSummary, RunError> {
        let corrections = self
            .activity
            .questions
            .get(question)
            .ok_or(RunError::UnknownQuestion(question))?
            .corrections
            .len();

        let ids = (0..corrections)
            .map(|correction| CorrectionId {
                question,
                correction,
            })
            .collect();
        self.run_many(ids).await;

        Ok(self.activity.questions[question].summary())
    }

    /// Run every correction of the activity.
    pub async fn run_all(&self) -> ActivitySummary {
        self.run_many(self.activity.correction_ids()).await;
        self.activity.summary()
    }

    async fn run_many(&self, ids: Vec<CorrectionId>) {
        let permits = Arc::new(Semaphore::new(self.jobs));
        let mut tasks = JoinSet::new();

        for id in ids {
            let activity = Arc::clone(&self.activity);
            let sink = Arc::clone(&self.sink);
            let permits = Arc::clone(&permits);

            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                if let Err(e) = execute(&activity, id, sink.as_ref()).await {
                    tracing::warn!(error = %e, "skipping correction");
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "grading task failed");
            }
        }
    }
}

/// Trigger one run: `* -> Running -> {Correct, Incorrect}`.
async fn execute(
    activity: &Activity,
    id: CorrectionId,
    sink: &dyn EventSink,
) -> Result<ExecutionResult, RunError> {
    let correction = activity
        .correction(id)
        .ok_or(RunError::UnknownCorrection(id))?;
    let run_id = RunId::new();

    let Some(ticket) = correction.slot().begin() else {
        sink.emit(GradingEvent::new(&run_id, id, GradingEventKind::RunRejected));
        return Err(RunError::AlreadyRunning(id));
    };
    sink.emit(GradingEvent::new(&run_id, id, GradingEventKind::RunStarted));

    let result = process::run(correction).await;
    ticket.finish(result.clone());

    sink.emit(GradingEvent::new(
        &run_id,
        id,
        GradingEventKind::RunFinished {
            success: result.success,
            outcome: result.outcome,
        },
    ));

    Ok(result)
}

fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{Correction, Question};
    use crate::sinks::CollectingEventSink;

    fn activity() -> Activity {
        Activity {
            title: "t".into(),
            questions: vec![Question {
                description: "q".into(),
                points: Some(1),
                corrections: vec![Correction::new(
                    "sh".into(),
                    "/nonexistent/answer.sh".into(),
                    String::new(),
                    String::new(),
                    "wrong".into(),
                    Vec::new(),
                )],
            }],
        }
    }

    const FIRST: CorrectionId = CorrectionId {
        question: 0,
        correction: 0,
    };

    #[tokio::test]
    async fn rejects_run_while_running() {
        let sink = Arc::new(CollectingEventSink::new());
        let grader = Grader::new(activity(), sink.clone());

        let ticket = grader
            .activity()
            .correction(FIRST)
            .unwrap()
            .slot()
            .begin()
            .unwrap();

        assert_eq!(
            grader.run_correction(FIRST).await,
            Err(RunError::AlreadyRunning(FIRST))
        );
        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, GradingEventKind::RunRejected);

        drop(ticket);
    }

    #[tokio::test]
    async fn unknown_targets_are_errors() {
        let grader = Grader::new(activity(), Arc::new(CollectingEventSink::new()));
        let missing = CorrectionId {
            question: 0,
            correction: 7,
        };
        assert_eq!(
            grader.run_correction(missing).await,
            Err(RunError::UnknownCorrection(missing))
        );
        assert_eq!(
            grader.run_question(3).await,
            Err(RunError::UnknownQuestion(3))
        );
    }

    #[tokio::test]
    async fn run_emits_started_then_finished() {
        let sink = Arc::new(CollectingEventSink::new());
        let grader = Grader::new(activity(), sink.clone());

        let result = grader.run_correction(FIRST).await.unwrap();
        assert!(!result.success);

        let kinds: Vec<_> = sink.events().into_iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                GradingEventKind::RunStarted,
                GradingEventKind::RunFinished {
                    success: false,
                    outcome: result.outcome,
                },
            ]
        );
        assert_eq!(grader.summary().correct, 0);
    }
}
