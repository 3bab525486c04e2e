// src/engine/events.rs

use serde::Serialize;
use std::time::SystemTime;

use crate::activity::{CorrectionId, Outcome};
use crate::run_id::RunId;

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GradingEventKind {
    RunStarted,
    RunFinished { success: bool, outcome: Outcome },
    /// A run was requested while the previous one was still in progress.
    RunRejected,
}

#[derive(Debug, Serialize, Clone)]
pub struct GradingEvent {
    pub run_id: RunId,
    pub correction: CorrectionId,
    #[serde(flatten)]
    pub kind: GradingEventKind,
    pub timestamp: SystemTime,
}

impl GradingEvent {
    pub fn new(run_id: &RunId, correction: CorrectionId, kind: GradingEventKind) -> Self {
        Self {
            run_id: run_id.clone(),
            correction,
            kind,
            timestamp: SystemTime::now(),
        }
    }
}
