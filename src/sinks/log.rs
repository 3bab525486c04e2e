use crate::engine::events::{GradingEvent, GradingEventKind};
use crate::engine::sink::EventSink;

/// Forwards grading events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: GradingEvent) {
        match event.kind {
            GradingEventKind::RunStarted => {
                tracing::debug!(run = %event.run_id, correction = %event.correction, "run started");
            }
            GradingEventKind::RunFinished { success, outcome } => {
                tracing::info!(
                    run = %event.run_id,
                    correction = %event.correction,
                    success,
                    ?outcome,
                    "run finished"
                );
            }
            GradingEventKind::RunRejected => {
                tracing::warn!(
                    correction = %event.correction,
                    "run rejected: previous run still in progress"
                );
            }
        }
    }
}
