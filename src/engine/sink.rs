use crate::engine::events::GradingEvent;

/// Receives grading events; the presentation layer re-renders from these.
///
/// Runs execute in parallel, so sinks are shared and take `&self`.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: GradingEvent);
}
