use std::sync::{Mutex, PoisonError};

use crate::engine::events::GradingEvent;
use crate::engine::sink::EventSink;

/// An in-memory event sink that keeps every event of a grading session,
/// in emission order.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: Mutex<Vec<GradingEvent>>,
}

impl CollectingEventSink {
    /// Create a new, empty collecting sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of all events collected so far.
    pub fn events(&self) -> Vec<GradingEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl EventSink for CollectingEventSink {
    fn emit(&self, event: GradingEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
