pub mod collecting;
pub mod log;

pub use collecting::CollectingEventSink;
pub use log::TracingEventSink;
