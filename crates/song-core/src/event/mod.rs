//! Structured stage events and the optional observer sinks.

mod metrics;
mod recorder;
mod store;
mod types;

pub use metrics::{InMemoryMetricsSink, MetricStatus, MetricsSink, SkillMetrics};
pub use recorder::EventRecorder;
pub use store::{EventSink, InMemoryEventStore};
pub use types::{Event, EventPhase};
