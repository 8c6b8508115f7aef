use dashmap::DashMap;
use uuid::Uuid;

use super::Event;

/// Observer of stage events. Publishing never fails and never changes the
/// behavior of the run; sinks that cannot keep up must drop events.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: Event);
}

/// Append-only event store keyed by run, for tests and demos.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    runs: DashMap<Uuid, Vec<Event>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events of a run in publication order.
    pub fn list(&self, run_id: Uuid) -> Vec<Event> {
        self.runs.get(&run_id).map(|events| events.value().clone()).unwrap_or_default()
    }

    pub fn run_ids(&self) -> Vec<Uuid> {
        self.runs.iter().map(|entry| *entry.key()).collect()
    }
}

impl EventSink for InMemoryEventStore {
    fn publish(&self, event: Event) {
        self.runs.entry(event.run_id).or_default().push(event);
    }
}
