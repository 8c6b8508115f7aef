use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use log::warn;
use uuid::Uuid;

use super::{Event, EventSink};

/// Per-run event log. Assigns sequence numbers, buffers events until the
/// orchestrator drains them into the run record and forwards each one to an
/// optional downstream sink.
pub struct EventRecorder {
    run_id: Uuid,
    next_seq: AtomicU64,
    buffer: Mutex<Vec<Event>>,
    downstream: Option<Arc<dyn EventSink>>,
}

impl EventRecorder {
    /// `start_seq` continues the numbering of events already on the record.
    pub fn new(run_id: Uuid, start_seq: u64, downstream: Option<Arc<dyn EventSink>>) -> Self {
        Self { run_id,
               next_seq: AtomicU64::new(start_seq),
               buffer: Mutex::new(Vec::new()),
               downstream }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Takes every buffered event, oldest first.
    pub fn drain(&self) -> Vec<Event> {
        match self.buffer.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl EventSink for EventRecorder {
    fn publish(&self, mut event: Event) {
        match self.buffer.lock() {
            Ok(mut guard) => {
                // seq is taken under the lock so buffer order and seq agree
                event.seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
                guard.push(event.clone());
            }
            Err(_) => {
                warn!("event buffer poisoned for run {}", self.run_id);
                return;
            }
        }
        if let Some(sink) = &self.downstream {
            sink.publish(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::InMemoryEventStore;
    use crate::model::NodeName;

    #[test]
    fn assigns_sequence_and_forwards() {
        let run_id = Uuid::new_v4();
        let store = Arc::new(InMemoryEventStore::new());
        let rec = EventRecorder::new(run_id, 5, Some(store.clone()));
        rec.publish(Event::start(run_id, NodeName::Plan, "plan"));
        rec.publish(Event::end(run_id, NodeName::Plan, "plan", 3, Default::default(), vec![]));

        let drained = rec.drain();
        assert_eq!(drained.iter().map(|e| e.seq).collect::<Vec<_>>(), vec![5, 6]);
        assert!(rec.drain().is_empty());
        assert_eq!(store.list(run_id), drained);
    }
}
