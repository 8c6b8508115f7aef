//! Event types.
//!
//! Every stage invocation emits exactly one `Start` event and exactly one
//! terminal event (`End` xor `Fail`). Events are FIFO per run: `seq` is
//! assigned in publication order by the run's `EventRecorder`.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::errors::ErrorKind;
use crate::model::NodeName;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventPhase {
    Start,
    End,
    Fail,
}

impl EventPhase {
    pub fn is_terminal(self) -> bool {
        !matches!(self, EventPhase::Start)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub seq: u64,
    pub ts: DateTime<Utc>,
    pub run_id: Uuid,
    pub node: NodeName,
    pub skill: String,
    pub phase: EventPhase,
    /// Wall-clock duration of the wrapped call; `None` on start events.
    pub duration_ms: Option<u64>,
    pub metrics: BTreeMap<String, f64>,
    pub issues: Vec<String>,
    pub error_type: Option<ErrorKind>,
    pub message: Option<String>,
}

impl Event {
    pub fn start(run_id: Uuid, node: NodeName, skill: &str) -> Self {
        Self { seq: 0,
               ts: Utc::now(),
               run_id,
               node,
               skill: skill.to_string(),
               phase: EventPhase::Start,
               duration_ms: None,
               metrics: BTreeMap::new(),
               issues: Vec::new(),
               error_type: None,
               message: None }
    }

    pub fn end(run_id: Uuid, node: NodeName, skill: &str, duration_ms: u64, metrics: BTreeMap<String, f64>, issues: Vec<String>) -> Self {
        Self { phase: EventPhase::End,
               duration_ms: Some(duration_ms),
               metrics,
               issues,
               ..Self::start(run_id, node, skill) }
    }

    pub fn fail(run_id: Uuid, node: NodeName, skill: &str, duration_ms: u64, kind: ErrorKind, message: &str) -> Self {
        Self { phase: EventPhase::Fail,
               duration_ms: Some(duration_ms),
               error_type: Some(kind),
               message: Some(message.to_string()),
               ..Self::start(run_id, node, skill) }
    }
}
