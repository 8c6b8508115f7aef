//! Run record and its state machine.
//!
//! A `WorkflowRun` is created at submission and mutated only through
//! `RunPatch` merges: node outputs are added under new keys (never
//! overwritten), events are appended, status moves monotonically toward a
//! terminal state and `fix_iterations` never decreases. Once terminal the
//! record rejects every patch.
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

use super::{NodeName, ScopeContext};
use crate::constants::MAX_FIX_ITERATIONS;
use crate::errors::RepositoryError;
use crate::event::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled)
    }

    /// Allowed transitions: pending -> running|failed|cancelled and
    /// running -> completed|failed|cancelled.
    pub fn can_transition_to(self, next: RunStatus) -> bool {
        matches!((self, next),
                 (RunStatus::Pending, RunStatus::Running | RunStatus::Failed | RunStatus::Cancelled)
                 | (RunStatus::Running, RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled))
    }
}

/// `{type, message}` recorded on a failed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFailure {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
}

/// Output of one node invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeOutput {
    pub node: NodeName,
    pub iteration: u32,
    pub artifact: Value,
    pub scores: Option<BTreeMap<String, f64>>,
    pub duration_ms: u64,
}

/// Everything needed to start an identical run again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInputs {
    pub manifest: Value,
    pub blueprint: Value,
    pub global_seed: u64,
    pub scope: ScopeContext,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub run_id: Uuid,
    pub song_id: Uuid,
    pub status: RunStatus,
    pub current_node: Option<NodeName>,
    pub fix_iterations: u32,
    pub validation_scores: Option<Value>,
    pub error: Option<RunFailure>,
    pub node_outputs: IndexMap<String, NodeOutput>,
    pub event_stream: Vec<Event>,
    pub inputs: RunInputs,
    /// Run this one was retried from, if any.
    pub retry_of: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowRun {
    /// New pending run.
    pub fn new(song_id: Uuid, inputs: RunInputs) -> Self {
        let now = Utc::now();
        Self { run_id: Uuid::new_v4(),
               song_id,
               status: RunStatus::Pending,
               current_node: None,
               fix_iterations: 0,
               validation_scores: None,
               error: None,
               node_outputs: IndexMap::new(),
               event_stream: Vec::new(),
               inputs,
               retry_of: None,
               created_at: now,
               updated_at: now }
    }

    pub fn global_seed(&self) -> u64 {
        self.inputs.global_seed
    }

    /// Merges `patch` into the record, enforcing the run invariants. The
    /// record is left untouched when an error is returned.
    pub fn apply(&mut self, patch: RunPatch) -> Result<(), RepositoryError> {
        if self.status.is_terminal() {
            return Err(RepositoryError::Terminal { run_id: self.run_id,
                                                   status: self.status });
        }
        if let Some(next) = patch.status {
            if next != self.status && !self.status.can_transition_to(next) {
                return Err(RepositoryError::InvalidTransition { from: self.status, to: next });
            }
        }
        if let Some(n) = patch.fix_iterations {
            if n < self.fix_iterations {
                return Err(RepositoryError::FixIterationsDecrease { current: self.fix_iterations,
                                                                    requested: n });
            }
            if n > MAX_FIX_ITERATIONS {
                return Err(RepositoryError::FixIterationsExceeded(n));
            }
        }

        if let Some(next) = patch.status {
            self.status = next;
        }
        if let Some(node) = patch.current_node {
            self.current_node = Some(node);
        }
        if let Some(n) = patch.fix_iterations {
            self.fix_iterations = n;
        }
        if let Some(scores) = patch.validation_scores {
            self.validation_scores = Some(scores);
        }
        if let Some(err) = patch.error {
            self.error = Some(err);
        }
        for (key, output) in patch.node_outputs {
            if self.node_outputs.contains_key(&key) {
                debug!("run {}: keeping existing output '{}'", self.run_id, key);
                continue;
            }
            self.node_outputs.insert(key, output);
        }
        self.event_stream.extend(patch.events);
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Append/merge update for a run record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunPatch {
    pub status: Option<RunStatus>,
    pub current_node: Option<NodeName>,
    pub fix_iterations: Option<u32>,
    pub validation_scores: Option<Value>,
    pub error: Option<RunFailure>,
    pub node_outputs: Vec<(String, NodeOutput)>,
    pub events: Vec<Event>,
}

impl RunPatch {
    pub fn status(status: RunStatus) -> Self {
        Self { status: Some(status),
               ..Self::default() }
    }

    pub fn entering(node: NodeName) -> Self {
        Self { current_node: Some(node),
               ..Self::default() }
    }

    pub fn with_output(mut self, key: String, output: NodeOutput) -> Self {
        self.node_outputs.push((key, output));
        self
    }

    pub fn with_events(mut self, events: Vec<Event>) -> Self {
        self.events.extend(events);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
