use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outcome recorded for one skill call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricStatus {
    Ok,
    ValidationError,
    ExecutionError,
}

/// Optional metrics collaborator.
pub trait MetricsSink: Send + Sync {
    fn record(&self, skill: &str, duration_ms: u64, status: MetricStatus);
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillMetrics {
    pub calls: u64,
    pub failures: u64,
    pub total_ms: u64,
    pub max_ms: u64,
}

/// Aggregates calls and durations per skill.
#[derive(Debug, Default)]
pub struct InMemoryMetricsSink {
    inner: DashMap<String, SkillMetrics>,
}

impl InMemoryMetricsSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ordered copy of the aggregates.
    pub fn snapshot(&self) -> BTreeMap<String, SkillMetrics> {
        self.inner.iter().map(|e| (e.key().clone(), e.value().clone())).collect()
    }
}

impl MetricsSink for InMemoryMetricsSink {
    fn record(&self, skill: &str, duration_ms: u64, status: MetricStatus) {
        let mut entry = self.inner.entry(skill.to_string()).or_default();
        entry.calls += 1;
        if status != MetricStatus::Ok {
            entry.failures += 1;
        }
        entry.total_ms += duration_ms;
        entry.max_ms = entry.max_ms.max(duration_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregates_per_skill() {
        let sink = InMemoryMetricsSink::new();
        sink.record("lyrics", 10, MetricStatus::Ok);
        sink.record("lyrics", 30, MetricStatus::ExecutionError);
        sink.record("style", 1, MetricStatus::Ok);
        let snap = sink.snapshot();
        assert_eq!(snap["lyrics"], SkillMetrics { calls: 2, failures: 1, total_ms: 40, max_ms: 30 });
        assert_eq!(snap["style"].calls, 1);
    }
}
