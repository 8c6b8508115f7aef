//! Builder for `Orchestrator`.
//!
//! The repository is mandatory; skills are registered explicitly per node and
//! `build` refuses a registry that leaves any pipeline node unimplemented.

use dashmap::DashSet;
use std::sync::Arc;

use super::{EngineConfig, Orchestrator};
use crate::errors::EngineError;
use crate::event::{EventSink, MetricsSink};
use crate::repo::RunRepository;
use crate::skill::{SkillRegistry, StageSkill};

pub struct OrchestratorBuilder<R: RunRepository> {
    repository: Arc<R>,
    skills: SkillRegistry,
    config: EngineConfig,
    events: Option<Arc<dyn EventSink>>,
    metrics: Option<Arc<dyn MetricsSink>>,
}

impl<R: RunRepository> OrchestratorBuilder<R> {
    pub(crate) fn new(repository: Arc<R>) -> Self {
        Self { repository,
               skills: SkillRegistry::new(),
               config: EngineConfig::default(),
               events: None,
               metrics: None }
    }

    /// Replaces the whole registry.
    pub fn skills(mut self, skills: SkillRegistry) -> Self {
        self.skills = skills;
        self
    }

    /// Registers (or substitutes) the skill for the node it declares.
    pub fn skill(mut self, skill: Arc<dyn StageSkill>) -> Self {
        self.skills.insert(skill.node(), skill);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = Some(sink);
        self
    }

    pub fn metrics_sink(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.metrics = Some(sink);
        self
    }

    pub fn build(self) -> Result<Orchestrator<R>, EngineError> {
        self.skills.verify()?;
        Ok(Orchestrator { repository: self.repository,
                          skills: self.skills,
                          config: self.config,
                          events: self.events,
                          metrics: self.metrics,
                          cancel_requests: DashSet::new() })
    }
}
