//! Orchestrator implementation.
//!
//! Stage order: PLAN, STYLE, then LYRICS and PRODUCER concurrently (joined),
//! then COMPOSE, then the VALIDATE/FIX/COMPOSE loop and finally REVIEW.
//! Progress is persisted after every stage through the repository; the run
//! stays `running` until `finalize` moves it to a terminal state.
use dashmap::DashSet;
use log::{error, info, warn};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use super::{EngineConfig, OrchestratorBuilder, Verdict};
use crate::constants::{keys, MAX_GLOBAL_SEED};
use crate::errors::{EngineError, SkillError};
use crate::event::{Event, EventRecorder, EventSink, MetricsSink};
use crate::model::{NodeName, NodeOutput, Payload, RunFailure, RunInputs, RunPatch, RunStatus, ScopeContext, WorkflowContext,
                   WorkflowRun};
use crate::repo::RunRepository;
use crate::skill::{SkillEnvelope, SkillRegistry, StageResult, StageSkill};

/// Submission input: manifest and blueprint are consumed as already-parsed
/// data and handed to the skills untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    pub song_id: Uuid,
    pub global_seed: u64,
    pub manifest: Value,
    pub blueprint: Value,
    pub scope: ScopeContext,
}

impl RunRequest {
    pub fn new(song_id: Uuid, global_seed: u64, manifest: Value, blueprint: Value) -> Self {
        Self { song_id,
               global_seed,
               manifest,
               blueprint,
               scope: ScopeContext::default() }
    }

    pub fn with_scope(mut self, scope: ScopeContext) -> Self {
        self.scope = scope;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The run was pending and is now cancelled.
    Cancelled,
    /// The run is executing; it stops at the next node boundary.
    Requested,
}

/// How `drive` ended when no error interrupted it.
enum Flow {
    Completed { verdict: Verdict, fix_iterations: u32 },
    Cancelled,
}

enum Interrupt {
    Stage(SkillError),
    Engine(EngineError),
}

impl From<SkillError> for Interrupt {
    fn from(err: SkillError) -> Self {
        Interrupt::Stage(err)
    }
}

impl From<EngineError> for Interrupt {
    fn from(err: EngineError) -> Self {
        Interrupt::Engine(err)
    }
}

/// Per-execution state. `state` is the working payload every stage reads.
struct RunSession {
    run_id: Uuid,
    song_id: Uuid,
    global_seed: u64,
    scope: ScopeContext,
    envelope: SkillEnvelope,
    recorder: Arc<EventRecorder>,
    state: Payload,
}

impl RunSession {
    fn context(&self, node: NodeName) -> WorkflowContext {
        WorkflowContext::for_node(self.run_id, self.song_id, self.global_seed, node, self.scope.clone())
    }
}

fn state_key(node: NodeName) -> &'static str {
    match node {
        NodeName::Plan => keys::PLAN,
        NodeName::Style => keys::STYLE,
        NodeName::Lyrics => keys::LYRICS,
        NodeName::Producer => keys::PRODUCER_NOTES,
        NodeName::Compose => keys::COMPOSED_PROMPT,
        NodeName::Validate => keys::VALIDATION,
        NodeName::Fix => keys::FIX,
        NodeName::Review => keys::REVIEW,
    }
}

fn node_output(node: NodeName, iteration: u32, result: &StageResult) -> NodeOutput {
    NodeOutput { node,
                 iteration,
                 artifact: Value::Object(result.output.clone()),
                 scores: (!result.summary.metrics.is_empty()).then(|| result.summary.metrics.clone()),
                 duration_ms: result.duration_ms }
}

/// Drives runs through the pipeline. Cheap to share behind an `Arc`; runs
/// executed concurrently are fully independent.
pub struct Orchestrator<R: RunRepository> {
    pub(super) repository: Arc<R>,
    pub(super) skills: SkillRegistry,
    pub(super) config: EngineConfig,
    pub(super) events: Option<Arc<dyn EventSink>>,
    pub(super) metrics: Option<Arc<dyn MetricsSink>>,
    pub(super) cancel_requests: DashSet<Uuid>,
}

impl<R: RunRepository> Orchestrator<R> {
    pub fn builder(repository: Arc<R>) -> OrchestratorBuilder<R> {
        OrchestratorBuilder::new(repository)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    /// Creates a pending run.
    pub async fn submit(&self, request: RunRequest) -> Result<Uuid, EngineError> {
        if request.global_seed > MAX_GLOBAL_SEED {
            return Err(EngineError::InvalidSeed(request.global_seed));
        }
        let run = WorkflowRun::new(request.song_id,
                                   RunInputs { manifest: request.manifest,
                                               blueprint: request.blueprint,
                                               global_seed: request.global_seed,
                                               scope: request.scope });
        self.store_new(run).await
    }

    async fn store_new(&self, run: WorkflowRun) -> Result<Uuid, EngineError> {
        let run_id = run.run_id;
        let (song_id, seed) = (run.song_id, run.inputs.global_seed);
        self.repository.create(run).await?;
        info!("run {run_id} submitted (song={song_id}, seed={seed})");
        Ok(run_id)
    }

    /// Submits and executes in one call.
    pub async fn run(&self, request: RunRequest) -> Result<WorkflowRun, EngineError> {
        let run_id = self.submit(request).await?;
        self.execute(run_id).await
    }

    /// Executes a pending run to a terminal state and returns the final
    /// record. A stage failure is not an `Err`: the run is returned as
    /// `failed` with its partial outputs.
    pub async fn execute(&self, run_id: Uuid) -> Result<WorkflowRun, EngineError> {
        let run = self.get_run(run_id).await?;
        match run.status {
            RunStatus::Pending => {}
            RunStatus::Running => return Err(EngineError::AlreadyRunning(run_id)),
            status => return Err(EngineError::AlreadyTerminal { run_id, status }),
        }

        let recorder = Arc::new(EventRecorder::new(run_id, run.event_stream.len() as u64, self.events.clone()));
        let mut envelope = SkillEnvelope::new().with_events(recorder.clone())
                                               .with_timeout(self.config.stage_timeout);
        if let Some(metrics) = &self.metrics {
            envelope = envelope.with_metrics(metrics.clone());
        }

        let mut state = Payload::new();
        state.insert(keys::MANIFEST.into(), run.inputs.manifest.clone());
        state.insert(keys::BLUEPRINT.into(), run.inputs.blueprint.clone());
        state.insert(keys::PASS_THRESHOLD.into(), json!(self.config.pass_threshold));
        state.insert(keys::FIX_ITERATIONS.into(), json!(0));

        let mut session = RunSession { run_id,
                                       song_id: run.song_id,
                                       global_seed: run.inputs.global_seed,
                                       scope: run.inputs.scope.clone(),
                                       envelope,
                                       recorder,
                                       state };

        let outcome = if self.cancel_requests.contains(&run_id) {
            Ok(Flow::Cancelled)
        } else {
            self.repository
                .update(run_id, RunPatch::status(RunStatus::Running))
                .await
                .map_err(EngineError::from_repository)?;
            info!("run {run_id} running");
            self.drive(&mut session).await
        };

        let finished = self.finalize(&session, outcome).await;
        self.cancel_requests.remove(&run_id);
        finished
    }

    async fn drive(&self, s: &mut RunSession) -> Result<Flow, Interrupt> {
        for node in [NodeName::Plan, NodeName::Style] {
            if self.cancellation_requested(s) {
                return Ok(Flow::Cancelled);
            }
            self.run_stage(s, node, 0).await?;
        }

        if self.cancellation_requested(s) {
            return Ok(Flow::Cancelled);
        }
        self.run_lyrics_and_producer(s).await?;

        if self.cancellation_requested(s) {
            return Ok(Flow::Cancelled);
        }
        self.run_stage(s, NodeName::Compose, 0).await?;

        let max = self.config.max_fix_iterations;
        let mut fix_iterations = 0u32;
        let verdict = loop {
            if self.cancellation_requested(s) {
                return Ok(Flow::Cancelled);
            }
            let verdict = self.validate(s, fix_iterations).await?;
            if verdict.pass || fix_iterations >= max {
                break verdict;
            }

            if self.cancellation_requested(s) {
                return Ok(Flow::Cancelled);
            }
            fix_iterations += 1;
            self.fix(s, fix_iterations, &verdict).await?;

            if self.cancellation_requested(s) {
                return Ok(Flow::Cancelled);
            }
            self.run_stage(s, NodeName::Compose, fix_iterations).await?;
        };
        if !verdict.pass {
            warn!("run {} exhausted {} fix iteration(s) without passing (total={:.3})",
                  s.run_id, fix_iterations, verdict.total);
        }

        if self.cancellation_requested(s) {
            return Ok(Flow::Cancelled);
        }
        self.run_stage(s, NodeName::Review, 0).await?;
        Ok(Flow::Completed { verdict, fix_iterations })
    }

    fn cancellation_requested(&self, s: &RunSession) -> bool {
        self.cancel_requests.contains(&s.run_id)
    }

    fn skill(&self, node: NodeName) -> Result<Arc<dyn StageSkill>, Interrupt> {
        self.skills
            .get(node)
            .cloned()
            .ok_or(Interrupt::Engine(EngineError::MissingSkill(node)))
    }

    /// Applies `patch` plus every event buffered since the last write.
    async fn persist(&self, s: &RunSession, patch: RunPatch) -> Result<WorkflowRun, EngineError> {
        let patch = patch.with_events(s.recorder.drain());
        self.repository
            .update(s.run_id, patch)
            .await
            .map_err(EngineError::from_repository)
    }

    async fn run_stage(&self, s: &mut RunSession, node: NodeName, iteration: u32) -> Result<StageResult, Interrupt> {
        let skill = self.skill(node)?;
        self.persist(s, RunPatch::entering(node)).await?;

        let ctx = s.context(node);
        let result = s.envelope
                      .execute(skill.as_ref(), &s.state, &ctx, &self.config.generation)
                      .await?;

        self.persist(s,
                     RunPatch::default().with_output(node.output_key(iteration), node_output(node, iteration, &result)))
            .await?;
        s.state.insert(state_key(node).into(), Value::Object(result.output.clone()));
        Ok(result)
    }

    /// LYRICS and PRODUCER depend only on PLAN/STYLE; both calls run
    /// concurrently and are joined before anything else happens.
    async fn run_lyrics_and_producer(&self, s: &mut RunSession) -> Result<(), Interrupt> {
        let lyrics = self.skill(NodeName::Lyrics)?;
        let producer = self.skill(NodeName::Producer)?;
        self.persist(s, RunPatch::entering(NodeName::Lyrics)).await?;

        let (lyrics_ctx, producer_ctx) = (s.context(NodeName::Lyrics), s.context(NodeName::Producer));
        let params = &self.config.generation;
        let (lyrics_res, producer_res) = tokio::join!(s.envelope.execute(lyrics.as_ref(), &s.state, &lyrics_ctx, params),
                                                      s.envelope.execute(producer.as_ref(), &s.state, &producer_ctx, params));

        let mut patch = RunPatch::entering(NodeName::Producer);
        if let Ok(r) = &lyrics_res {
            patch = patch.with_output(NodeName::Lyrics.output_key(0), node_output(NodeName::Lyrics, 0, r));
        }
        if let Ok(r) = &producer_res {
            patch = patch.with_output(NodeName::Producer.output_key(0), node_output(NodeName::Producer, 0, r));
        }
        self.persist(s, patch).await?;

        let lyrics_out = lyrics_res?;
        let producer_out = producer_res?;
        s.state.insert(keys::LYRICS.into(), Value::Object(lyrics_out.output));
        s.state.insert(keys::PRODUCER_NOTES.into(), Value::Object(producer_out.output));
        Ok(())
    }

    async fn validate(&self, s: &mut RunSession, iteration: u32) -> Result<Verdict, Interrupt> {
        let result = self.run_stage(s, NodeName::Validate, iteration).await?;
        let skill_name = self.skill(NodeName::Validate)?.name().to_string();
        let verdict = Verdict::from_payload(&result.output).map_err(|m| SkillError::validation(skill_name, m))?;
        info!("run {} validation #{}: total={:.3} pass={} issues={}",
              s.run_id,
              iteration,
              verdict.total,
              verdict.pass,
              verdict.issues.len());
        self.persist(s,
                     RunPatch { validation_scores: Some(Self::scores_record(&verdict)),
                                ..RunPatch::default() })
            .await?;
        Ok(verdict)
    }

    async fn fix(&self, s: &mut RunSession, iteration: u32, verdict: &Verdict) -> Result<(), Interrupt> {
        info!("run {} fix iteration {}/{} for {} issue(s)",
              s.run_id,
              iteration,
              self.config.max_fix_iterations,
              verdict.issues.len());
        s.state.insert(keys::FIX_ITERATIONS.into(), json!(iteration));
        let result = self.run_stage(s, NodeName::Fix, iteration).await?;
        for key in [keys::LYRICS, keys::STYLE, keys::PRODUCER_NOTES] {
            if let Some(v) = result.output.get(key) {
                s.state.insert(key.into(), v.clone());
            }
        }
        self.persist(s,
                     RunPatch { fix_iterations: Some(iteration),
                                ..RunPatch::default() })
            .await?;
        Ok(())
    }

    fn scores_record(verdict: &Verdict) -> Value {
        let mut record = Payload::new();
        record.insert(keys::SCORES.into(), verdict.scores.clone());
        record.insert(keys::TOTAL.into(), json!(verdict.total));
        record.insert(keys::PASS.into(), json!(verdict.pass));
        Value::Object(record)
    }

    /// Moves the run to its terminal state. Engine errors (persistence) are
    /// returned after a best-effort attempt to mark the run failed.
    async fn finalize(&self, s: &RunSession, outcome: Result<Flow, Interrupt>) -> Result<WorkflowRun, EngineError> {
        match outcome {
            Ok(Flow::Completed { verdict, fix_iterations }) => {
                let patch = RunPatch { status: Some(RunStatus::Completed),
                                       validation_scores: Some(Self::scores_record(&verdict)),
                                       ..RunPatch::default() };
                let run = self.persist(s, patch).await?;
                info!("run {} completed (pass={}, total={:.3}, fix_iterations={})",
                      s.run_id, verdict.pass, verdict.total, fix_iterations);
                Ok(run)
            }
            Ok(Flow::Cancelled) => {
                let run = self.persist(s, RunPatch::status(RunStatus::Cancelled)).await?;
                info!("run {} cancelled at node boundary", s.run_id);
                Ok(run)
            }
            Err(Interrupt::Stage(err)) => {
                error!("run {} failed: {}", s.run_id, err);
                let patch = RunPatch { status: Some(RunStatus::Failed),
                                       error: Some(RunFailure { error_type: err.kind.type_name().to_string(),
                                                                message: err.to_string() }),
                                       ..RunPatch::default() };
                self.persist(s, patch).await
            }
            Err(Interrupt::Engine(err)) => {
                error!("run {} aborted by engine error: {}", s.run_id, err);
                let patch = RunPatch { status: Some(RunStatus::Failed),
                                       error: Some(RunFailure { error_type: "EngineError".to_string(),
                                                                message: err.to_string() }),
                                       ..RunPatch::default() };
                if let Err(mark_err) = self.persist(s, patch).await {
                    warn!("run {} could not be marked failed: {}", s.run_id, mark_err);
                }
                Err(err)
            }
        }
    }

    /// Cooperative cancellation: pending runs are cancelled at once, running
    /// runs stop at the next node boundary, terminal runs are rejected.
    pub async fn cancel(&self, run_id: Uuid) -> Result<CancelOutcome, EngineError> {
        let run = self.get_run(run_id).await?;
        match run.status {
            RunStatus::Pending => {
                self.cancel_requests.insert(run_id);
                let res = self.repository.update(run_id, RunPatch::status(RunStatus::Cancelled)).await;
                self.cancel_requests.remove(&run_id);
                res.map_err(EngineError::from_repository)?;
                info!("run {run_id} cancelled before start");
                Ok(CancelOutcome::Cancelled)
            }
            RunStatus::Running => {
                self.cancel_requests.insert(run_id);
                // execute clears the flag only after persisting the terminal
                // state, so a run that finished since the first read shows up here
                match self.get_run(run_id).await {
                    Ok(current) if current.status.is_terminal() => {
                        self.cancel_requests.remove(&run_id);
                        Err(EngineError::AlreadyTerminal { run_id,
                                                           status: current.status })
                    }
                    Ok(_) => {
                        info!("run {run_id} cancellation requested");
                        Ok(CancelOutcome::Requested)
                    }
                    Err(e) => {
                        self.cancel_requests.remove(&run_id);
                        Err(e)
                    }
                }
            }
            status => Err(EngineError::AlreadyTerminal { run_id, status }),
        }
    }

    /// Creates a brand-new pending run with the inputs and seed of a
    /// terminal run. The original record is not touched.
    pub async fn retry(&self, run_id: Uuid) -> Result<Uuid, EngineError> {
        let previous = self.get_run(run_id).await?;
        if !previous.status.is_terminal() {
            return Err(EngineError::NotRetryable { run_id,
                                                   status: previous.status });
        }
        let mut run = WorkflowRun::new(previous.song_id, previous.inputs.clone());
        run.retry_of = Some(run_id);
        info!("run {run_id} retried as {}", run.run_id);
        self.store_new(run).await
    }

    pub async fn get_run(&self, run_id: Uuid) -> Result<WorkflowRun, EngineError> {
        self.repository
            .get_by_run_id(run_id)
            .await
            .map_err(EngineError::from_repository)
    }

    pub async fn runs_by_status(&self, status: RunStatus) -> Result<Vec<WorkflowRun>, EngineError> {
        Ok(self.repository.get_by_status(status).await?)
    }

    /// Event stream recorded on the run.
    pub async fn events_for(&self, run_id: Uuid) -> Result<Vec<Event>, EngineError> {
        Ok(self.get_run(run_id).await?.event_stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RepositoryError;
    use crate::repo::InMemoryRunRepository;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Reports the run as still running on the first read only, as if it
    /// completed right after the caller looked.
    #[derive(Default)]
    struct FinishesAfterFirstRead {
        inner:   InMemoryRunRepository,
        first:   AtomicBool,
    }

    #[async_trait]
    impl RunRepository for FinishesAfterFirstRead {
        async fn get_by_run_id(&self, run_id: Uuid) -> Result<WorkflowRun, RepositoryError> {
            let mut run = self.inner.get_by_run_id(run_id).await?;
            if !self.first.swap(true, Ordering::SeqCst) {
                run.status = RunStatus::Running;
            }
            Ok(run)
        }

        async fn create(&self, run: WorkflowRun) -> Result<(), RepositoryError> {
            self.inner.create(run).await
        }

        async fn update(&self, run_id: Uuid, patch: RunPatch) -> Result<WorkflowRun, RepositoryError> {
            self.inner.update(run_id, patch).await
        }

        async fn get_by_status(&self, status: RunStatus) -> Result<Vec<WorkflowRun>, RepositoryError> {
            self.inner.get_by_status(status).await
        }
    }

    fn orchestrator<R: RunRepository>(repository: Arc<R>) -> Orchestrator<R> {
        Orchestrator { repository,
                       skills: SkillRegistry::new(),
                       config: EngineConfig::default(),
                       events: None,
                       metrics: None,
                       cancel_requests: DashSet::new() }
    }

    #[tokio::test]
    async fn cancel_racing_completion_leaves_no_request_behind() {
        let repo = Arc::new(FinishesAfterFirstRead::default());
        let run = WorkflowRun::new(Uuid::new_v4(),
                                   RunInputs { manifest:    json!({}),
                                               blueprint:   json!({}),
                                               global_seed: 1,
                                               scope:       ScopeContext::default() });
        let run_id = run.run_id;
        repo.inner.create(run).await.unwrap();
        repo.inner.update(run_id, RunPatch::status(RunStatus::Running)).await.unwrap();
        repo.inner.update(run_id, RunPatch::status(RunStatus::Completed)).await.unwrap();
        let orch = orchestrator(repo);

        let outcome = orch.cancel(run_id).await;

        assert!(matches!(outcome, Err(EngineError::AlreadyTerminal { status: RunStatus::Completed, .. })));
        assert!(orch.cancel_requests.is_empty());
    }
}
