//! Orchestrator behavior with stub skills: loop bounds, state machine,
//! failure recording, cancellation and retry.

use async_trait::async_trait;
use serde_json::{json, Value};
use song_core::constants::{keys, EXECUTION_METADATA_KEY};
use song_core::event::EventPhase;
use song_core::{EngineConfig, EngineError, ErrorKind, GenerationParams, InMemoryEventStore, InMemoryMetricsSink, InMemoryRunRepository,
                NodeName, Orchestrator, Payload, RunRequest, RunStatus, SkillRegistry, StageError, StageSkill, StageSummary,
                WorkflowContext};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use uuid::Uuid;

#[derive(Debug)]
struct Stub(NodeName);

#[async_trait]
impl StageSkill for Stub {
    fn name(&self) -> &str {
        self.0.as_str()
    }
    fn node(&self) -> NodeName {
        self.0
    }
    async fn run(&self, input: &Payload, ctx: &WorkflowContext, _p: &GenerationParams) -> Result<Payload, StageError> {
        let mut out = Payload::new();
        out.insert("node".into(), json!(self.0));
        out.insert("seed".into(), json!(ctx.seed));
        out.insert("fix_iterations".into(), input.get(keys::FIX_ITERATIONS).cloned().unwrap_or(Value::Null));
        Ok(out)
    }
}

/// VALIDATE returning scripted totals, one per call.
#[derive(Debug)]
struct ScriptedValidate {
    totals: Vec<f64>,
    calls: AtomicUsize,
}

impl ScriptedValidate {
    fn new(totals: &[f64]) -> Self {
        Self { totals: totals.to_vec(),
               calls: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl StageSkill for ScriptedValidate {
    fn name(&self) -> &str {
        "validate"
    }
    fn node(&self) -> NodeName {
        NodeName::Validate
    }
    async fn run(&self, _input: &Payload, _ctx: &WorkflowContext, _p: &GenerationParams) -> Result<Payload, StageError> {
        let i = self.calls.fetch_add(1, Ordering::SeqCst);
        let total = self.totals.get(i).or(self.totals.last()).copied().unwrap_or(0.0);
        let out = json!({
            "scores": {"section_completeness": total},
            "total": total,
            "pass": total >= 0.85,
            "issues": if total >= 0.85 { vec![] } else { vec!["section_completeness below target".to_string()] },
        });
        Ok(out.as_object().cloned().unwrap_or_default())
    }
    fn summarize(&self, output: &Payload) -> StageSummary {
        let total = output.get("total").and_then(Value::as_f64).unwrap_or(0.0);
        StageSummary { metrics: [("total".to_string(), total)].into_iter().collect(),
                       issues: vec![] }
    }
}

#[derive(Debug)]
struct Failing(NodeName, StageError);

#[async_trait]
impl StageSkill for Failing {
    fn name(&self) -> &str {
        "failing"
    }
    fn node(&self) -> NodeName {
        self.0
    }
    async fn run(&self, _input: &Payload, _ctx: &WorkflowContext, _p: &GenerationParams) -> Result<Payload, StageError> {
        Err(self.1.clone())
    }
}

#[derive(Debug)]
struct Slow(NodeName, Duration);

#[async_trait]
impl StageSkill for Slow {
    fn name(&self) -> &str {
        "slow"
    }
    fn node(&self) -> NodeName {
        self.0
    }
    async fn run(&self, _input: &Payload, _ctx: &WorkflowContext, _p: &GenerationParams) -> Result<Payload, StageError> {
        tokio::time::sleep(self.1).await;
        Ok(Payload::new())
    }
}

/// STYLE that signals it started and waits to be released.
#[derive(Debug)]
struct Gate {
    started: Arc<Notify>,
    release: Arc<Notify>,
}

#[async_trait]
impl StageSkill for Gate {
    fn name(&self) -> &str {
        "gate"
    }
    fn node(&self) -> NodeName {
        NodeName::Style
    }
    async fn run(&self, _input: &Payload, _ctx: &WorkflowContext, _p: &GenerationParams) -> Result<Payload, StageError> {
        self.started.notify_one();
        self.release.notified().await;
        Ok(Payload::new())
    }
}

fn stubs(validate: ScriptedValidate) -> SkillRegistry {
    let mut reg = SkillRegistry::new();
    for node in NodeName::PIPELINE {
        reg.insert(node, Arc::new(Stub(node)));
    }
    reg.with(Arc::new(validate))
}

fn orchestrator(skills: SkillRegistry) -> Orchestrator<InMemoryRunRepository> {
    Orchestrator::builder(Arc::new(InMemoryRunRepository::new())).skills(skills)
                                                                  .build()
                                                                  .expect("complete registry")
}

fn request(seed: u64) -> RunRequest {
    RunRequest::new(Uuid::new_v4(), seed, json!({"title": "t"}), json!({"rules": {}}))
}

fn keys_of(run: &song_core::WorkflowRun) -> Vec<String> {
    run.node_outputs.keys().cloned().collect()
}

#[tokio::test]
async fn passing_first_validation_skips_fix() {
    let orch = orchestrator(stubs(ScriptedValidate::new(&[0.9])));
    let run = orch.run(request(42)).await.unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.fix_iterations, 0);
    assert_eq!(keys_of(&run), vec!["PLAN", "STYLE", "LYRICS", "PRODUCER", "COMPOSE", "VALIDATE", "REVIEW"]);
    assert_eq!(run.validation_scores.as_ref().unwrap()["pass"], true);
    assert_eq!(run.node_outputs["VALIDATE"].scores.as_ref().unwrap()["total"], 0.9);
}

#[tokio::test]
async fn fix_loop_is_bounded_and_completes_without_passing() {
    let validate = ScriptedValidate::new(&[0.1]);
    let orch = orchestrator(stubs(validate));
    let run = orch.run(request(1)).await.unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.fix_iterations, 3);
    assert!(run.error.is_none());
    assert_eq!(run.validation_scores.as_ref().unwrap()["pass"], false);
    let validations = run.node_outputs.values().filter(|o| o.node == NodeName::Validate).count();
    assert_eq!(validations, 4);
    for key in ["FIX_1", "FIX_2", "FIX_3", "COMPOSE_3", "VALIDATE_3"] {
        assert!(run.node_outputs.contains_key(key), "missing {key}");
    }
    assert!(!run.node_outputs.contains_key("FIX_4"));
    // FIX sees the iteration it is running
    assert_eq!(run.node_outputs["FIX_2"].artifact["fix_iterations"], 2);
}

#[tokio::test]
async fn loop_stops_as_soon_as_validation_passes() {
    let orch = orchestrator(stubs(ScriptedValidate::new(&[0.4, 0.6, 0.95])));
    let run = orch.run(request(5)).await.unwrap();
    assert_eq!(run.fix_iterations, 2);
    assert!(run.node_outputs.contains_key("VALIDATE_2"));
    assert!(!run.node_outputs.contains_key("FIX_3"));
    assert_eq!(run.validation_scores.as_ref().unwrap()["total"], 0.95);
}

#[tokio::test]
async fn configured_budget_lowers_the_bound() {
    let skills = stubs(ScriptedValidate::new(&[0.1]));
    let orch = Orchestrator::builder(Arc::new(InMemoryRunRepository::new())).skills(skills)
                                                                            .config(EngineConfig::default().with_max_fix_iterations(1))
                                                                            .build()
                                                                            .unwrap();
    let run = orch.run(request(5)).await.unwrap();
    assert_eq!(run.fix_iterations, 1);
    assert_eq!(run.node_outputs.values().filter(|o| o.node == NodeName::Validate).count(), 2);
}

#[tokio::test]
async fn node_seeds_follow_the_seed_law() {
    let orch = orchestrator(stubs(ScriptedValidate::new(&[0.9])));
    let run = orch.run(request(42)).await.unwrap();
    for (key, node) in [("PLAN", NodeName::Plan), ("STYLE", NodeName::Style), ("LYRICS", NodeName::Lyrics), ("PRODUCER", NodeName::Producer),
                        ("COMPOSE", NodeName::Compose), ("REVIEW", NodeName::Review)]
    {
        assert_eq!(run.node_outputs[key].artifact["seed"], 42 + node.index(), "{key}");
        assert_eq!(run.node_outputs[key].artifact[EXECUTION_METADATA_KEY]["seed"], 42 + node.index());
    }
}

#[tokio::test]
async fn events_pair_start_with_one_terminal_in_order() {
    let sink = Arc::new(InMemoryEventStore::new());
    let metrics = Arc::new(InMemoryMetricsSink::new());
    let orch = Orchestrator::builder(Arc::new(InMemoryRunRepository::new())).skills(stubs(ScriptedValidate::new(&[0.2, 0.9])))
                                                                            .event_sink(sink.clone())
                                                                            .metrics_sink(metrics.clone())
                                                                            .build()
                                                                            .unwrap();
    let run = orch.run(request(3)).await.unwrap();
    let events = orch.events_for(run.run_id).await.unwrap();

    assert_eq!(events, sink.list(run.run_id));
    assert!(events.windows(2).all(|w| w[0].seq + 1 == w[1].seq));
    let starts = events.iter().filter(|e| e.phase == EventPhase::Start).count();
    let ends = events.iter().filter(|e| e.phase == EventPhase::End).count();
    assert_eq!(starts, run.node_outputs.len());
    assert_eq!(starts, ends);

    // outside the LYRICS/PRODUCER window each start follows the previous terminal event
    let sequential: Vec<_> = events.iter()
                                   .filter(|e| !matches!(e.node, NodeName::Lyrics | NodeName::Producer))
                                   .collect();
    for pair in sequential.chunks(2) {
        assert_eq!(pair[0].phase, EventPhase::Start);
        assert_eq!(pair[1].phase, EventPhase::End);
        assert_eq!(pair[0].node, pair[1].node);
    }
    let compose_start = events.iter()
                              .position(|e| e.node == NodeName::Compose && e.phase == EventPhase::Start)
                              .unwrap();
    let last_parallel_end = events.iter()
                                  .rposition(|e| matches!(e.node, NodeName::Lyrics | NodeName::Producer) && e.phase.is_terminal())
                                  .unwrap();
    assert!(last_parallel_end < compose_start);
    assert_eq!(metrics.snapshot()["validate"].calls, 2);
}

#[tokio::test]
async fn stage_failure_marks_run_failed_and_keeps_partial_outputs() {
    let skills = stubs(ScriptedValidate::new(&[0.9])).with(Arc::new(Failing(NodeName::Producer,
                                                                            StageError::Execution("upstream 503".into()))));
    let orch = orchestrator(skills);
    let run = orch.run(request(9)).await.unwrap();

    assert_eq!(run.status, RunStatus::Failed);
    let err = run.error.as_ref().unwrap();
    assert_eq!(err.error_type, "ExecutionError");
    assert!(err.message.contains("upstream 503"));
    assert!(run.node_outputs.contains_key("LYRICS"));
    assert!(!run.node_outputs.contains_key("PRODUCER"));
    assert!(!run.node_outputs.contains_key("COMPOSE"));
    let fail = run.event_stream.iter().find(|e| e.phase == EventPhase::Fail).unwrap();
    assert_eq!(fail.node, NodeName::Producer);
    assert_eq!(fail.error_type, Some(ErrorKind::Execution));
    assert!(orch.runs_by_status(RunStatus::Running).await.unwrap().is_empty());
}

#[tokio::test]
async fn validation_failure_is_recorded_with_its_type() {
    let skills = stubs(ScriptedValidate::new(&[0.9])).with(Arc::new(Failing(NodeName::Plan,
                                                                            StageError::InvalidInput("manifest.title missing".into()))));
    let run = orchestrator(skills).run(request(9)).await.unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.error.unwrap().error_type, "ValidationError");
    assert!(run.node_outputs.is_empty());
}

#[tokio::test]
async fn stage_timeout_fails_the_run() {
    let skills = stubs(ScriptedValidate::new(&[0.9])).with(Arc::new(Slow(NodeName::Compose, Duration::from_millis(300))));
    let orch = Orchestrator::builder(Arc::new(InMemoryRunRepository::new())).skills(skills)
                                                                            .config(EngineConfig::default().with_stage_timeout(Duration::from_millis(20)))
                                                                            .build()
                                                                            .unwrap();
    let run = orch.run(request(2)).await.unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    let err = run.error.unwrap();
    assert_eq!(err.error_type, "ExecutionError");
    assert!(err.message.contains("timed out"));
}

#[tokio::test]
async fn cancellation_takes_effect_at_the_next_boundary() {
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let skills = stubs(ScriptedValidate::new(&[0.9])).with(Arc::new(Gate { started: started.clone(),
                                                                            release: release.clone() }));
    let orch = Arc::new(orchestrator(skills));
    let run_id = orch.submit(request(11)).await.unwrap();

    let runner = orch.clone();
    let handle = tokio::spawn(async move { runner.execute(run_id).await });
    started.notified().await;
    assert_eq!(orch.cancel(run_id).await.unwrap(), song_core::CancelOutcome::Requested);
    release.notify_one();

    let run = handle.await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Cancelled);
    // the in-flight STYLE call finished, nothing after it ran
    assert!(run.node_outputs.contains_key("STYLE"));
    assert!(!run.node_outputs.contains_key("LYRICS"));
    assert!(matches!(orch.cancel(run_id).await, Err(EngineError::AlreadyTerminal { .. })));
}

#[tokio::test]
async fn pending_run_is_cancelled_immediately() {
    let orch = orchestrator(stubs(ScriptedValidate::new(&[0.9])));
    let run_id = orch.submit(request(1)).await.unwrap();
    assert_eq!(orch.cancel(run_id).await.unwrap(), song_core::CancelOutcome::Cancelled);
    assert_eq!(orch.get_run(run_id).await.unwrap().status, RunStatus::Cancelled);
    assert!(matches!(orch.execute(run_id).await, Err(EngineError::AlreadyTerminal { .. })));
}

#[tokio::test]
async fn retry_creates_a_new_run_with_same_inputs() {
    let failing = stubs(ScriptedValidate::new(&[0.9])).with(Arc::new(Failing(NodeName::Lyrics, StageError::Execution("flaky".into()))));
    let orch = orchestrator(failing);
    let failed = orch.run(request(77)).await.unwrap();
    assert_eq!(failed.status, RunStatus::Failed);

    let retry_id = orch.retry(failed.run_id).await.unwrap();
    assert_ne!(retry_id, failed.run_id);
    let retried = orch.get_run(retry_id).await.unwrap();
    assert_eq!(retried.status, RunStatus::Pending);
    assert_eq!(retried.inputs, failed.inputs);
    assert_eq!(retried.retry_of, Some(failed.run_id));
    assert_eq!(orch.get_run(failed.run_id).await.unwrap(), failed);
}

#[tokio::test]
async fn retry_of_a_live_run_is_rejected() {
    let orch = orchestrator(stubs(ScriptedValidate::new(&[0.9])));
    let run_id = orch.submit(request(1)).await.unwrap();
    assert!(matches!(orch.retry(run_id).await, Err(EngineError::NotRetryable { .. })));
}

#[tokio::test]
async fn submission_rejects_oversized_seed() {
    let orch = orchestrator(stubs(ScriptedValidate::new(&[0.9])));
    let err = orch.submit(request(u64::MAX)).await.unwrap_err();
    assert_eq!(err, EngineError::InvalidSeed(u64::MAX));
}

#[test]
fn builder_requires_every_node() {
    let mut reg = SkillRegistry::new();
    reg.insert(NodeName::Plan, Arc::new(Stub(NodeName::Plan)));
    let res = Orchestrator::builder(Arc::new(InMemoryRunRepository::new())).skills(reg).build();
    assert!(matches!(res, Err(EngineError::MissingSkill(NodeName::Style))));
}

#[test]
fn builder_rejects_misregistered_skill() {
    let mut reg = stubs(ScriptedValidate::new(&[0.9]));
    reg.insert(NodeName::Review, Arc::new(Stub(NodeName::Plan)));
    let res = Orchestrator::builder(Arc::new(InMemoryRunRepository::new())).skills(reg).build();
    assert!(matches!(res, Err(EngineError::MisregisteredSkill { registered: NodeName::Review, .. })));
}

#[tokio::test]
async fn runs_are_isolated_and_reproducible() {
    let orch = Arc::new(orchestrator(stubs(ScriptedValidate::new(&[0.9]))));
    let (a, b) = tokio::join!(orch.run(request(8)), orch.run(request(8)));
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_ne!(a.run_id, b.run_id);
    for key in keys_of(&a) {
        assert_eq!(a.node_outputs[&key].artifact["_hash"], b.node_outputs[&key].artifact["_hash"], "{key}");
    }
    assert!(a.event_stream.iter().all(|e| e.run_id == a.run_id));
    assert!(b.event_stream.iter().all(|e| e.run_id == b.run_id));
}
