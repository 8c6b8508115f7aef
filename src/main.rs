//! Demo binary: `songflow --manifest <path> --blueprint <path> [--seed N]
//! [--sources <path>]`.
//!
//! Runs one song through the pipeline with the seeded mock generator and
//! prints the run summary as JSON. `--sources` points at a JSON object of
//! `{"source_id": ["chunk text", ...]}` used for citations.
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use songflow::adapters::default_skills;
use songflow::engine::{EngineError, InMemoryMetricsSink, InMemoryRunRepository, Orchestrator, RunRequest, SeededMockGenerator};
use songflow::providers::{CitationRetriever, InMemoryCitationSource};
use songflow::CONFIG;

#[derive(Debug, Error)]
enum CliError {
    #[error("usage: songflow --manifest <path> --blueprint <path> [--seed N] [--sources <path>]")]
    Usage,
    #[error("invalid seed '{0}'")]
    Seed(String),
    #[error("cannot read {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("invalid JSON in {path}: {source}")]
    Json { path: PathBuf, source: serde_json::Error },
    #[error(transparent)]
    Engine(#[from] EngineError),
}

struct Args {
    manifest: PathBuf,
    blueprint: PathBuf,
    seed: u64,
    sources: Option<PathBuf>,
}

fn parse_args(args: &[String]) -> Result<Args, CliError> {
    let mut manifest = None;
    let mut blueprint = None;
    let mut seed = 42u64;
    let mut sources = None;
    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1).cloned();
        match args[i].as_str() {
            "--manifest" => manifest = value.map(PathBuf::from),
            "--blueprint" => blueprint = value.map(PathBuf::from),
            "--sources" => sources = value.map(PathBuf::from),
            "--seed" => {
                let raw = value.ok_or(CliError::Usage)?;
                seed = raw.parse().map_err(|_| CliError::Seed(raw))?;
            }
            _ => return Err(CliError::Usage),
        }
        i += 2;
    }
    Ok(Args { manifest: manifest.ok_or(CliError::Usage)?,
              blueprint: blueprint.ok_or(CliError::Usage)?,
              seed,
              sources })
}

fn read_json(path: &Path) -> Result<Value, CliError> {
    let raw = std::fs::read_to_string(path).map_err(|source| CliError::Read { path: path.to_path_buf(), source })?;
    serde_json::from_str(&raw).map_err(|source| CliError::Json { path: path.to_path_buf(), source })
}

fn retriever(path: &Path) -> Result<CitationRetriever, CliError> {
    let raw = std::fs::read_to_string(path).map_err(|source| CliError::Read { path: path.to_path_buf(), source })?;
    let sources: BTreeMap<String, Vec<String>> =
        serde_json::from_str(&raw).map_err(|source| CliError::Json { path: path.to_path_buf(), source })?;
    Ok(sources.into_iter()
              .fold(CitationRetriever::new(), |r, (id, chunks)| r.with_backend(Arc::new(InMemoryCitationSource::new(id).with_chunks(chunks)))))
}

async fn run(args: Args) -> Result<Value, CliError> {
    let manifest = read_json(&args.manifest)?;
    let blueprint = read_json(&args.blueprint)?;
    let retriever = args.sources.as_deref().map(retriever).transpose()?.map(Arc::new);

    let metrics = Arc::new(InMemoryMetricsSink::new());
    let engine = Orchestrator::builder(Arc::new(InMemoryRunRepository::new())).skills(default_skills(Arc::new(SeededMockGenerator::new()),
                                                                                                     retriever))
                                                                              .config(CONFIG.engine.clone())
                                                                              .metrics_sink(metrics.clone())
                                                                              .build()?;
    let run = engine.run(RunRequest::new(Uuid::new_v4(), args.seed, manifest, blueprint)).await?;

    let lyrics = run.node_outputs
                    .values()
                    .rev()
                    .find_map(|o| o.artifact.get("lyrics").and_then(|l| l.get("text")).cloned())
                    .or_else(|| run.node_outputs.get("LYRICS").and_then(|o| o.artifact.get("text")).cloned());
    Ok(json!({
        "run_id": run.run_id,
        "status": run.status,
        "fix_iterations": run.fix_iterations,
        "validation": run.validation_scores,
        "error": run.error,
        "nodes": run.node_outputs.keys().collect::<Vec<_>>(),
        "lyrics": lyrics,
        "review": run.node_outputs.get("REVIEW").map(|o| &o.artifact),
        "metrics": metrics.snapshot(),
    }))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::new(&CONFIG.log_filter))
                             .init();

    let args: Vec<String> = std::env::args().collect();
    let outcome = match parse_args(&args) {
        Ok(args) => run(args).await,
        Err(e) => Err(e),
    };
    match outcome {
        Ok(summary) => match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("[songflow] cannot render summary: {e}");
                std::process::exit(1);
            }
        },
        Err(e) => {
            eprintln!("[songflow] {e}");
            std::process::exit(match e {
                                   CliError::Usage | CliError::Seed(_) => 2,
                                   CliError::Read { .. } | CliError::Json { .. } => 3,
                                   CliError::Engine(_) => 4,
                               });
        }
    }
}
