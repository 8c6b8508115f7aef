//! Per-invocation context and seed derivation.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::NodeName;

/// Seed of node `node_index` for a run started with `global_seed`.
///
/// Exact addition with no jitter. `submit` bounds `global_seed` by
/// `constants::MAX_GLOBAL_SEED`; direct callers past that wrap around.
pub fn derive_seed(global_seed: u64, node_index: u64) -> u64 {
    global_seed.wrapping_add(node_index)
}

/// Deterministic RNG for a seed and a salt naming the decision it drives.
pub fn seeded_rng(seed: u64, salt: &str) -> StdRng {
    let digest = crate::hashing::hash_str(&format!("{seed}:{salt}"));
    let mixed = digest.get(..16)
                      .and_then(|head| u64::from_str_radix(head, 16).ok())
                      .unwrap_or(seed);
    StdRng::seed_from_u64(mixed)
}

/// Opaque tenancy/security context. Passed through to skills and stored on
/// the run; the engine never inspects it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeContext(Value);

impl ScopeContext {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

/// Context handed to a skill for one node invocation. Not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowContext {
    pub run_id: Uuid,
    pub song_id: Uuid,
    pub seed: u64,
    pub node_index: u64,
    pub node_name: NodeName,
    pub scope: ScopeContext,
}

impl WorkflowContext {
    pub fn for_node(run_id: Uuid, song_id: Uuid, global_seed: u64, node: NodeName, scope: ScopeContext) -> Self {
        let node_index = node.index();
        Self { run_id,
               song_id,
               seed: derive_seed(global_seed, node_index),
               node_index,
               node_name: node,
               scope }
    }
}
