//! Engine constants.
//!
//! `ENGINE_VERSION` is part of the execution metadata attached to every stage
//! output, so bumping it marks artifacts produced by an incompatible engine.

/// Logical engine version recorded under the execution metadata key.
pub const ENGINE_VERSION: &str = "S1.0";

/// Hard upper bound for the VALIDATE/FIX loop. Configuration may lower it,
/// never raise it.
pub const MAX_FIX_ITERATIONS: u32 = 3;

/// Pass threshold used when neither the blueprint nor the environment sets one.
pub const DEFAULT_PASS_THRESHOLD: f64 = 0.85;

/// Largest accepted global seed. Keeps `global_seed + node_index` exact.
pub const MAX_GLOBAL_SEED: u64 = i64::MAX as u64;

/// Private output key carrying execution metadata (skill, seed, hashes...).
pub const EXECUTION_METADATA_KEY: &str = "_execution";

/// Output key carrying the content hash of a stage output.
pub const HASH_KEY: &str = "_hash";

/// Keys removed (at any depth) before content hashing.
pub const VOLATILE_KEYS: &[&str] = &[EXECUTION_METADATA_KEY, HASH_KEY, "compiled_at"];

/// Well-known keys of the working payload shared between stages.
pub mod keys {
    pub const MANIFEST: &str = "manifest";
    pub const BLUEPRINT: &str = "blueprint";
    pub const PASS_THRESHOLD: &str = "pass_threshold";
    pub const PLAN: &str = "plan";
    pub const STYLE: &str = "style";
    pub const LYRICS: &str = "lyrics";
    pub const PRODUCER_NOTES: &str = "producer_notes";
    pub const COMPOSED_PROMPT: &str = "composed_prompt";
    pub const VALIDATION: &str = "validation";
    pub const FIX: &str = "fix";
    pub const REVIEW: &str = "review";
    pub const FIX_ITERATIONS: &str = "fix_iterations";
    pub const SCORES: &str = "scores";
    pub const TOTAL: &str = "total";
    pub const PASS: &str = "pass";
    pub const ISSUES: &str = "issues";
    pub const FIXES_APPLIED: &str = "fixes_applied";
}
