//! Run persistence port and its in-memory implementation.

mod memory;

pub use memory::InMemoryRunRepository;

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::RepositoryError;
use crate::model::{RunPatch, RunStatus, WorkflowRun};

/// Key-value store of runs by id with a status index.
///
/// Implementations must apply `update` atomically per record (the patch is
/// merged through `WorkflowRun::apply` or equivalent rules).
#[async_trait]
pub trait RunRepository: Send + Sync {
    async fn get_by_run_id(&self, run_id: Uuid) -> Result<WorkflowRun, RepositoryError>;

    async fn create(&self, run: WorkflowRun) -> Result<(), RepositoryError>;

    /// Merges `patch` and returns the updated record.
    async fn update(&self, run_id: Uuid, patch: RunPatch) -> Result<WorkflowRun, RepositoryError>;

    /// Runs in `status`, oldest first.
    async fn get_by_status(&self, status: RunStatus) -> Result<Vec<WorkflowRun>, RepositoryError>;
}
