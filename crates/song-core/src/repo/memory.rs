use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use super::RunRepository;
use crate::errors::RepositoryError;
use crate::model::{RunPatch, RunStatus, WorkflowRun};

/// In-memory repository. Each record is guarded by its shard lock only for
/// the duration of a synchronous merge.
#[derive(Debug, Default)]
pub struct InMemoryRunRepository {
    runs: DashMap<Uuid, WorkflowRun>,
}

impl InMemoryRunRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

#[async_trait]
impl RunRepository for InMemoryRunRepository {
    async fn get_by_run_id(&self, run_id: Uuid) -> Result<WorkflowRun, RepositoryError> {
        self.runs
            .get(&run_id)
            .map(|r| r.value().clone())
            .ok_or(RepositoryError::NotFound(run_id))
    }

    async fn create(&self, run: WorkflowRun) -> Result<(), RepositoryError> {
        match self.runs.entry(run.run_id) {
            Entry::Occupied(_) => Err(RepositoryError::AlreadyExists(run.run_id)),
            Entry::Vacant(slot) => {
                slot.insert(run);
                Ok(())
            }
        }
    }

    async fn update(&self, run_id: Uuid, patch: RunPatch) -> Result<WorkflowRun, RepositoryError> {
        let mut entry = self.runs.get_mut(&run_id).ok_or(RepositoryError::NotFound(run_id))?;
        entry.apply(patch)?;
        Ok(entry.value().clone())
    }

    async fn get_by_status(&self, status: RunStatus) -> Result<Vec<WorkflowRun>, RepositoryError> {
        let mut runs: Vec<WorkflowRun> = self.runs
                                             .iter()
                                             .filter(|r| r.status == status)
                                             .map(|r| r.value().clone())
                                             .collect();
        runs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.run_id.cmp(&b.run_id)));
        Ok(runs)
    }
}
