use engine_core::{
    error::StateStoreError,
    state::{JobStore, UndoLedger},
};
use model::{core::attribute::Item, job::MigrationJob};
use std::sync::Arc;
use tracing::debug;

/// Persists job progress together with the undo keys staged since the last
/// checkpoint.
#[derive(Clone)]
pub struct StateManager {
    jobs: Arc<dyn JobStore>,
    ledger: Arc<dyn UndoLedger>,
}

impl StateManager {
    pub fn new(jobs: Arc<dyn JobStore>, ledger: Arc<dyn UndoLedger>) -> Self {
        Self { jobs, ledger }
    }

    pub fn jobs(&self) -> &Arc<dyn JobStore> {
        &self.jobs
    }

    pub fn ledger(&self) -> &Arc<dyn UndoLedger> {
        &self.ledger
    }

    pub async fn load_job(&self, id: &str) -> Result<MigrationJob, StateStoreError> {
        self.jobs
            .get_job(id)
            .await?
            .ok_or_else(|| StateStoreError::JobNotFound(id.to_string()))
    }

    /// Saves `job` and replaces it with the stored copy, so the next save
    /// carries the current version.
    pub async fn save_job(&self, job: &mut MigrationJob) -> Result<(), StateStoreError> {
        *job = self.jobs.put_job(job).await?;
        Ok(())
    }

    /// Appends `staged` keys to the job's ledger entry, then saves the job.
    /// The keys are drained only once they are durable.
    pub async fn checkpoint(
        &self,
        job: &mut MigrationJob,
        staged: &mut Vec<Item>,
    ) -> Result<(), StateStoreError> {
        if !staged.is_empty() {
            self.ledger.append(&job.id, staged).await?;
            debug!(job_id = %job.id, keys = staged.len(), "Undo keys recorded");
            staged.clear();
        }

        self.save_job(job).await?;
        debug!(
            job_id = %job.id,
            processed = job.processed_count,
            version = job.version,
            "Checkpoint saved"
        );
        Ok(())
    }
}
