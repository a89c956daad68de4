use crate::error::StateStoreError;
use async_trait::async_trait;
use model::{core::attribute::Item, job::MigrationJob};
use std::collections::BTreeMap;

pub mod sled_store;

/// Persistence for job definitions and progress.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// All jobs in creation order.
    async fn list_jobs(&self) -> Result<Vec<MigrationJob>, StateStoreError>;

    async fn get_job(&self, id: &str) -> Result<Option<MigrationJob>, StateStoreError>;

    /// Saves `job` if its version matches the stored one (or it is new with
    /// version 0). Returns the saved job carrying its bumped version.
    async fn put_job(&self, job: &MigrationJob) -> Result<MigrationJob, StateStoreError>;

    /// Returns whether a job was removed.
    async fn delete_job(&self, id: &str) -> Result<bool, StateStoreError>;
}

/// Keys written per job, replayed as deletes to undo a run.
#[async_trait]
pub trait UndoLedger: Send + Sync {
    /// Every non-empty entry keyed by job id.
    async fn entries(&self) -> Result<BTreeMap<String, Vec<Item>>, StateStoreError>;

    /// Keys in append order; empty when the job has no entry.
    async fn load(&self, job_id: &str) -> Result<Vec<Item>, StateStoreError>;

    /// Appends all `keys` atomically.
    async fn append(&self, job_id: &str, keys: &[Item]) -> Result<(), StateStoreError>;

    /// Removes the whole entry atomically. Returns how many keys it held.
    async fn remove(&self, job_id: &str) -> Result<usize, StateStoreError>;
}
