use crate::error::MigrationError;
use connectors::store::DataStore;
use engine_config::settings::EngineSettings;
use engine_core::retry::RetryPolicy;
use engine_processing::{consumer::BatchWriter, state_manager::StateManager};
use model::{core::attribute::Item, job::JobStatus, records::batch::MAX_BATCH_SIZE};
use serde::Serialize;
use std::{collections::BTreeSet, sync::Arc};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum UndoOutcome {
    /// Every ledger key was deleted from the target and the ledger entry is
    /// gone.
    Undone {
        job_id: String,
        deleted: usize,
        status: JobStatus,
    },
    /// No ledger entry to replay. `job_id` is `None` when no job at all has
    /// one.
    NothingToUndo { job_id: Option<String> },
}

/// Reverses completed writes by replaying the undo ledger as deletes.
pub struct UndoEngine {
    store: Arc<dyn DataStore>,
    state: StateManager,
    retry: RetryPolicy,
    batch_size: usize,
}

impl UndoEngine {
    pub fn new(store: Arc<dyn DataStore>, state: StateManager) -> Self {
        Self {
            store,
            state,
            retry: RetryPolicy::default(),
            batch_size: MAX_BATCH_SIZE,
        }
    }

    pub fn with_settings(mut self, settings: &EngineSettings) -> Self {
        self.retry = settings.retry_policy();
        self.batch_size = settings.batch_size.clamp(1, MAX_BATCH_SIZE);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Deletes every key recorded for `job_id`, then drops the ledger entry.
    /// A completed job moves to `undone` with its processed count reset;
    /// other jobs keep their status.
    ///
    /// Nothing is deleted unless the job exists with a resolved key schema.
    pub async fn undo(&self, job_id: &str) -> Result<UndoOutcome, MigrationError> {
        let mut job = self
            .state
            .jobs()
            .get_job(job_id)
            .await?
            .ok_or_else(|| MigrationError::JobNotFound(job_id.to_string()))?;

        let keys = self.state.ledger().load(job_id).await?;
        if keys.is_empty() {
            info!(job_id, "Nothing to undo");
            return Ok(UndoOutcome::NothingToUndo {
                job_id: Some(job.id),
            });
        }

        if job.key_schema.as_ref().is_none_or(|schema| schema.is_empty()) {
            return Err(MigrationError::UndoRefused {
                job_id: job.id,
                reason: "target key schema was never resolved".into(),
            });
        }

        let recorded = keys.len();
        let keys = unique_keys(keys);
        if keys.len() < recorded {
            debug!(job_id, duplicates = recorded - keys.len(), "Dropped repeated ledger keys");
        }
        info!(job_id, table = %job.target_table, keys = keys.len(), "Undoing migration");

        let writer = BatchWriter::new(self.store.clone(), self.retry.clone())
            .with_batch_size(self.batch_size);
        let summary = writer.delete(&job.target_table, keys).await?;

        let removed = self.state.ledger().remove(job_id).await?;
        if job.mark_undone() {
            self.state.save_job(&mut job).await?;
        }

        info!(
            job_id,
            deleted = summary.operations,
            ledger_keys = removed,
            status = %job.status,
            "Undo completed"
        );

        Ok(UndoOutcome::Undone {
            job_id: job.id,
            deleted: summary.operations,
            status: job.status,
        })
    }

    /// Undoes the most recently created job that still has ledger keys.
    pub async fn undo_most_recent(&self) -> Result<UndoOutcome, MigrationError> {
        let entries = self.state.ledger().entries().await?;
        let jobs = self.state.jobs().list_jobs().await?;

        match jobs.iter().rev().find(|job| entries.contains_key(&job.id)) {
            Some(job) => self.undo(&job.id).await,
            None => {
                info!("No migration has keys to undo");
                Ok(UndoOutcome::NothingToUndo { job_id: None })
            }
        }
    }
}

/// Drops repeated keys, keeping the first occurrence of each. A resumed run
/// can record a key twice and the store rejects a batch that names one key
/// more than once.
fn unique_keys(keys: Vec<Item>) -> Vec<Item> {
    let mut seen = BTreeSet::new();
    keys.into_iter()
        .filter(|key| seen.insert(key.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectors::memory::MemoryStore;
    use engine_core::state::sled_store::SledStateStore;
    use model::{
        core::attribute::AttributeValue,
        job::{KeySchema, MigrationJob},
        records::batch::WriteRequest,
        transform::mapping::ColumnMappings,
    };
    use tempfile::TempDir;
    use tracing_test::traced_test;

    fn key(id: &str) -> Item {
        let mut key = Item::new();
        key.insert("id".into(), AttributeValue::s(id));
        key
    }

    async fn setup() -> (TempDir, Arc<MemoryStore>, StateManager, UndoEngine) {
        let dir = tempfile::tempdir().unwrap();
        let sled = Arc::new(SledStateStore::open(dir.path()).unwrap());
        let state = StateManager::new(sled.clone(), sled);
        let store = Arc::new(MemoryStore::new());
        store.add_table("dst", KeySchema::new("id", None)).await;
        let engine = UndoEngine::new(store.clone(), state.clone()).with_retry(RetryPolicy::immediate(3));
        (dir, store, state, engine)
    }

    async fn completed_job(state: &StateManager, keys: Vec<Item>) -> MigrationJob {
        let mut job = MigrationJob::new("src", "dst", ColumnMappings::passthrough(Vec::<String>::new()));
        job.key_schema = Some(KeySchema::new("id", None));
        job.processed_count = keys.len() as u64;
        job.mark_completed();
        let mut staged = keys;
        state.checkpoint(&mut job, &mut staged).await.unwrap();
        job
    }

    #[traced_test]
    #[tokio::test]
    async fn deletes_ledger_keys_and_marks_job_undone() {
        let (_dir, store, state, engine) = setup().await;
        store.insert("dst", [key("1"), key("2"), key("3")]).await.unwrap();
        let job = completed_job(&state, vec![key("1"), key("2")]).await;

        let outcome = engine.undo(&job.id).await.unwrap();
        assert_eq!(
            outcome,
            UndoOutcome::Undone {
                job_id: job.id.clone(),
                deleted: 2,
                status: JobStatus::Undone,
            }
        );

        let calls = store.write_calls().await;
        assert_eq!(calls.len(), 1);
        assert!(calls[0].requests.iter().all(|r| !r.is_put()));
        assert_eq!(store.items("dst").await, vec![key("3")]);

        let stored = state.load_job(&job.id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Undone);
        assert_eq!(stored.processed_count, 0);
        assert!(state.ledger().load(&job.id).await.unwrap().is_empty());
        assert!(logs_contain("Undo completed"));
    }

    #[tokio::test]
    async fn repeated_ledger_keys_are_deleted_once() {
        let (_dir, store, state, engine) = setup().await;
        store.insert("dst", [key("0"), key("1"), key("2"), key("3")]).await.unwrap();
        let job = completed_job(
            &state,
            vec![key("0"), key("1"), key("2"), key("0"), key("1")],
        )
        .await;

        let outcome = engine.undo(&job.id).await.unwrap();
        assert!(matches!(outcome, UndoOutcome::Undone { deleted: 3, .. }));

        let calls = store.write_calls().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].requests,
            vec![
                WriteRequest::delete(key("0")),
                WriteRequest::delete(key("1")),
                WriteRequest::delete(key("2")),
            ]
        );
        assert_eq!(store.items("dst").await, vec![key("3")]);
        assert!(state.ledger().load(&job.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn second_undo_is_a_no_op() {
        let (_dir, store, state, engine) = setup().await;
        let job = completed_job(&state, vec![key("1")]).await;

        engine.undo(&job.id).await.unwrap();
        let again = engine.undo(&job.id).await.unwrap();
        assert_eq!(
            again,
            UndoOutcome::NothingToUndo {
                job_id: Some(job.id.clone())
            }
        );
        assert_eq!(store.write_calls().await.len(), 1);
    }

    #[tokio::test]
    async fn refuses_without_key_schema_or_job() {
        let (_dir, _store, state, engine) = setup().await;
        let mut job = MigrationJob::new("src", "dst", ColumnMappings::passthrough(Vec::<String>::new()));
        let mut staged = vec![key("1")];
        state.checkpoint(&mut job, &mut staged).await.unwrap();

        assert!(matches!(
            engine.undo(&job.id).await,
            Err(MigrationError::UndoRefused { .. })
        ));
        assert_eq!(state.ledger().load(&job.id).await.unwrap().len(), 1);

        assert!(matches!(
            engine.undo("migration_missing").await,
            Err(MigrationError::JobNotFound(_))
        ));
    }

    #[tokio::test]
    async fn in_progress_jobs_keep_their_status() {
        let (_dir, _store, state, engine) = setup().await;
        let mut job = MigrationJob::new("src", "dst", ColumnMappings::passthrough(Vec::<String>::new()));
        job.key_schema = Some(KeySchema::new("id", None));
        job.processed_count = 1;
        let mut staged = vec![key("1")];
        state.checkpoint(&mut job, &mut staged).await.unwrap();

        let outcome = engine.undo(&job.id).await.unwrap();
        assert!(matches!(
            outcome,
            UndoOutcome::Undone {
                status: JobStatus::InProgress,
                ..
            }
        ));
        assert_eq!(state.load_job(&job.id).await.unwrap().processed_count, 1);
    }

    #[tokio::test]
    async fn most_recent_job_with_keys_is_chosen() {
        let (_dir, _store, state, engine) = setup().await;
        assert_eq!(
            engine.undo_most_recent().await.unwrap(),
            UndoOutcome::NothingToUndo { job_id: None }
        );

        let older = completed_job(&state, vec![key("1")]).await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let newer = completed_job(&state, vec![key("2")]).await;

        let outcome = engine.undo_most_recent().await.unwrap();
        assert!(matches!(outcome, UndoOutcome::Undone { ref job_id, .. } if *job_id == newer.id));

        let outcome = engine.undo_most_recent().await.unwrap();
        assert!(matches!(outcome, UndoOutcome::Undone { ref job_id, .. } if *job_id == older.id));
    }
}
