use crate::error::MigrationError;
use engine_processing::{state_manager::StateManager, transform::mapping::AttributeMapper};
use model::{
    core::attribute::Item,
    job::{JobStatus, MigrationJob},
    transform::mapping::ColumnMappings,
};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Changes applied by [`JobService::edit`]. `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct JobEdit {
    pub source_table: Option<String>,
    pub target_table: Option<String>,
    pub column_mappings: Option<ColumnMappings>,
}

impl JobEdit {
    pub fn is_empty(&self) -> bool {
        self.source_table.is_none() && self.target_table.is_none() && self.column_mappings.is_none()
    }
}

/// Operator-facing job management on top of the job store and ledger.
#[derive(Clone)]
pub struct JobService {
    state: StateManager,
}

impl JobService {
    pub fn new(state: StateManager) -> Self {
        Self { state }
    }

    pub async fn list(&self) -> Result<Vec<MigrationJob>, MigrationError> {
        Ok(self.state.jobs().list_jobs().await?)
    }

    pub async fn get(&self, id: &str) -> Result<MigrationJob, MigrationError> {
        self.state
            .jobs()
            .get_job(id)
            .await?
            .ok_or_else(|| MigrationError::JobNotFound(id.to_string()))
    }

    /// The job to run when none is named: the most recently created one
    /// that has not completed.
    pub async fn latest_resumable(&self) -> Result<Option<MigrationJob>, MigrationError> {
        let jobs = self.list().await?;
        Ok(jobs
            .into_iter()
            .rev()
            .find(|job| job.status != JobStatus::Completed))
    }

    /// Defines a new job. Mappings are compiled up front so template
    /// mistakes surface here rather than mid-run.
    pub async fn create(
        &self,
        source_table: &str,
        target_table: &str,
        column_mappings: ColumnMappings,
    ) -> Result<MigrationJob, MigrationError> {
        validate_tables(source_table, target_table)?;
        AttributeMapper::new(&column_mappings)?;

        let mut job = MigrationJob::new(source_table, target_table, column_mappings);
        self.state.save_job(&mut job).await?;
        info!(job_id = %job.id, source = source_table, target = target_table, "Migration job created");
        Ok(job)
    }

    /// Applies `edit`. Changing either table restarts the scan from the
    /// beginning, and a new target has its key schema resolved again on the
    /// next run.
    ///
    /// Ledger keys are undone against the job's current target, so neither
    /// table may change while the job still has keys to undo.
    pub async fn edit(&self, id: &str, edit: JobEdit) -> Result<MigrationJob, MigrationError> {
        let mut job = self.get(id).await?;

        let source_changes = edit
            .source_table
            .as_ref()
            .is_some_and(|source| *source != job.source_table);
        let target_changes = edit
            .target_table
            .as_ref()
            .is_some_and(|target| *target != job.target_table);

        if source_changes || target_changes {
            let pending = self.ledger_for(id).await?.len();
            if pending > 0 {
                return Err(MigrationError::InvalidJob(format!(
                    "job {id} has {pending} written key(s) in its undo ledger; \
                     undo it before changing the source or target table"
                )));
            }
            job.cursor = None;
            job.processed_count = 0;
        }
        if let Some(source) = edit.source_table {
            job.source_table = source;
        }
        if let Some(target) = edit.target_table {
            if target_changes {
                job.key_schema = None;
            }
            job.target_table = target;
        }
        if let Some(mappings) = edit.column_mappings {
            AttributeMapper::new(&mappings)?;
            job.column_mappings = mappings;
        }
        validate_tables(&job.source_table, &job.target_table)?;

        self.state.save_job(&mut job).await?;
        info!(job_id = %job.id, "Migration job updated");
        Ok(job)
    }

    /// Removes the job definition. A job whose writes are still in the undo
    /// ledger is only removed with `force`, which drops the ledger entry too.
    pub async fn delete(&self, id: &str, force: bool) -> Result<bool, MigrationError> {
        let pending = self.ledger_for(id).await?.len();
        if pending > 0 && !force {
            return Err(MigrationError::InvalidJob(format!(
                "job {id} has {pending} written key(s) in its undo ledger; \
                 undo it first or delete with --force"
            )));
        }

        let removed = self.state.jobs().delete_job(id).await?;
        if pending > 0 {
            self.state.ledger().remove(id).await?;
            warn!(job_id = id, keys = pending, "Undo ledger discarded with job");
        }
        if removed {
            info!(job_id = id, "Migration job deleted");
        }
        Ok(removed)
    }

    pub async fn ledger(&self) -> Result<BTreeMap<String, Vec<Item>>, MigrationError> {
        Ok(self.state.ledger().entries().await?)
    }

    pub async fn ledger_for(&self, id: &str) -> Result<Vec<Item>, MigrationError> {
        Ok(self.state.ledger().load(id).await?)
    }
}

fn validate_tables(source: &str, target: &str) -> Result<(), MigrationError> {
    if source.trim().is_empty() || target.trim().is_empty() {
        return Err(MigrationError::InvalidJob(
            "source and target table names are required".into(),
        ));
    }
    if source == target {
        return Err(MigrationError::InvalidJob(format!(
            "source and target table must differ (both '{source}')"
        )));
    }
    Ok(())
}
