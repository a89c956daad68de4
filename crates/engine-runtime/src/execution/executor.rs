use crate::{
    error::MigrationError,
    execution::{
        confirm::{Confirm, FixedAnswer},
        schema,
    },
};
use connectors::store::{DataStore, ScanPage, TableCatalog};
use engine_config::settings::EngineSettings;
use engine_core::{metrics::Metrics, retry::RetryPolicy};
use engine_processing::{
    consumer::BatchWriter, retry::classify_store_error, state_manager::StateManager,
    transform::mapping::AttributeMapper,
};
use model::{
    core::attribute::{Item, decode_item, encode_record},
    job::{JobStatus, MigrationJob},
    pagination::cursor::Cursor,
    records::batch::MAX_BATCH_SIZE,
};
use serde::Serialize;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Outcome of one `run` invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub job_id: String,
    /// Total written by this and every earlier run of the job.
    pub processed_count: u64,
    pub records_written: u64,
    pub records_scanned: u64,
    pub batches: u64,
    pub pages: u64,
    pub retries: u64,
    pub warnings: u64,
    pub duration: Duration,
    pub status: JobStatus,
    /// The run stopped early on operator request.
    pub cancelled: bool,
}

/// Runs migration jobs: scan the source page by page, map each record,
/// write in batches, and checkpoint progress and undo keys as it goes.
pub struct MigrationEngine {
    store: Arc<dyn DataStore>,
    catalog: Arc<dyn TableCatalog>,
    state: StateManager,
    confirm: Arc<dyn Confirm>,
    cancel: CancellationToken,
    retry: RetryPolicy,
    batch_size: usize,
    scan_page_limit: Option<usize>,
    table_active_timeout: Duration,
}

impl MigrationEngine {
    pub fn new(
        store: Arc<dyn DataStore>,
        catalog: Arc<dyn TableCatalog>,
        state: StateManager,
    ) -> Self {
        Self {
            store,
            catalog,
            state,
            confirm: Arc::new(FixedAnswer(false)),
            cancel: CancellationToken::new(),
            retry: RetryPolicy::default(),
            batch_size: MAX_BATCH_SIZE,
            scan_page_limit: None,
            table_active_timeout: Duration::from_secs(300),
        }
    }

    pub fn with_settings(mut self, settings: &EngineSettings) -> Self {
        self.retry = settings.retry_policy();
        self.batch_size = settings.batch_size.clamp(1, MAX_BATCH_SIZE);
        self.scan_page_limit = settings.scan_page_limit;
        self.table_active_timeout = settings.table_active_timeout;
        self
    }

    /// Who to ask before creating a missing target table. Without one,
    /// creation is declined.
    pub fn with_confirm(mut self, confirm: Arc<dyn Confirm>) -> Self {
        self.confirm = confirm;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);
        self
    }

    pub fn with_scan_page_limit(mut self, limit: Option<usize>) -> Self {
        self.scan_page_limit = limit;
        self
    }

    pub fn state(&self) -> &StateManager {
        &self.state
    }

    /// Runs (or resumes) `job_id`. Any fatal error leaves the job in
    /// `error` at its last checkpoint; state-store failures leave it
    /// untouched.
    pub async fn run(&self, job_id: &str) -> Result<RunSummary, MigrationError> {
        let started = Instant::now();
        let mut job = match self.state.jobs().get_job(job_id).await? {
            Some(job) => job,
            None => return Err(MigrationError::JobNotFound(job_id.to_string())),
        };

        if job.status == JobStatus::Completed {
            return Err(MigrationError::JobAlreadyCompleted(job.id));
        }

        info!(
            job_id = %job.id,
            source = %job.source_table,
            target = %job.target_table,
            status = %job.status,
            resume = job.cursor.is_some(),
            "Starting migration"
        );

        let metrics = Metrics::new();
        let result = self.execute(&mut job, &metrics).await;

        let cancelled = match result {
            Ok(cancelled) => cancelled,
            Err(e) => {
                error!(job_id = %job.id, kind = %e.kind(), error = %e, "Migration failed");
                if e.marks_job() {
                    job.mark_error();
                    if let Err(save_err) = self.state.save_job(&mut job).await {
                        error!(job_id = %job.id, error = %save_err, "Failed to record job error");
                    }
                }
                return Err(e);
            }
        };

        let snapshot = metrics.snapshot();
        let summary = RunSummary {
            job_id: job.id.clone(),
            processed_count: job.processed_count,
            records_written: snapshot.records_written,
            records_scanned: snapshot.records_scanned,
            batches: snapshot.batches_written,
            pages: snapshot.pages_scanned,
            retries: snapshot.retry_count,
            warnings: snapshot.warning_count,
            duration: started.elapsed(),
            status: job.status,
            cancelled,
        };

        info!(
            job_id = %summary.job_id,
            status = %summary.status,
            rows = summary.records_written,
            processed = summary.processed_count,
            pages = summary.pages,
            warnings = summary.warnings,
            duration_ms = summary.duration.as_millis(),
            "Migration run finished"
        );
        Ok(summary)
    }

    /// Returns whether the run stopped on cancellation.
    async fn execute(
        &self,
        job: &mut MigrationJob,
        metrics: &Metrics,
    ) -> Result<bool, MigrationError> {
        self.store
            .ping(&job.source_table)
            .await
            .map_err(|e| MigrationError::from_store("ping", e))?;

        job.mark_in_progress();
        self.state.save_job(job).await?;

        if job.key_schema.is_none() {
            let schema = schema::resolve_target_schema(
                self.catalog.as_ref(),
                self.confirm.as_ref(),
                &job.source_table,
                &job.target_table,
                self.table_active_timeout,
            )
            .await?;
            info!(job_id = %job.id, key_schema = ?schema, "Resolved target key schema");
            job.key_schema = Some(schema);
            self.state.save_job(job).await?;
        }

        let mapper = AttributeMapper::for_job(job)?;
        let writer = BatchWriter::new(self.store.clone(), self.retry.clone())
            .with_batch_size(self.batch_size)
            .with_metrics(metrics.clone());

        let mut cursor = job.cursor.clone();
        let mut buffer: Vec<Item> = Vec::with_capacity(writer.batch_size());
        let mut staged: Vec<Item> = Vec::new();

        loop {
            if self.cancel.is_cancelled() {
                warn!(job_id = %job.id, processed = job.processed_count, "Shutdown requested, stopping after last checkpoint");
                return Ok(true);
            }

            let page = self.scan(&job.source_table, cursor.as_ref()).await?;
            metrics.increment_pages(1);
            metrics.increment_scanned(page.items.len() as u64);

            for source_item in &page.items {
                let record = decode_item(source_item)?;
                let mapped = mapper.map(&record);
                if !mapped.warnings.is_empty() {
                    metrics.increment_warnings(mapped.warnings.len() as u64);
                }

                let target_item = encode_record(&mapped.record)?;
                staged.push(job.undo_key(&target_item, source_item));
                buffer.push(target_item);

                if buffer.len() >= writer.batch_size() {
                    self.flush(&writer, job, &mut buffer, &mut staged).await?;
                }
            }

            // Nothing mapped from this page may sit behind an advanced cursor.
            self.flush(&writer, job, &mut buffer, &mut staged).await?;

            match page.cursor {
                Some(next) => {
                    job.cursor = Some(next.clone());
                    self.state.checkpoint(job, &mut staged).await?;
                    cursor = Some(next);
                }
                None => break,
            }
        }

        job.mark_completed();
        self.state.checkpoint(job, &mut staged).await?;
        info!(job_id = %job.id, processed = job.processed_count, "Migration completed");
        Ok(false)
    }

    async fn scan(&self, table: &str, cursor: Option<&Cursor>) -> Result<ScanPage, MigrationError> {
        self.retry
            .run(
                move || self.store.scan_page(table, cursor, self.scan_page_limit),
                classify_store_error,
            )
            .await
            .map_err(|e| MigrationError::from_store("scan", e.into_inner()))
    }

    /// Writes the buffered items, then records their undo keys and the new
    /// processed count.
    async fn flush(
        &self,
        writer: &BatchWriter,
        job: &mut MigrationJob,
        buffer: &mut Vec<Item>,
        staged: &mut Vec<Item>,
    ) -> Result<(), MigrationError> {
        if buffer.is_empty() {
            return Ok(());
        }

        let items = std::mem::take(buffer);
        let summary = writer.write(&job.target_table, items).await?;
        job.advance(summary.operations as u64);
        self.state.checkpoint(job, staged).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use connectors::{error::StoreError, memory::MemoryStore};
    use engine_core::state::{UndoLedger, sled_store::SledStateStore};
    use model::{
        core::attribute::AttributeValue,
        job::KeySchema,
        transform::mapping::{ColumnMappings, MappingSpec},
    };
    use tempfile::TempDir;

    fn item(id: usize) -> Item {
        let mut item = Item::new();
        item.insert("id".into(), AttributeValue::s(format!("{id:03}")));
        item.insert("price".into(), AttributeValue::n(id));
        item.insert("ssn".into(), AttributeValue::s("secret"));
        item
    }

    struct Fixture {
        _dir: TempDir,
        store: Arc<MemoryStore>,
        state: StateManager,
    }

    async fn fixture(rows: usize, page_size: usize) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let sled = Arc::new(SledStateStore::open(dir.path()).unwrap());
        let store = Arc::new(MemoryStore::new().with_page_size(page_size));
        store.add_table("src", KeySchema::new("id", None)).await;
        store.add_table("dst", KeySchema::new("id", None)).await;
        store.insert("src", (0..rows).map(item)).await.unwrap();
        Fixture {
            _dir: dir,
            store,
            state: StateManager::new(sled.clone(), sled),
        }
    }

    fn engine(f: &Fixture) -> MigrationEngine {
        MigrationEngine::new(f.store.clone(), f.store.clone(), f.state.clone())
            .with_retry(RetryPolicy::immediate(3))
    }

    async fn create_job(f: &Fixture, mappings: ColumnMappings) -> MigrationJob {
        let mut job = MigrationJob::new("src", "dst", mappings);
        f.state.save_job(&mut job).await.unwrap();
        job
    }

    #[tokio::test]
    async fn copies_every_record_and_completes() {
        let f = fixture(60, 20).await;
        let job = create_job(&f, ColumnMappings::passthrough(["ssn"])).await;

        let summary = engine(&f).run(&job.id).await.unwrap();
        assert_eq!(summary.status, JobStatus::Completed);
        assert_eq!(summary.processed_count, 60);
        assert_eq!(summary.pages, 3);
        assert!(!summary.cancelled);

        let copied = f.store.items("dst").await;
        assert_eq!(copied.len(), 60);
        assert!(copied.iter().all(|i| !i.contains_key("ssn")));

        let stored = f.state.load_job(&job.id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
        assert!(stored.cursor.is_none());
        assert_eq!(stored.key_schema, Some(KeySchema::new("id", None)));
        assert_eq!(f.state.ledger().load(&job.id).await.unwrap().len(), 60);
    }

    #[tokio::test]
    async fn completed_jobs_are_refused() {
        let f = fixture(3, 10).await;
        let job = create_job(&f, ColumnMappings::passthrough(Vec::<String>::new())).await;
        engine(&f).run(&job.id).await.unwrap();

        let err = engine(&f).run(&job.id).await.unwrap_err();
        assert!(matches!(err, MigrationError::JobAlreadyCompleted(_)));
    }

    #[tokio::test]
    async fn templates_shape_the_target_items() {
        let f = fixture(2, 10).await;
        let mappings = ColumnMappings::new()
            .with("id", MappingSpec::template("{id}"))
            .with("price", MappingSpec::template("{price add 5}"))
            .with("label", MappingSpec::template("item-{id}"))
            .with("broken", MappingSpec::template("{id divide 0}"));
        let job = create_job(&f, mappings).await;

        let summary = engine(&f).run(&job.id).await.unwrap();
        assert_eq!(summary.warnings, 2);

        let items = f.store.items("dst").await;
        let first = &items[0];
        assert_eq!(first.get("price"), Some(&AttributeValue::N("5.0".into())));
        assert_eq!(first.get("label"), Some(&AttributeValue::s("item-000")));
        assert_eq!(first.get("broken"), Some(&AttributeValue::s("000")));
        assert!(!first.contains_key("ssn"));
    }

    #[tokio::test]
    async fn scan_failure_marks_job_error_at_last_checkpoint() {
        let f = fixture(30, 10).await;
        f.store
            .fail_scan_call(1, StoreError::Validation("bad segment".into()))
            .await;
        let job = create_job(&f, ColumnMappings::passthrough(Vec::<String>::new())).await;

        let err = engine(&f).run(&job.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Store);

        let stored = f.state.load_job(&job.id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Error);
        assert_eq!(stored.processed_count, 10);
        assert!(stored.cursor.is_some());
    }

    #[tokio::test]
    async fn unreachable_store_leaves_cursor_untouched() {
        let f = fixture(5, 10).await;
        let job = create_job(&f, ColumnMappings::passthrough(Vec::<String>::new())).await;
        f.store.set_reachable(false).await;

        let err = engine(&f).run(&job.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connectivity);

        let stored = f.state.load_job(&job.id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Error);
        assert!(stored.cursor.is_none());
        assert_eq!(stored.processed_count, 0);
    }

    #[tokio::test]
    async fn missing_source_fails_before_any_scan() {
        let f = fixture(0, 10).await;
        let mut job = MigrationJob::new(
            "gone",
            "dst",
            ColumnMappings::passthrough(Vec::<String>::new()),
        );
        f.state.save_job(&mut job).await.unwrap();

        let err = engine(&f).run(&job.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Store);
        assert!(matches!(
            err,
            MigrationError::Store {
                operation: "ping",
                source: StoreError::TableNotFound(_),
            }
        ));
        assert!(f.store.scan_calls().await.is_empty());
    }

    #[tokio::test]
    async fn cancellation_stops_between_pages() {
        let f = fixture(10, 5).await;
        let job = create_job(&f, ColumnMappings::passthrough(Vec::<String>::new())).await;

        let cancel = CancellationToken::new();
        cancel.cancel();
        let summary = engine(&f)
            .with_cancellation(cancel)
            .run(&job.id)
            .await
            .unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.status, JobStatus::InProgress);
        assert_eq!(summary.pages, 0);
        assert!(f.store.items("dst").await.is_empty());
    }

    #[tokio::test]
    async fn missing_target_without_confirmation_is_a_schema_error() {
        let f = fixture(1, 10).await;
        let mut job = MigrationJob::new(
            "src",
            "nowhere",
            ColumnMappings::passthrough(Vec::<String>::new()),
        );
        f.state.save_job(&mut job).await.unwrap();

        let err = engine(&f).run(&job.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert_eq!(
            f.state.load_job(&job.id).await.unwrap().status,
            JobStatus::Error
        );
    }
}
