use crate::{error::WriterError, retry::classify_store_error};
use connectors::store::DataStore;
use engine_core::{
    metrics::Metrics,
    retry::{RetryDisposition, RetryPolicy},
};
use model::{
    core::attribute::{Item, encode_record},
    records::{
        batch::{Batch, MAX_BATCH_SIZE, WriteRequest},
        record::Record,
    },
};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Totals for one `write`/`delete` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub operations: usize,
    pub batches: usize,
    /// Resubmissions caused by unprocessed operations or transient errors.
    pub retries: usize,
}

impl WriteSummary {
    fn absorb(&mut self, other: WriteSummary) {
        self.operations += other.operations;
        self.batches += other.batches;
        self.retries += other.retries;
    }
}

/// Splits writes into store-sized batches and resubmits whatever the store
/// leaves unprocessed, under a bounded backoff policy.
pub struct BatchWriter {
    store: Arc<dyn DataStore>,
    retry: RetryPolicy,
    batch_size: usize,
    metrics: Metrics,
}

impl BatchWriter {
    pub fn new(store: Arc<dyn DataStore>, retry: RetryPolicy) -> Self {
        Self {
            store,
            retry,
            batch_size: MAX_BATCH_SIZE,
            metrics: Metrics::new(),
        }
    }

    /// Smaller batches than the store's ceiling; values are clamped to
    /// `1..=25`.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);
        self
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Puts `items`, preserving their order across batches.
    pub async fn write(&self, table: &str, items: Vec<Item>) -> Result<WriteSummary, WriterError> {
        let requests = items.into_iter().map(WriteRequest::put).collect();
        let summary = self.submit(table, requests).await?;
        self.metrics.increment_written(summary.operations as u64);
        Ok(summary)
    }

    /// Encodes `records` into wire form and puts them.
    pub async fn write_records(
        &self,
        table: &str,
        records: &[Record],
    ) -> Result<WriteSummary, WriterError> {
        let items = records
            .iter()
            .map(encode_record)
            .collect::<Result<Vec<_>, _>>()?;
        self.write(table, items).await
    }

    /// Deletes the items with the given primary keys.
    pub async fn delete(&self, table: &str, keys: Vec<Item>) -> Result<WriteSummary, WriterError> {
        let requests = keys.into_iter().map(WriteRequest::delete).collect();
        let summary = self.submit(table, requests).await?;
        self.metrics.increment_deleted(summary.operations as u64);
        Ok(summary)
    }

    /// Submits `requests` in consecutive batches. Stops at the first batch
    /// that cannot be fully applied; earlier batches stay applied.
    pub async fn submit(
        &self,
        table: &str,
        requests: Vec<WriteRequest>,
    ) -> Result<WriteSummary, WriterError> {
        let mut summary = WriteSummary::default();
        if requests.is_empty() {
            return Ok(summary);
        }

        for batch in Batch::chunked(table, requests, self.batch_size) {
            let batch_summary = self.submit_batch(table, batch).await?;
            summary.absorb(batch_summary);
        }

        debug!(
            table,
            operations = summary.operations,
            batches = summary.batches,
            retries = summary.retries,
            "Write requests applied"
        );
        Ok(summary)
    }

    async fn submit_batch(&self, table: &str, batch: Batch) -> Result<WriteSummary, WriterError> {
        let operations = batch.len();
        let mut pending = batch.requests;
        let mut attempt = 0usize;

        loop {
            let last_error = match self.store.batch_write(table, pending.clone()).await {
                Ok(unprocessed) if unprocessed.is_empty() => break,
                Ok(unprocessed) => {
                    let message = format!(
                        "{} of {} operations left unprocessed",
                        unprocessed.len(),
                        pending.len()
                    );
                    pending = unprocessed;
                    message
                }
                Err(e) => match classify_store_error(&e) {
                    RetryDisposition::Stop => {
                        return Err(WriterError::Store {
                            table: table.to_string(),
                            source: e,
                        });
                    }
                    RetryDisposition::Retry => e.to_string(),
                },
            };

            attempt += 1;
            if attempt >= self.retry.max_attempts {
                return Err(WriterError::RetriesExhausted {
                    table: table.to_string(),
                    attempts: attempt,
                    remaining: pending.len(),
                    last_error,
                });
            }

            let delay = self.retry.backoff_delay(attempt - 1);
            warn!(
                batch_id = %batch.id,
                attempt,
                pending = pending.len(),
                ?delay,
                reason = %last_error,
                "Resubmitting batch"
            );
            self.metrics.increment_retries(1);
            sleep(delay).await;
        }

        self.metrics.increment_batches(1);
        info!(batch_id = %batch.id, rows = operations, retries = attempt, "Batch written");

        Ok(WriteSummary {
            operations,
            batches: 1,
            retries: attempt,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectors::{error::StoreError, memory::MemoryStore};
    use model::{core::attribute::AttributeValue, core::value::Value, job::KeySchema, record};

    fn item(id: usize) -> Item {
        let mut item = Item::new();
        item.insert("id".into(), AttributeValue::s(format!("{id:03}")));
        item.insert("n".into(), AttributeValue::n(id));
        item
    }

    fn key(id: usize) -> Item {
        let mut key = Item::new();
        key.insert("id".into(), AttributeValue::s(format!("{id:03}")));
        key
    }

    async fn setup() -> (Arc<MemoryStore>, BatchWriter) {
        let store = Arc::new(MemoryStore::new());
        store.add_table("t", KeySchema::new("id", None)).await;
        let writer = BatchWriter::new(store.clone(), RetryPolicy::immediate(4));
        (store, writer)
    }

    #[tokio::test]
    async fn splits_into_batches_of_25_in_order() {
        let (store, writer) = setup().await;
        let items: Vec<Item> = (0..30).map(item).collect();

        let summary = writer.write("t", items.clone()).await.unwrap();
        assert_eq!(summary.operations, 30);
        assert_eq!(summary.batches, 2);

        let calls = store.write_calls().await;
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].requests.len(), 25);
        assert_eq!(calls[1].requests.len(), 5);

        let sent: Vec<Item> = calls
            .iter()
            .flat_map(|c| c.requests.iter())
            .map(|r| match r {
                WriteRequest::Put { item } => item.clone(),
                WriteRequest::Delete { key } => key.clone(),
            })
            .collect();
        assert_eq!(sent, items);
        assert_eq!(writer.metrics().snapshot().records_written, 30);
    }

    #[tokio::test]
    async fn resubmits_unprocessed_operations() {
        let (store, writer) = setup().await;
        store.leave_unprocessed([3, 1]).await;

        let summary = writer.write("t", (0..10).map(item).collect()).await.unwrap();
        assert_eq!(summary.retries, 2);

        let calls = store.write_calls().await;
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1].requests.len(), 3);
        assert_eq!(calls[2].requests.len(), 1);
        assert_eq!(store.items("t").await.len(), 10);
    }

    #[tokio::test]
    async fn gives_up_when_store_never_accepts() {
        let (store, writer) = setup().await;
        store.leave_unprocessed([2; 10]).await;

        let err = writer
            .write("t", (0..5).map(item).collect())
            .await
            .unwrap_err();
        match err {
            WriterError::RetriesExhausted {
                attempts, remaining, ..
            } => {
                assert_eq!(attempts, 4);
                assert_eq!(remaining, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.write_calls().await.len(), 4);
    }

    #[tokio::test]
    async fn retries_throttling_but_not_fatal_errors() {
        let (store, writer) = setup().await;
        store
            .fail_next_write(StoreError::Throttled("rate exceeded".into()))
            .await;
        let summary = writer.write("t", vec![item(1)]).await.unwrap();
        assert_eq!(summary.retries, 1);

        store
            .fail_next_write(StoreError::Validation("bad request".into()))
            .await;
        let err = writer.write("t", vec![item(2)]).await.unwrap_err();
        assert!(matches!(
            err,
            WriterError::Store {
                source: StoreError::Validation(_),
                ..
            }
        ));
        assert!(store.get("t", &key(1)).await.is_some());
        assert!(store.get("t", &key(2)).await.is_none());
    }

    #[tokio::test]
    async fn deletes_use_the_same_batching() {
        let (store, writer) = setup().await;
        store.insert("t", (0..27).map(item)).await.unwrap();

        let summary = writer.delete("t", (0..27).map(key).collect()).await.unwrap();
        assert_eq!(summary.batches, 2);
        assert!(store.items("t").await.is_empty());
        assert_eq!(writer.metrics().snapshot().records_deleted, 27);
    }

    #[tokio::test]
    async fn encoding_errors_fail_before_any_write() {
        let (store, writer) = setup().await;
        let records = vec![
            record!("id" => "a", "score" => 1.5),
            record!("id" => "b", "score" => Value::Float(f64::NAN)),
        ];

        let err = writer.write_records("t", &records).await.unwrap_err();
        assert!(matches!(err, WriterError::Encode(_)));
        assert!(store.write_calls().await.is_empty());
    }
}
