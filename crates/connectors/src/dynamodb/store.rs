use super::{
    DynamoDbStore, classify_sdk_error,
    convert::{from_sdk_item, from_sdk_request, to_sdk_item, to_sdk_request},
};
use crate::{
    error::StoreError,
    store::{DataStore, ScanPage},
};
use async_trait::async_trait;
use model::{
    pagination::cursor::Cursor,
    records::batch::{MAX_BATCH_SIZE, WriteRequest},
};
use tracing::{debug, warn};

#[async_trait]
impl DataStore for DynamoDbStore {
    async fn scan_page(
        &self,
        table: &str,
        start: Option<&Cursor>,
        limit: Option<usize>,
    ) -> Result<ScanPage, StoreError> {
        let mut request = self.client.scan().table_name(table);

        if let Some(cursor) = start {
            request = request.set_exclusive_start_key(Some(to_sdk_item(cursor.key())));
        }
        if let Some(limit) = limit {
            request = request.limit(i32::try_from(limit).unwrap_or(i32::MAX));
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify_sdk_error("Scan", table, e))?;

        let items = response
            .items()
            .iter()
            .map(from_sdk_item)
            .collect::<Result<Vec<_>, _>>()?;

        let last_key = response
            .last_evaluated_key()
            .map(from_sdk_item)
            .transpose()?;

        debug!(table, rows = items.len(), "Scanned page");
        Ok(ScanPage {
            items,
            cursor: Cursor::from_last_key(last_key),
        })
    }

    async fn batch_write(
        &self,
        table: &str,
        requests: Vec<WriteRequest>,
    ) -> Result<Vec<WriteRequest>, StoreError> {
        if requests.is_empty() {
            return Ok(vec![]);
        }
        if requests.len() > MAX_BATCH_SIZE {
            return Err(StoreError::Validation(format!(
                "Batch of {} exceeds the limit of {MAX_BATCH_SIZE} operations",
                requests.len()
            )));
        }

        let sdk_requests = requests
            .iter()
            .map(to_sdk_request)
            .collect::<Result<Vec<_>, _>>()?;

        let response = self
            .client
            .batch_write_item()
            .request_items(table, sdk_requests)
            .send()
            .await
            .map_err(|e| classify_sdk_error("BatchWriteItem", table, e))?;

        let unprocessed = match response
            .unprocessed_items()
            .and_then(|items| items.get(table))
        {
            Some(pending) => pending
                .iter()
                .map(from_sdk_request)
                .collect::<Result<Vec<_>, _>>()?,
            None => vec![],
        };

        if !unprocessed.is_empty() {
            warn!(table, count = unprocessed.len(), "Unprocessed items detected");
        }
        Ok(unprocessed)
    }

    async fn ping(&self, table: &str) -> Result<(), StoreError> {
        self.client
            .describe_table()
            .table_name(table)
            .send()
            .await
            .map_err(|e| classify_sdk_error("DescribeTable", table, e))?;
        Ok(())
    }
}
