use crate::{
    error::StoreError,
    table::{CreateTableSpec, TableDescription},
};
use async_trait::async_trait;
use model::{
    core::attribute::Item, pagination::cursor::Cursor, records::batch::WriteRequest,
};
use std::time::Duration;

/// One page of a forward scan.
#[derive(Debug, Clone, Default)]
pub struct ScanPage {
    pub items: Vec<Item>,
    /// Where the next page starts; `None` once the scan is exhausted.
    pub cursor: Option<Cursor>,
}

impl ScanPage {
    pub fn is_last(&self) -> bool {
        self.cursor.is_none()
    }
}

/// Item-level access to a key-value store.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Reads the page starting strictly after `start`, or from the beginning
    /// of the table when `start` is `None`.
    async fn scan_page(
        &self,
        table: &str,
        start: Option<&Cursor>,
        limit: Option<usize>,
    ) -> Result<ScanPage, StoreError>;

    /// Submits at most [`MAX_BATCH_SIZE`](model::records::batch::MAX_BATCH_SIZE)
    /// operations and returns the subset the store left unprocessed.
    async fn batch_write(
        &self,
        table: &str,
        requests: Vec<WriteRequest>,
    ) -> Result<Vec<WriteRequest>, StoreError>;

    /// Cheap round-trip proving the store is reachable, accepts our
    /// credentials and holds `table`.
    async fn ping(&self, table: &str) -> Result<(), StoreError>;
}

/// Table-level metadata operations.
#[async_trait]
pub trait TableCatalog: Send + Sync {
    /// Fails with [`StoreError::TableNotFound`] when the table is absent.
    async fn describe_table(&self, table: &str) -> Result<TableDescription, StoreError>;

    async fn create_table(&self, spec: &CreateTableSpec) -> Result<(), StoreError>;

    /// Polls until the table reports active, giving up after `timeout`.
    async fn wait_until_active(
        &self,
        table: &str,
        timeout: Duration,
    ) -> Result<TableDescription, StoreError>;
}
