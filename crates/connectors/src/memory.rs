//! In-process store used by tests and dry runs.
//!
//! Items are kept in key order so scans are deterministic. Failures,
//! throttling and partial batch acceptance can be scripted ahead of time.

use crate::{
    error::StoreError,
    store::{DataStore, ScanPage, TableCatalog},
    table::{
        AttributeDefinition, BillingMode, CreateTableSpec, KeyElement, TableDescription,
        TableStatus,
    },
};
use async_trait::async_trait;
use model::{
    core::{attribute::Item, data_type::ScalarAttributeType},
    job::{KeyRole, KeySchema},
    pagination::cursor::Cursor,
    records::batch::{MAX_BATCH_SIZE, WriteRequest},
};
use std::{
    collections::{BTreeMap, BTreeSet, HashMap, VecDeque},
    ops::Bound,
    time::Duration,
};
use tokio::sync::Mutex;
use tracing::debug;

const DEFAULT_PAGE_SIZE: usize = 100;

/// One recorded `batch_write` call.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteCall {
    pub table: String,
    pub requests: Vec<WriteRequest>,
}

struct MemoryTable {
    description: TableDescription,
    items: BTreeMap<Item, Item>,
}

impl MemoryTable {
    fn key_of(&self, item: &Item) -> Result<Item, StoreError> {
        let schema = self.description.key_schema();
        let key = schema.project(item);
        if let Some(missing) = schema.attributes().find(|name| !key.contains_key(*name)) {
            return Err(StoreError::Validation(format!(
                "Missing the key {missing} in the item"
            )));
        }
        Ok(key)
    }

    fn request_key(&self, request: &WriteRequest) -> Result<Item, StoreError> {
        match request {
            WriteRequest::Put { item } => self.key_of(item),
            WriteRequest::Delete { key } => self.key_of(key),
        }
    }

    /// A batch naming the same key twice is rejected whole, before anything
    /// is applied.
    fn check_unique_keys(&self, requests: &[WriteRequest]) -> Result<(), StoreError> {
        let mut seen = BTreeSet::new();
        for request in requests {
            if !seen.insert(self.request_key(request)?) {
                return Err(StoreError::Validation(
                    "Provided list of item keys contains duplicates".into(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Default)]
struct State {
    tables: HashMap<String, MemoryTable>,
    unprocessed_plan: VecDeque<usize>,
    write_failures: VecDeque<StoreError>,
    scan_failures: HashMap<usize, StoreError>,
    create_failure: Option<StoreError>,
    unreachable: bool,
    write_calls: Vec<WriteCall>,
    scan_calls: Vec<Option<Cursor>>,
    created: Vec<CreateTableSpec>,
}

pub struct MemoryStore {
    page_size: usize,
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            state: Mutex::new(State::default()),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Adds an empty on-demand table whose key attributes are strings.
    pub async fn add_table(&self, name: &str, key_schema: KeySchema) {
        let mut key_elements = vec![];
        let mut definitions = vec![];
        for role in [KeyRole::Hash, KeyRole::Range] {
            if let Some(attribute) = key_schema.get(role) {
                key_elements.push(KeyElement::new(attribute, role));
                definitions.push(AttributeDefinition::new(attribute, ScalarAttributeType::S));
            }
        }

        self.add_table_description(TableDescription {
            name: name.to_string(),
            key_schema: key_elements,
            attribute_definitions: definitions,
            billing_mode: BillingMode::PayPerRequest,
            throughput: None,
            indexes: vec![],
            status: TableStatus::Active,
            item_count: Some(0),
        })
        .await;
    }

    pub async fn add_table_description(&self, description: TableDescription) {
        let mut state = self.state.lock().await;
        state.tables.insert(
            description.name.clone(),
            MemoryTable {
                description,
                items: BTreeMap::new(),
            },
        );
    }

    pub async fn insert(
        &self,
        table: &str,
        items: impl IntoIterator<Item = Item>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let table = table_mut(&mut state, table)?;
        for item in items {
            let key = table.key_of(&item)?;
            table.items.insert(key, item);
        }
        Ok(())
    }

    /// All items of `table` in scan order.
    pub async fn items(&self, table: &str) -> Vec<Item> {
        let state = self.state.lock().await;
        state
            .tables
            .get(table)
            .map(|t| t.items.values().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn get(&self, table: &str, key: &Item) -> Option<Item> {
        let state = self.state.lock().await;
        state.tables.get(table)?.items.get(key).cloned()
    }

    pub async fn has_table(&self, table: &str) -> bool {
        self.state.lock().await.tables.contains_key(table)
    }

    /// For each upcoming `batch_write` call, leave this many trailing
    /// requests unprocessed.
    pub async fn leave_unprocessed(&self, counts: impl IntoIterator<Item = usize>) {
        self.state.lock().await.unprocessed_plan.extend(counts);
    }

    /// Fails the next `batch_write` call with `error`.
    pub async fn fail_next_write(&self, error: StoreError) {
        self.state.lock().await.write_failures.push_back(error);
    }

    /// Fails the `call`-th scan (zero-based) with `error`.
    pub async fn fail_scan_call(&self, call: usize, error: StoreError) {
        self.state.lock().await.scan_failures.insert(call, error);
    }

    pub async fn fail_create_table(&self, error: StoreError) {
        self.state.lock().await.create_failure = Some(error);
    }

    pub async fn set_reachable(&self, reachable: bool) {
        self.state.lock().await.unreachable = !reachable;
    }

    pub async fn write_calls(&self) -> Vec<WriteCall> {
        self.state.lock().await.write_calls.clone()
    }

    pub async fn scan_calls(&self) -> Vec<Option<Cursor>> {
        self.state.lock().await.scan_calls.clone()
    }

    pub async fn created_tables(&self) -> Vec<CreateTableSpec> {
        self.state.lock().await.created.clone()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn table_mut<'a>(state: &'a mut State, name: &str) -> Result<&'a mut MemoryTable, StoreError> {
    state
        .tables
        .get_mut(name)
        .ok_or_else(|| StoreError::TableNotFound(name.to_string()))
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn scan_page(
        &self,
        table: &str,
        start: Option<&Cursor>,
        limit: Option<usize>,
    ) -> Result<ScanPage, StoreError> {
        let mut state = self.state.lock().await;
        if state.unreachable {
            return Err(StoreError::Connectivity("memory store offline".into()));
        }

        let call = state.scan_calls.len();
        state.scan_calls.push(start.cloned());
        if let Some(error) = state.scan_failures.remove(&call) {
            return Err(error);
        }

        let table = table_mut(&mut state, table)?;
        let page_size = limit.map_or(self.page_size, |l| l.clamp(1, self.page_size));
        let lower = match start {
            Some(cursor) => Bound::Excluded(cursor.key().clone()),
            None => Bound::Unbounded,
        };

        let mut range = table.items.range((lower, Bound::Unbounded));
        let page: Vec<(&Item, &Item)> = range.by_ref().take(page_size).collect();
        let has_more = range.next().is_some();

        let cursor = match page.last() {
            Some((key, _)) if has_more => Some(Cursor::new((*key).clone())),
            _ => None,
        };

        Ok(ScanPage {
            items: page.into_iter().map(|(_, item)| item.clone()).collect(),
            cursor,
        })
    }

    async fn batch_write(
        &self,
        table: &str,
        requests: Vec<WriteRequest>,
    ) -> Result<Vec<WriteRequest>, StoreError> {
        if requests.len() > MAX_BATCH_SIZE {
            return Err(StoreError::Validation(format!(
                "Batch of {} exceeds the limit of {MAX_BATCH_SIZE} operations",
                requests.len()
            )));
        }

        let mut state = self.state.lock().await;
        state.write_calls.push(WriteCall {
            table: table.to_string(),
            requests: requests.clone(),
        });

        if state.unreachable {
            return Err(StoreError::Connectivity("memory store offline".into()));
        }
        if let Some(error) = state.write_failures.pop_front() {
            return Err(error);
        }
        table_mut(&mut state, table)?.check_unique_keys(&requests)?;

        let leave = state.unprocessed_plan.pop_front().unwrap_or(0);
        let split = requests.len().saturating_sub(leave);
        let mut requests = requests;
        let unprocessed = requests.split_off(split);

        let table = table_mut(&mut state, table)?;
        for request in requests {
            let key = table.request_key(&request)?;
            match request {
                WriteRequest::Put { item } => {
                    table.items.insert(key, item);
                }
                WriteRequest::Delete { .. } => {
                    table.items.remove(&key);
                }
            }
        }

        if !unprocessed.is_empty() {
            debug!(count = unprocessed.len(), "Leaving requests unprocessed");
        }
        Ok(unprocessed)
    }

    async fn ping(&self, table: &str) -> Result<(), StoreError> {
        let state = self.state.lock().await;
        if state.unreachable {
            return Err(StoreError::Connectivity("memory store offline".into()));
        }
        if !state.tables.contains_key(table) {
            return Err(StoreError::TableNotFound(table.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl TableCatalog for MemoryStore {
    async fn describe_table(&self, table: &str) -> Result<TableDescription, StoreError> {
        let state = self.state.lock().await;
        if state.unreachable {
            return Err(StoreError::Connectivity("memory store offline".into()));
        }
        let table = state
            .tables
            .get(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;

        let mut description = table.description.clone();
        description.item_count = Some(table.items.len() as i64);
        Ok(description)
    }

    async fn create_table(&self, spec: &CreateTableSpec) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if let Some(error) = state.create_failure.take() {
            return Err(error);
        }
        if state.tables.contains_key(&spec.table_name) {
            return Err(StoreError::Validation(format!(
                "Table already exists: {}",
                spec.table_name
            )));
        }

        state.created.push(spec.clone());
        state.tables.insert(
            spec.table_name.clone(),
            MemoryTable {
                description: spec.describe(TableStatus::Creating),
                items: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn wait_until_active(
        &self,
        table: &str,
        _timeout: Duration,
    ) -> Result<TableDescription, StoreError> {
        {
            let mut state = self.state.lock().await;
            let table = table_mut(&mut state, table)?;
            table.description.status = TableStatus::Active;
        }
        self.describe_table(table).await
    }
}
