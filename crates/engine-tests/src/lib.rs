#![allow(dead_code)]

use connectors::memory::MemoryStore;
use engine_core::{retry::RetryPolicy, state::sled_store::SledStateStore};
use engine_processing::state_manager::StateManager;
use engine_runtime::{JobService, MigrationEngine, UndoEngine};
use model::job::KeySchema;
use std::sync::Arc;
use tempfile::TempDir;

pub mod integration;
pub mod utils;

pub const SOURCE_TABLE: &str = "orders";
pub const TARGET_TABLE: &str = "orders_copy";

/// A memory store plus a sled state directory that lives as long as the
/// harness.
pub struct Harness {
    _dir: TempDir,
    pub store: Arc<MemoryStore>,
    pub state: StateManager,
    pub jobs: JobService,
}

impl Harness {
    /// Source table seeded with `rows` orders, scanned `page_size` at a time.
    /// The target table exists with the same key.
    pub async fn new(rows: usize, page_size: usize) -> Self {
        let harness = Self::without_target(rows, page_size).await;
        harness
            .store
            .add_table(TARGET_TABLE, KeySchema::new("order_id", None))
            .await;
        harness
    }

    pub async fn without_target(rows: usize, page_size: usize) -> Self {
        let dir = tempfile::tempdir().expect("create state dir");
        let sled = Arc::new(SledStateStore::open(dir.path()).expect("open sled state"));
        let state = StateManager::new(sled.clone(), sled);

        let store = Arc::new(MemoryStore::new().with_page_size(page_size));
        store
            .add_table(SOURCE_TABLE, KeySchema::new("order_id", None))
            .await;
        store
            .insert(SOURCE_TABLE, (0..rows).map(utils::order))
            .await
            .expect("seed source table");

        Self {
            _dir: dir,
            store,
            jobs: JobService::new(state.clone()),
            state,
        }
    }

    pub fn engine(&self) -> MigrationEngine {
        MigrationEngine::new(self.store.clone(), self.store.clone(), self.state.clone())
            .with_retry(RetryPolicy::immediate(4))
    }

    pub fn undo(&self) -> UndoEngine {
        UndoEngine::new(self.store.clone(), self.state.clone()).with_retry(RetryPolicy::immediate(4))
    }
}
