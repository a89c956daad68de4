use crate::{Harness, SOURCE_TABLE, TARGET_TABLE};
use model::{
    core::attribute::{AttributeValue, Item},
    job::MigrationJob,
    transform::mapping::ColumnMappings,
};
use std::collections::BTreeSet;

/// Source row `id`: a zero-padded key, a customer, a total and a note.
pub fn order(id: usize) -> Item {
    let mut item = Item::new();
    item.insert("order_id".into(), AttributeValue::s(format!("o-{id:04}")));
    item.insert("customer".into(), AttributeValue::s(format!("cust{}", id % 7)));
    item.insert("total".into(), AttributeValue::n(id * 10));
    item.insert("note".into(), AttributeValue::s("internal"));
    item
}

pub fn key(id: usize) -> Item {
    let mut key = Item::new();
    key.insert("order_id".into(), AttributeValue::s(format!("o-{id:04}")));
    key
}

pub async fn passthrough_job(harness: &Harness) -> MigrationJob {
    harness
        .jobs
        .create(
            SOURCE_TABLE,
            TARGET_TABLE,
            ColumnMappings::passthrough(["note"]),
        )
        .await
        .expect("create job")
}

/// Keys present in `table`, in scan order.
pub async fn keys_in(harness: &Harness, table: &str) -> Vec<String> {
    harness
        .store
        .items(table)
        .await
        .iter()
        .filter_map(|item| item.get("order_id").and_then(|v| v.as_s()).map(String::from))
        .collect()
}

/// Asserts the ledger of `job_id` names every key once.
pub async fn assert_ledger_unique(harness: &Harness, job_id: &str, expected: usize) {
    let ledger = harness.jobs.ledger_for(job_id).await.expect("load ledger");
    let unique: BTreeSet<&Item> = ledger.iter().collect();
    assert_eq!(ledger.len(), expected, "ledger length");
    assert_eq!(unique.len(), expected, "ledger has duplicate keys");
}
