use crate::core::attribute::Item;
use serde::{Deserialize, Serialize};

/// Hard ceiling of the store's batch-write API.
pub const MAX_BATCH_SIZE: usize = 25;

/// A single operation inside a batch write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteRequest {
    #[serde(rename = "PutRequest")]
    Put { item: Item },
    #[serde(rename = "DeleteRequest")]
    Delete { key: Item },
}

impl WriteRequest {
    pub fn put(item: Item) -> Self {
        WriteRequest::Put { item }
    }

    pub fn delete(key: Item) -> Self {
        WriteRequest::Delete { key }
    }

    pub fn is_put(&self) -> bool {
        matches!(self, WriteRequest::Put { .. })
    }
}

/// Operations submitted together, at most [`MAX_BATCH_SIZE`] of them.
#[derive(Debug, Clone)]
pub struct Batch {
    pub id: String,
    pub requests: Vec<WriteRequest>,
    pub ts: chrono::DateTime<chrono::Utc>,
}

impl Batch {
    pub fn new(id: impl Into<String>, requests: Vec<WriteRequest>) -> Self {
        Self {
            id: id.into(),
            requests,
            ts: chrono::Utc::now(),
        }
    }

    /// Splits `requests` into consecutive batches of at most `size`
    /// operations, preserving order.
    pub fn chunked(prefix: &str, requests: Vec<WriteRequest>, size: usize) -> Vec<Batch> {
        let size = size.clamp(1, MAX_BATCH_SIZE);
        let mut batches = Vec::with_capacity(requests.len().div_ceil(size));
        let mut iter = requests.into_iter().peekable();
        let mut seq = 0usize;
        while iter.peek().is_some() {
            let chunk: Vec<_> = iter.by_ref().take(size).collect();
            batches.push(Batch::new(format!("{prefix}-{seq}"), chunk));
            seq += 1;
        }
        batches
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}
