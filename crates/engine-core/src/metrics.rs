use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

#[derive(Debug, Default)]
struct InnerMetrics {
    records_scanned: AtomicU64,
    records_written: AtomicU64,
    records_deleted: AtomicU64,
    pages_scanned: AtomicU64,
    batches_written: AtomicU64,
    retry_count: AtomicU64,
    warning_count: AtomicU64,
}

/// Counters shared between the engine and its writers for one invocation.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<InnerMetrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub records_scanned: u64,
    pub records_written: u64,
    pub records_deleted: u64,
    pub pages_scanned: u64,
    pub batches_written: u64,
    pub retry_count: u64,
    pub warning_count: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Metrics {
            inner: Arc::new(InnerMetrics::default()),
        }
    }

    pub fn increment_scanned(&self, count: u64) {
        self.inner.records_scanned.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_written(&self, count: u64) {
        self.inner.records_written.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_deleted(&self, count: u64) {
        self.inner.records_deleted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_pages(&self, count: u64) {
        self.inner.pages_scanned.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_batches(&self, count: u64) {
        self.inner.batches_written.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_retries(&self, count: u64) {
        self.inner.retry_count.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_warnings(&self, count: u64) {
        self.inner.warning_count.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_scanned: self.inner.records_scanned.load(Ordering::Relaxed),
            records_written: self.inner.records_written.load(Ordering::Relaxed),
            records_deleted: self.inner.records_deleted.load(Ordering::Relaxed),
            pages_scanned: self.inner.pages_scanned.load(Ordering::Relaxed),
            batches_written: self.inner.batches_written.load(Ordering::Relaxed),
            retry_count: self.inner.retry_count.load(Ordering::Relaxed),
            warning_count: self.inner.warning_count.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
