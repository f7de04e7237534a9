use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

#[derive(Debug, Default)]
struct InnerMetrics {
    pages_fetched: AtomicU64,
    records_fetched: AtomicU64,
    fetch_retries: AtomicU64,
    sink_retries: AtomicU64,
    rows_written: AtomicU64,
}

/// Shared counters for a sync run. Cloning shares the same counters.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<InnerMetrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub pages_fetched: u64,
    pub records_fetched: u64,
    pub fetch_retries: u64,
    pub sink_retries: u64,
    pub rows_written: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Metrics {
            inner: Arc::new(InnerMetrics::default()),
        }
    }

    pub fn increment_pages(&self, count: u64) {
        self.inner.pages_fetched.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_records(&self, count: u64) {
        self.inner
            .records_fetched
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_fetch_retries(&self, count: u64) {
        self.inner.fetch_retries.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_sink_retries(&self, count: u64) {
        self.inner.sink_retries.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_rows_written(&self, count: u64) {
        self.inner.rows_written.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            pages_fetched: self.inner.pages_fetched.load(Ordering::Relaxed),
            records_fetched: self.inner.records_fetched.load(Ordering::Relaxed),
            fetch_retries: self.inner.fetch_retries.load(Ordering::Relaxed),
            sink_retries: self.inner.sink_retries.load(Ordering::Relaxed),
            rows_written: self.inner.rows_written.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
