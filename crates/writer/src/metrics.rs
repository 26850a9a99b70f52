//! Writer metrics
//!
//! Counters are shared between the publishers and the writer thread and
//! stay readable through a [`WriterMetricsHandle`] after the thread exits.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters of one writer pipeline
#[derive(Debug, Default)]
pub struct WriterMetrics {
    /// Records accepted into the ring
    pub records_published: AtomicU64,

    /// Publishes refused because the writer was closed
    pub records_rejected: AtomicU64,

    /// Records handed back by a halted ring
    pub records_dropped: AtomicU64,

    /// Records appended to a container file
    pub records_written: AtomicU64,

    /// Records that could not be appended
    pub write_errors: AtomicU64,

    pub flushes: AtomicU64,
    pub flush_errors: AtomicU64,

    /// Completed rollovers
    pub rollovers: AtomicU64,

    /// Rollovers that failed (records kept flowing into the old file)
    pub rollover_failures: AtomicU64,
}

impl WriterMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_published(&self) {
        self.records_published.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_rejected(&self) {
        self.records_rejected.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_dropped(&self) {
        self.records_dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_written(&self) {
        self.records_written.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_write_error(&self) {
        self.write_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flush(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flush_error(&self) {
        self.flush_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rollover(&self) {
        self.rollovers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rollover_failure(&self) {
        self.rollover_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of current metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_published: self.records_published.load(Ordering::Relaxed),
            records_rejected: self.records_rejected.load(Ordering::Relaxed),
            records_dropped: self.records_dropped.load(Ordering::Relaxed),
            records_written: self.records_written.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            flush_errors: self.flush_errors.load(Ordering::Relaxed),
            rollovers: self.rollovers.load(Ordering::Relaxed),
            rollover_failures: self.rollover_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`WriterMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub records_published: u64,
    pub records_rejected: u64,
    pub records_dropped: u64,
    pub records_written: u64,
    pub write_errors: u64,
    pub flushes: u64,
    pub flush_errors: u64,
    pub rollovers: u64,
    pub rollover_failures: u64,
}

/// Cloneable read-only view of a writer's metrics
#[derive(Debug, Clone)]
pub struct WriterMetricsHandle {
    metrics: Arc<WriterMetrics>,
}

impl WriterMetricsHandle {
    pub(crate) fn new(metrics: Arc<WriterMetrics>) -> Self {
        Self { metrics }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
