//! Producer facade
//!
//! A [`Publisher`] moves records into the ring; the writer thread does the
//! rest. Publishers never see writer errors. Shutdown is shared by all
//! clones: the first `close` stops intake, halts the ring and joins the
//! writer thread, and later calls return right away.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use parking_lot::Mutex;
use spool_ring::{Halter, Producer, RingError};

use crate::metrics::{MetricsSnapshot, WriterMetrics, WriterMetricsHandle};

/// State shared by every clone of a publisher
struct Shutdown {
    accepting: AtomicBool,
    halter: Halter,
    writer_thread: Mutex<Option<JoinHandle<MetricsSnapshot>>>,
    metrics: Arc<WriterMetrics>,
    path: PathBuf,
}

impl Shutdown {
    fn close(&self) {
        self.accepting.store(false, Ordering::SeqCst);
        self.halter.halt();

        // Held across the join so concurrent closers wait for the drain
        let mut writer_thread = self.writer_thread.lock();
        if let Some(handle) = writer_thread.take()
            && handle.join().is_err()
        {
            tracing::error!(path = %self.path.display(), "writer thread panicked");
        }
    }
}

impl Drop for Shutdown {
    fn drop(&mut self) {
        self.close();
    }
}

/// Publishes records to a running writer
///
/// Cloneable through [`Publisher::try_clone`] when the ring was built for
/// multiple producers. The writer is shut down by [`Publisher::close`] or
/// when the last publisher is dropped.
pub struct Publisher<R> {
    producer: Producer<R>,
    shutdown: Arc<Shutdown>,
}

impl<R> Publisher<R> {
    pub(crate) fn new(
        producer: Producer<R>,
        halter: Halter,
        writer_thread: JoinHandle<MetricsSnapshot>,
        metrics: Arc<WriterMetrics>,
        path: PathBuf,
    ) -> Self {
        Self {
            producer,
            shutdown: Arc::new(Shutdown {
                accepting: AtomicBool::new(true),
                halter,
                writer_thread: Mutex::new(Some(writer_thread)),
                metrics,
                path,
            }),
        }
    }

    /// Hand a record to the writer, waiting only while the ring is full
    ///
    /// After `close` the record is discarded and counted as rejected.
    pub fn publish(&mut self, record: R) {
        let metrics = &self.shutdown.metrics;
        if !self.shutdown.accepting.load(Ordering::Acquire) {
            metrics.record_rejected();
            return;
        }
        match self.producer.publish(record) {
            Ok(()) => metrics.record_published(),
            // Raced with close; the ring gave the record back
            Err(_) => metrics.record_dropped(),
        }
    }

    /// Another publisher on the same writer (multi-producer rings only)
    pub fn try_clone(&self) -> Result<Self, RingError> {
        Ok(Self {
            producer: self.producer.try_clone()?,
            shutdown: Arc::clone(&self.shutdown),
        })
    }

    /// Stop accepting records, drain the ring and close the live file
    ///
    /// Idempotent; returns the metrics after the writer thread exited.
    pub fn close(&self) -> MetricsSnapshot {
        self.shutdown.close();
        self.shutdown.metrics.snapshot()
    }

    pub fn is_closed(&self) -> bool {
        !self.shutdown.accepting.load(Ordering::Acquire)
    }

    pub fn metrics(&self) -> WriterMetricsHandle {
        WriterMetricsHandle::new(Arc::clone(&self.shutdown.metrics))
    }

    /// Live output file
    pub fn path(&self) -> &Path {
        &self.shutdown.path
    }

    /// Free ring slots
    pub fn remaining_capacity(&self) -> usize {
        self.producer.remaining_capacity()
    }
}

impl<R> std::fmt::Debug for Publisher<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("path", &self.shutdown.path)
            .field("producer_type", &self.producer.producer_type())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
#[path = "publisher_test.rs"]
mod publisher_test;
