//! The writer thread
//!
//! Drains the ring into the output binder. Flushes once per batch, when the
//! record marked end-of-batch has been written. Errors never leave this
//! thread: they are logged (rate-limited) and counted.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel;
use serde::Serialize;
use spool_ring::Consumer;

use crate::binder::OutputBinder;
use crate::error::{Result, WriterError};
use crate::metrics::{MetricsSnapshot, WriterMetrics};
use crate::rate_limited_logger::RateLimitedLogger;

/// Name of the writer thread
pub const THREAD_NAME: &str = "spool-writer";

/// Everything a record touches on its way to disk
struct RecordSink<R> {
    binder: OutputBinder<R>,
    metrics: Arc<WriterMetrics>,
    errors: RateLimitedLogger,
}

impl<R: Serialize> RecordSink<R> {
    fn handle(&mut self, record: R, end_of_batch: bool) {
        match self.binder.write(&record) {
            Ok(rolled) => {
                self.metrics.record_written();
                if let Some(archive) = rolled {
                    self.metrics.record_rollover();
                    tracing::debug!(archive = %archive.display(), "output file rolled");
                }
            }
            Err(e) if e.record_persisted() => {
                self.metrics.record_written();
                self.metrics.record_rollover_failure();
                self.errors.error("rollover failed", &e);
            }
            Err(e) => {
                self.metrics.record_write_error();
                self.errors.error("failed to write record", &e);
            }
        }

        if end_of_batch {
            self.flush();
        }
    }

    fn flush(&mut self) {
        match self.binder.flush() {
            Ok(()) => self.metrics.record_flush(),
            // Already counted per record
            Err(WriterError::NotBound | WriterError::Closed) => {}
            Err(e) => {
                self.metrics.record_flush_error();
                self.errors.error("flush failed", &e);
            }
        }
    }
}

/// Consumer side of the pipeline, run on its own thread
pub(crate) struct WriterThread<R> {
    consumer: Consumer<R>,
    sink: RecordSink<R>,
}

impl<R> WriterThread<R>
where
    R: Serialize + Send + 'static,
{
    pub(crate) fn new(
        consumer: Consumer<R>,
        binder: OutputBinder<R>,
        metrics: Arc<WriterMetrics>,
        error_log_interval: Duration,
    ) -> Self {
        Self {
            consumer,
            sink: RecordSink {
                binder,
                metrics,
                errors: RateLimitedLogger::new(error_log_interval),
            },
        }
    }

    /// Start the thread and wait until it has bound the live file
    ///
    /// A bind failure is returned here and the thread exits; otherwise the
    /// handle yields the final metrics once the ring is halted and drained.
    pub(crate) fn spawn(self) -> Result<JoinHandle<MetricsSnapshot>> {
        let (ready_tx, ready_rx) = channel::bounded::<Result<()>>(1);

        let handle = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || {
                let mut thread = self;
                match thread.sink.binder.bind() {
                    Ok(()) => {
                        let _ = ready_tx.send(Ok(()));
                        thread.run()
                    }
                    Err(e) => {
                        let snapshot = thread.sink.metrics.snapshot();
                        let _ = ready_tx.send(Err(e));
                        snapshot
                    }
                }
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(handle),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(WriterError::Io(std::io::Error::other(
                    "writer thread exited during startup",
                )))
            }
        }
    }

    fn run(mut self) -> MetricsSnapshot {
        let path = self.sink.binder.path().to_path_buf();
        tracing::info!(path = %path.display(), "writer thread started");

        let sink = &mut self.sink;
        while self
            .consumer
            .process_batch(|record, _, end_of_batch| sink.handle(record, end_of_batch))
            .is_ok()
        {}

        let drained = self
            .consumer
            .drain(|record, _, end_of_batch| sink.handle(record, end_of_batch));

        if let Err(e) = sink.binder.close() {
            sink.metrics.record_flush_error();
            sink.errors.error("failed to close output file", &e);
        }

        let snapshot = sink.metrics.snapshot();
        tracing::info!(
            path = %path.display(),
            drained,
            records_written = snapshot.records_written,
            write_errors = snapshot.write_errors,
            rollovers = snapshot.rollovers,
            rollover_failures = snapshot.rollover_failures,
            "writer thread stopped"
        );
        snapshot
    }
}
