//! Spool - Writer
//!
//! Persists a stream of records from any number of threads into a rotating
//! container file.
//!
//! # Architecture
//!
//! ```text
//! Publisher(s) ──▶ ring buffer ──▶ writer thread ──▶ OutputBinder ──▶ live file
//!                                                        │
//!                                                        └─ RollingPolicy ──▶ archives
//! ```
//!
//! - Publishers only block while the ring is full
//! - All disk I/O (append, flush, rename, schema reads) happens on the one
//!   writer thread, which also owns the rolling policy
//! - The live file is flushed at the end of every batch the writer thread
//!   takes out of the ring
//! - Writer errors are logged and counted, never returned to publishers
//!
//! # Example
//!
//! ```ignore
//! use spool_writer::WriterConfig;
//!
//! let config: WriterConfig = std::fs::read_to_string("spool.toml")?.parse()?;
//! let mut publisher = spool_writer::start::<serde_json::Value>(&config)?;
//!
//! publisher.publish(serde_json::json!({"id": 1}));
//! let metrics = publisher.close();
//! ```

mod binder;
mod config;
mod error;
mod metrics;
mod publisher;
mod rate_limited_logger;
mod worker;

pub use binder::OutputBinder;
pub use config::WriterConfig;
pub use error::{ConfigError, Result, WriterError};
pub use metrics::{MetricsSnapshot, WriterMetrics, WriterMetricsHandle};
pub use publisher::Publisher;
pub use rate_limited_logger::RateLimitedLogger;
pub use worker::THREAD_NAME;

use std::sync::Arc;

use serde::Serialize;
use spool_rolling::{RollingPolicy, TimeAndSizeRollingPolicy};

use worker::WriterThread;

/// Start a writer with the default time-and-size rolling policy
pub fn start<R>(config: &WriterConfig) -> Result<Publisher<R>>
where
    R: Serialize + Send + 'static,
{
    start_with_policy(config, TimeAndSizeRollingPolicy::new(&config.rolling))
}

/// Start a writer that rolls according to `policy`
///
/// Validates `config`, binds the live file on the writer thread and returns
/// once the file is open. Binding failures (unreadable header, rename of a
/// file with a different schema) are returned here.
pub fn start_with_policy<R, P>(config: &WriterConfig, policy: P) -> Result<Publisher<R>>
where
    R: Serialize + Send + 'static,
    P: RollingPolicy<R> + 'static,
{
    config.validate()?;
    let schema = config.resolve_schema()?;

    let (producer, consumer) = spool_ring::channel(
        config.ring_buffer_size,
        config.producer_type,
        config.build_wait_strategy(),
    )
    .map_err(|e| ConfigError::invalid_value("ring_buffer_size", e.to_string()))?;

    let metrics = Arc::new(WriterMetrics::new());
    let halter = consumer.halter();
    let binder = OutputBinder::new(
        config.path.clone(),
        schema,
        config.writer_options(),
        Box::new(policy),
    );

    let writer_thread = WriterThread::new(
        consumer,
        binder,
        Arc::clone(&metrics),
        config.error_log_interval(),
    )
    .spawn()?;

    tracing::info!(
        path = %config.path.display(),
        ring_buffer_size = config.ring_buffer_size,
        producer_type = %config.producer_type,
        wait_strategy = %config.wait_strategy,
        "spool writer started"
    );

    Ok(Publisher::new(
        producer,
        halter,
        writer_thread,
        metrics,
        config.path.clone(),
    ))
}
