//! Rate-limited error logging for the writer thread
//!
//! A full disk fails every append and every flush. Logging each of those
//! would bury everything else, so errors are logged at most once per
//! interval together with the number suppressed since the last line.

use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Logs at most one error per interval and counts the rest
#[derive(Debug)]
pub struct RateLimitedLogger {
    min_interval: Duration,
    last_log_time: Mutex<Option<Instant>>,

    /// Errors since the last logged line
    error_count: AtomicU64,
    total_errors: AtomicU64,
}

impl RateLimitedLogger {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_log_time: Mutex::new(None),
            error_count: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
        }
    }

    /// Record an error and log it unless one was logged within the interval
    ///
    /// Returns whether this error was logged.
    pub fn error(&self, message: &str, error: &dyn Display) -> bool {
        self.error_count.fetch_add(1, Ordering::Relaxed);
        let total = self.total_errors.fetch_add(1, Ordering::Relaxed) + 1;

        if !self.due() {
            return false;
        }

        let count = self.error_count.swap(0, Ordering::Relaxed);
        if count > 1 {
            tracing::error!(
                error = %error,
                suppressed_count = count - 1,
                total_errors = total,
                "{message} (rate-limited)"
            );
        } else {
            tracing::error!(error = %error, total_errors = total, "{message}");
        }
        true
    }

    fn due(&self) -> bool {
        let mut last = self.last_log_time.lock();
        let now = Instant::now();
        match *last {
            Some(at) if now.duration_since(at) < self.min_interval => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }

    /// Errors recorded since the last logged line
    pub fn pending_error_count(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    pub fn total_error_count(&self) -> u64 {
        self.total_errors.load(Ordering::Relaxed)
    }
}
