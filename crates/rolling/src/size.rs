//! Size-based rollover condition
//!
//! Reading the file size costs a syscall, so the condition predicts where the
//! size threshold will be hit and only looks at the disk at checkpoints.
//!
//! # Phases
//!
//! - **Warm-up**: no rate known yet. The size is read every `sampling_rate`
//!   records until the file has grown past the container overhead; that
//!   growth divided by the records seen gives the first bytes-per-record rate.
//! - **Steady state**: checkpoints are spaced `threshold / checkpoints_per_roll`
//!   bytes apart. Between checkpoints only a record counter moves. At each
//!   checkpoint the real size is read once, the rate is re-estimated, and the
//!   error of the previous prediction is carried into the next distance.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::SizeTuning;
use crate::error::{Result, RollingError};

/// Reads the current size of a file
pub type SizeSource = Box<dyn Fn(&Path) -> io::Result<u64> + Send>;

fn file_size(path: &Path) -> io::Result<u64> {
    fs::metadata(path).map(|meta| meta.len())
}

/// Estimator phase, switched from `WarmUp` to `SteadyState` exactly once per
/// registration
#[derive(Debug, Clone, PartialEq)]
pub enum SizeEstimator {
    WarmUp(WarmUp),
    SteadyState(SteadyState),
}

/// Warm-up state
#[derive(Debug, Clone, PartialEq)]
pub struct WarmUp {
    /// File size at registration (0 if the file did not exist)
    pub initial_size: u64,
    pub records: u64,
}

/// Steady-state state
#[derive(Debug, Clone, PartialEq)]
pub struct SteadyState {
    /// Smoothed bytes-per-record prediction
    pub predicted_rate: f64,

    /// Rate measured at the previous checkpoint
    pub previous_rate: f64,

    /// Size read at the previous checkpoint
    pub previous_size: u64,

    /// Records since the previous checkpoint
    pub records: u64,

    /// Bytes expected until the next checkpoint
    pub distance: i64,
}

/// Rollover condition on the live file's size
pub struct SizeBasedCondition {
    threshold: u64,
    tuning: SizeTuning,
    target_distance: i64,
    epsilon: u64,

    path: Option<PathBuf>,
    estimator: SizeEstimator,
    size_source: SizeSource,
    size_reads: u64,
}

impl SizeBasedCondition {
    /// Condition that fires at `threshold` bytes
    pub fn new(threshold: u64, tuning: SizeTuning) -> Self {
        let target_distance = (threshold / tuning.checkpoints_per_roll.max(1)).max(1) as i64;
        Self {
            threshold,
            tuning,
            target_distance,
            epsilon: target_distance as u64 / 2,
            path: None,
            estimator: SizeEstimator::WarmUp(WarmUp {
                initial_size: 0,
                records: 0,
            }),
            size_source: Box::new(file_size),
            size_reads: 0,
        }
    }

    /// Read sizes through `source` instead of the filesystem
    pub fn with_size_source(mut self, source: SizeSource) -> Self {
        self.size_source = source;
        self
    }

    /// Bind to a file and restart in warm-up
    pub fn register_path(&mut self, path: &Path) {
        let initial_size = match (self.size_source)(path) {
            Ok(size) => size,
            Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not read initial file size, assuming empty");
                0
            }
        };

        self.path = Some(path.to_path_buf());
        self.estimator = SizeEstimator::WarmUp(WarmUp {
            initial_size,
            records: 0,
        });
    }

    /// Count one written record and decide whether the threshold is reached
    pub fn should_rollover(&mut self) -> Result<bool> {
        match &mut self.estimator {
            SizeEstimator::WarmUp(warm_up) => {
                warm_up.records += 1;
                if warm_up.records % self.tuning.sampling_rate != 0 {
                    return Ok(false);
                }
                let (initial_size, records) = (warm_up.initial_size, warm_up.records);

                let size = read_size(&self.size_source, self.path.as_deref(), &mut self.size_reads)?;
                let growth = size.saturating_sub(initial_size);
                if growth <= self.tuning.header_epsilon {
                    return Ok(false);
                }

                let rate = growth as f64 / records as f64;
                tracing::debug!(
                    size,
                    records,
                    rate,
                    "size estimator warmed up"
                );
                self.estimator = SizeEstimator::SteadyState(SteadyState {
                    predicted_rate: rate,
                    previous_rate: rate,
                    previous_size: size,
                    records: 0,
                    distance: self.target_distance,
                });
                Ok(size >= self.threshold)
            }
            SizeEstimator::SteadyState(state) => {
                state.records += 1;
                let reached = state.predicted_rate <= 0.0
                    || state.records as f64 * state.predicted_rate >= state.distance as f64;
                if !reached {
                    return Ok(false);
                }

                let size = read_size(&self.size_source, self.path.as_deref(), &mut self.size_reads)?;
                state.checkpoint(size, self.target_distance, &self.tuning);

                tracing::trace!(
                    size,
                    rate = state.predicted_rate,
                    distance = state.distance,
                    "size checkpoint"
                );
                Ok(size >= self.threshold.saturating_sub(self.epsilon))
            }
        }
    }

    /// A rollover happened; the live file starts over from empty
    pub fn signal_rollover(&mut self) {
        match &mut self.estimator {
            SizeEstimator::WarmUp(warm_up) => {
                warm_up.initial_size = 0;
                warm_up.records = 0;
            }
            SizeEstimator::SteadyState(state) => {
                state.previous_size = 0;
                state.records = 0;
                state.distance = self.target_distance;
            }
        }
    }

    pub fn estimator(&self) -> &SizeEstimator {
        &self.estimator
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Number of real size reads so far
    pub fn size_reads(&self) -> u64 {
        self.size_reads
    }
}

fn read_size(source: &SizeSource, path: Option<&Path>, reads: &mut u64) -> Result<u64> {
    let path = path.ok_or(RollingError::NotRegistered)?;
    *reads += 1;
    source(path).map_err(|source| RollingError::SizeProbe {
        path: path.to_path_buf(),
        source,
    })
}

impl SteadyState {
    fn checkpoint(&mut self, size: u64, target_distance: i64, tuning: &SizeTuning) {
        let growth = size as i64 - self.previous_size as i64;

        // No growth means the data is still buffered; keep the last rate
        let observed = if growth > 0 && self.records > 0 {
            growth as f64 / self.records as f64
        } else {
            self.previous_rate
        };

        let previous = self.predicted_rate;
        let blended = (1.0 - tuning.decay) * previous + tuning.decay * observed;
        self.predicted_rate = blended.max(tuning.floor * previous);

        self.distance = target_distance + (self.distance - growth);
        while self.distance < 0 {
            self.distance += target_distance;
        }

        self.previous_rate = observed;
        self.previous_size = size;
        self.records = 0;
    }
}

impl fmt::Debug for SizeBasedCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SizeBasedCondition")
            .field("threshold", &self.threshold)
            .field("path", &self.path)
            .field("estimator", &self.estimator)
            .field("size_reads", &self.size_reads)
            .finish()
    }
}

#[cfg(test)]
#[path = "size_test.rs"]
mod size_test;
