//! Rolling configuration

use serde::{Deserialize, Serialize};

use crate::error::{Result, RollingError};

/// Bytes in one megabyte as used for `size_mb`
pub const ONE_MB: u64 = 1_048_576;

/// Default rollover size in megabytes
const DEFAULT_SIZE_MB: u64 = 50;

/// Configuration of the time-and-size rolling policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RollingConfig {
    /// Roll once the live file reaches this size (megabytes, at least 1)
    pub size_mb: u64,

    /// Size estimator knobs
    pub tuning: SizeTuning,
}

impl Default for RollingConfig {
    fn default() -> Self {
        Self {
            size_mb: DEFAULT_SIZE_MB,
            tuning: SizeTuning::default(),
        }
    }
}

impl RollingConfig {
    /// Set the rollover size in megabytes
    pub fn with_size_mb(mut self, size_mb: u64) -> Self {
        self.size_mb = size_mb;
        self
    }

    pub fn with_tuning(mut self, tuning: SizeTuning) -> Self {
        self.tuning = tuning;
        self
    }

    /// Rollover size in bytes
    pub fn threshold_bytes(&self) -> u64 {
        self.size_mb.saturating_mul(ONE_MB)
    }

    pub fn validate(&self) -> Result<()> {
        if self.size_mb == 0 {
            return Err(RollingError::invalid_config(
                "size_mb must be at least 1",
            ));
        }
        self.tuning.validate()
    }
}

/// Knobs of the size estimator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizeTuning {
    /// Warm-up reads the file size every this many records
    pub sampling_rate: u64,

    /// Growth below this many bytes is container overhead, not data
    pub header_epsilon: u64,

    /// Weight of the newest observed rate in the smoothed prediction
    pub decay: f64,

    /// A new prediction never drops below this fraction of the previous one
    pub floor: f64,

    /// Size checks aimed for between two rollovers
    pub checkpoints_per_roll: u64,
}

impl Default for SizeTuning {
    fn default() -> Self {
        Self {
            sampling_rate: 150,
            header_epsilon: 7000,
            decay: 0.2,
            floor: 0.7,
            checkpoints_per_roll: 32,
        }
    }
}

impl SizeTuning {
    pub fn validate(&self) -> Result<()> {
        if self.sampling_rate == 0 {
            return Err(RollingError::invalid_config(
                "tuning.sampling_rate must be at least 1",
            ));
        }
        if !(self.decay > 0.0 && self.decay <= 1.0) {
            return Err(RollingError::invalid_config(format!(
                "tuning.decay must be in (0, 1], got {}",
                self.decay
            )));
        }
        if !(self.floor > 0.0 && self.floor <= 1.0) {
            return Err(RollingError::invalid_config(format!(
                "tuning.floor must be in (0, 1], got {}",
                self.floor
            )));
        }
        if self.checkpoints_per_roll == 0 {
            return Err(RollingError::invalid_config(
                "tuning.checkpoints_per_roll must be at least 1",
            ));
        }
        Ok(())
    }
}
