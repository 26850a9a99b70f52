//! Spool - Rolling
//!
//! Decides when the live output file is rolled over and performs the roll.
//!
//! Two conditions are combined:
//!
//! - **Time**: the file is rolled once per UTC day, at the first record
//!   after midnight; the rolling index resets to 0
//! - **Size**: the file is rolled when it reaches the configured size. The
//!   size is predicted from a per-record byte rate so the disk is only asked
//!   for the real size a few dozen times per file
//!
//! Rolled files are renamed in place to `<stem>-<yyyy-MM-dd>.<index>.log`.
//!
//! # Example
//!
//! ```ignore
//! use spool_rolling::{RollingConfig, RollingPolicy, TimeAndSizeRollingPolicy};
//!
//! let mut policy = TimeAndSizeRollingPolicy::new(&RollingConfig::default());
//! RollingPolicy::<Record>::register_path(&mut policy, "/var/spool/events.spl".as_ref());
//!
//! if policy.should_rollover(&record)? {
//!     let archive = RollingPolicy::<Record>::rollover(&mut policy)?;
//! }
//! ```

mod clock;
mod config;
mod error;
mod policy;
mod size;
mod time;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ONE_MB, RollingConfig, SizeTuning};
pub use error::{Result, RollingError};
pub use policy::{TimeAndSizeRollingPolicy, archive_path, archive_pattern};
pub use size::{SizeBasedCondition, SizeEstimator, SizeSource, SteadyState, WarmUp};
pub use time::TimeBasedCondition;

use std::path::{Path, PathBuf};

/// Pluggable rollover strategy for the live output file
///
/// A policy is owned by the writer thread and never called concurrently.
/// `R` is the record type, available to policies that roll on content.
pub trait RollingPolicy<R>: Send {
    /// Bind the policy to the live file and (re)initialize its state
    fn register_path(&mut self, path: &Path);

    /// Whether the live file should be rolled after `record` was written
    fn should_rollover(&mut self, record: &R) -> Result<bool>;

    /// Rename the live file to its archive name and return that name
    ///
    /// On error the live file and the policy state are left unchanged.
    fn rollover(&mut self) -> Result<PathBuf>;

    /// Index the next archive will carry
    fn rolling_index(&self) -> u32;
}

impl<R, P: RollingPolicy<R> + ?Sized> RollingPolicy<R> for Box<P> {
    fn register_path(&mut self, path: &Path) {
        (**self).register_path(path)
    }

    fn should_rollover(&mut self, record: &R) -> Result<bool> {
        (**self).should_rollover(record)
    }

    fn rollover(&mut self) -> Result<PathBuf> {
        (**self).rollover()
    }

    fn rolling_index(&self) -> u32 {
        (**self).rolling_index()
    }
}
