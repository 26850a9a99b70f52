//! Time-and-size rolling policy
//!
//! Archive names are `<dir>/<stem>-<yyyy-MM-dd>.<index>.log` where `stem` is
//! the live file name minus its last extension and the date is UTC. A
//! time-triggered roll archives under yesterday's date and resets the index
//! to 0; a size-triggered roll archives under today's date and bumps it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Days, Utc};
use regex::Regex;

use crate::RollingPolicy;
use crate::clock::{Clock, SystemClock};
use crate::config::RollingConfig;
use crate::error::{Result, RollingError};
use crate::size::{SizeBasedCondition, SizeSource};
use crate::time::TimeBasedCondition;

/// Date format of archive names
const ARCHIVE_DATE_FORMAT: &str = "%Y-%m-%d";

/// Default policy: roll daily at UTC midnight and whenever the size threshold
/// is reached
#[derive(Debug)]
pub struct TimeAndSizeRollingPolicy {
    clock: Arc<dyn Clock>,
    time: TimeBasedCondition,
    size: SizeBasedCondition,
    path: Option<PathBuf>,
    rolling_index: u32,
}

impl TimeAndSizeRollingPolicy {
    pub fn new(config: &RollingConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &RollingConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            time: TimeBasedCondition::new(Arc::clone(&clock)),
            size: SizeBasedCondition::new(config.threshold_bytes(), config.tuning),
            clock,
            path: None,
            rolling_index: 0,
        }
    }

    /// Read file sizes through `source` instead of the filesystem
    pub fn with_size_source(mut self, source: SizeSource) -> Self {
        self.size = self.size.with_size_source(source);
        self
    }

    pub fn time_condition(&self) -> &TimeBasedCondition {
        &self.time
    }

    pub fn size_condition(&self) -> &SizeBasedCondition {
        &self.size
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Name the live file would be archived under right now
    pub fn next_archive_path(&self) -> Result<PathBuf> {
        let path = self.path.as_deref().ok_or(RollingError::NotRegistered)?;
        Ok(self.archive_path_for(path, self.time.should_rollover()))
    }

    fn archive_path_for(&self, path: &Path, time_triggered: bool) -> PathBuf {
        let now = self.clock.now();
        let date = if time_triggered {
            now.checked_sub_days(Days::new(1)).unwrap_or(now)
        } else {
            now
        };
        archive_path(path, date, self.rolling_index)
    }
}

impl<R> RollingPolicy<R> for TimeAndSizeRollingPolicy {
    fn register_path(&mut self, path: &Path) {
        self.path = Some(path.to_path_buf());
        self.size.register_path(path);

        self.rolling_index = match highest_archived_index(path) {
            Ok(Some(highest)) => highest.saturating_add(1),
            Ok(None) => 0,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "could not scan for archived files, starting at index 0"
                );
                0
            }
        };

        tracing::info!(
            path = %path.display(),
            rolling_index = self.rolling_index,
            threshold = self.size.threshold(),
            "rolling policy registered"
        );
    }

    fn should_rollover(&mut self, _record: &R) -> Result<bool> {
        Ok(self.size.should_rollover()? || self.time.should_rollover())
    }

    fn rollover(&mut self) -> Result<PathBuf> {
        let path = self.path.clone().ok_or(RollingError::NotRegistered)?;

        // Decided before any state changes so the name and the index agree
        let time_triggered = self.time.should_rollover();
        let archive = self.archive_path_for(&path, time_triggered);

        fs::rename(&path, &archive).map_err(|source| RollingError::Rename {
            archive_path: archive.clone(),
            source,
        })?;

        self.time.signal_rollover();
        self.size.signal_rollover();
        self.rolling_index = if time_triggered {
            0
        } else {
            self.rolling_index.saturating_add(1)
        };

        tracing::info!(
            path = %path.display(),
            archive = %archive.display(),
            trigger = if time_triggered { "time" } else { "size" },
            next_index = self.rolling_index,
            "rolled over output file"
        );
        Ok(archive)
    }

    fn rolling_index(&self) -> u32 {
        self.rolling_index
    }
}

/// Archive name for `path` on `date` with `index`
pub fn archive_path(path: &Path, date: DateTime<Utc>, index: u32) -> PathBuf {
    let name = format!(
        "{}-{}.{}.log",
        file_stem(path),
        date.format(ARCHIVE_DATE_FORMAT),
        index
    );
    path.with_file_name(name)
}

/// Pattern matching archive names of `path`, capturing the index
pub fn archive_pattern(path: &Path) -> std::result::Result<Regex, regex::Error> {
    Regex::new(&format!(
        r"^{}-\d{{4}}-\d{{2}}-\d{{2}}\.(\d+)\.log$",
        regex::escape(&file_stem(path))
    ))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Highest index among the archives next to `path`
fn highest_archived_index(path: &Path) -> io::Result<Option<u32>> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let pattern = archive_pattern(path).map_err(io::Error::other)?;

    let mut highest = None;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if let Some(index) = pattern
            .captures(name)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
        {
            highest = highest.max(Some(index));
        }
    }
    Ok(highest)
}

#[cfg(test)]
#[path = "policy_test.rs"]
mod policy_test;
