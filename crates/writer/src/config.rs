//! Writer configuration
//!
//! # Example
//!
//! ```toml
//! path = "/var/spool/clicks.spl"
//! schema = '{"name": "click", "fields": [{"name": "id", "type": "long"}]}'
//! ring_buffer_size = 4096
//! producer_type = "multi"
//! wait_strategy = "sleeping"
//!
//! [rolling]
//! size_mb = 128
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use spool_container::{DEFAULT_SYNC_INTERVAL, MAX_SYNC_INTERVAL, Schema, WriterOptions};
use spool_ring::{ProducerType, WaitStrategy, WaitStrategyKind};
use spool_rolling::RollingConfig;

use crate::error::ConfigError;

/// Default ring buffer size (slots)
const DEFAULT_RING_BUFFER_SIZE: usize = 2048;

/// Default sleep of the sleeping wait strategy (microseconds)
const DEFAULT_SLEEP_QUANTUM_US: u64 = 100;

/// Default interval between writer-thread error logs (seconds)
const DEFAULT_ERROR_LOG_INTERVAL_SECS: u64 = 10;

/// Configuration of one writer pipeline
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Live output file
    /// Required
    pub path: PathBuf,

    /// Record schema as inline JSON
    /// Exactly one of `schema` and `schema_file` is required
    #[serde(deserialize_with = "schema_from_json")]
    pub schema: Option<Schema>,

    /// File holding the record schema JSON
    pub schema_file: Option<PathBuf>,

    /// Ring buffer slots, a power of two
    /// Default: 2048
    pub ring_buffer_size: usize,

    /// Whether one or many threads publish
    /// Default: multi
    pub producer_type: ProducerType,

    /// How the writer thread idles while the ring is empty
    /// Default: sleeping
    pub wait_strategy: WaitStrategyKind,

    /// Sleep quantum of the sleeping wait strategy (microseconds)
    /// Default: 100
    pub sleep_quantum_us: u64,

    /// Rollover settings
    pub rolling: RollingConfig,

    /// Block size after which records are written out without a flush
    /// Default: 2MB, at most 1GB
    pub sync_interval_bytes: usize,

    /// Call `sync_data` after every flush
    /// Default: false
    pub sync_on_flush: bool,

    /// Minimum interval between writer-thread error logs (seconds)
    /// Default: 10
    pub error_log_interval_secs: u64,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            schema: None,
            schema_file: None,
            ring_buffer_size: DEFAULT_RING_BUFFER_SIZE,
            producer_type: ProducerType::Multi,
            wait_strategy: WaitStrategyKind::Sleeping,
            sleep_quantum_us: DEFAULT_SLEEP_QUANTUM_US,
            rolling: RollingConfig::default(),
            sync_interval_bytes: DEFAULT_SYNC_INTERVAL,
            sync_on_flush: false,
            error_log_interval_secs: DEFAULT_ERROR_LOG_INTERVAL_SECS,
        }
    }
}

impl WriterConfig {
    /// Configuration writing `schema` records to `path`, defaults elsewhere
    pub fn new(path: impl Into<PathBuf>, schema: Schema) -> Self {
        Self {
            path: path.into(),
            schema: Some(schema),
            ..Self::default()
        }
    }

    /// Load and validate a TOML configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_str(&contents)
    }

    pub fn with_ring_buffer_size(mut self, size: usize) -> Self {
        self.ring_buffer_size = size;
        self
    }

    pub fn with_producer_type(mut self, producer_type: ProducerType) -> Self {
        self.producer_type = producer_type;
        self
    }

    pub fn with_wait_strategy(mut self, kind: WaitStrategyKind) -> Self {
        self.wait_strategy = kind;
        self
    }

    pub fn with_rolling(mut self, rolling: RollingConfig) -> Self {
        self.rolling = rolling;
        self
    }

    pub fn with_sync_interval_bytes(mut self, bytes: usize) -> Self {
        self.sync_interval_bytes = bytes;
        self
    }

    pub fn with_sync_on_flush(mut self, sync: bool) -> Self {
        self.sync_on_flush = sync;
        self
    }

    pub fn with_error_log_interval_secs(mut self, secs: u64) -> Self {
        self.error_log_interval_secs = secs;
        self
    }

    /// Check every field; nothing is started on error
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_path()?;
        self.resolve_schema()?;

        if self.ring_buffer_size == 0 || !self.ring_buffer_size.is_power_of_two() {
            return Err(ConfigError::invalid_value(
                "ring_buffer_size",
                format!("{} is not a power of two", self.ring_buffer_size),
            ));
        }

        if self.wait_strategy == WaitStrategyKind::Sleeping && self.sleep_quantum_us == 0 {
            return Err(ConfigError::invalid_value(
                "sleep_quantum_us",
                "must be greater than 0 for the sleeping wait strategy",
            ));
        }

        if self.sync_interval_bytes == 0 {
            return Err(ConfigError::invalid_value(
                "sync_interval_bytes",
                "must be greater than 0",
            ));
        }
        if self.sync_interval_bytes > MAX_SYNC_INTERVAL {
            return Err(ConfigError::invalid_value(
                "sync_interval_bytes",
                format!("must be at most {}", MAX_SYNC_INTERVAL),
            ));
        }

        self.rolling
            .validate()
            .map_err(|e| ConfigError::invalid_value("rolling", e.to_string()))
    }

    fn validate_path(&self) -> Result<(), ConfigError> {
        if self.path.as_os_str().is_empty() {
            return Err(ConfigError::missing_field("path"));
        }
        if self.path.is_dir() {
            return Err(ConfigError::invalid_value(
                "path",
                format!("'{}' is a directory", self.path.display()),
            ));
        }
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() && !parent.is_dir() => {
                Err(ConfigError::invalid_value(
                    "path",
                    format!("directory '{}' does not exist", parent.display()),
                ))
            }
            _ => Ok(()),
        }
    }

    /// The record schema, from `schema` or loaded from `schema_file`
    pub fn resolve_schema(&self) -> Result<Schema, ConfigError> {
        match (&self.schema, &self.schema_file) {
            (Some(_), Some(_)) => Err(ConfigError::invalid_value(
                "schema",
                "set either schema or schema_file, not both",
            )),
            (Some(schema), None) => Ok(schema.clone()),
            (None, Some(file)) => Schema::load(file).map_err(|e| {
                ConfigError::invalid_value("schema_file", format!("{}: {e}", file.display()))
            }),
            (None, None) => Err(ConfigError::missing_field("schema")),
        }
    }

    pub fn sleep_quantum(&self) -> Duration {
        Duration::from_micros(self.sleep_quantum_us)
    }

    pub fn error_log_interval(&self) -> Duration {
        Duration::from_secs(self.error_log_interval_secs)
    }

    /// Wait strategy the writer thread idles with
    pub fn build_wait_strategy(&self) -> Box<dyn WaitStrategy> {
        self.wait_strategy.build(self.sleep_quantum())
    }

    /// Options for the container files
    pub fn writer_options(&self) -> WriterOptions {
        let options = WriterOptions::default().with_sync_interval(self.sync_interval_bytes);
        if self.sync_on_flush {
            options.with_sync_on_flush()
        } else {
            options
        }
    }
}

impl FromStr for WriterConfig {
    type Err = ConfigError;

    /// Parse and validate a TOML configuration
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config: WriterConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}

fn schema_from_json<'de, D>(deserializer: D) -> Result<Option<Schema>, D::Error>
where
    D: Deserializer<'de>,
{
    let json = Option::<String>::deserialize(deserializer)?;
    json.map(|json| Schema::parse(&json).map_err(serde::de::Error::custom))
        .transpose()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
