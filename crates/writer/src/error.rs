//! Writer error types

use std::io;
use std::path::PathBuf;

use spool_container::CodecError;
use spool_rolling::RollingError;
use thiserror::Error;

/// Result type for writer operations
pub type Result<T> = std::result::Result<T, WriterError>;

/// Configuration errors, raised before anything is started
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Configuration is not valid TOML (or a value has the wrong shape)
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Required field is missing
    #[error("missing required field '{field}'")]
    MissingField { field: &'static str },

    /// Field has an invalid value
    #[error("invalid value for '{field}': {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },
}

impl ConfigError {
    /// Create a MissingField error
    pub fn missing_field(field: &'static str) -> Self {
        Self::MissingField { field }
    }

    /// Create an InvalidValue error
    pub fn invalid_value(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            message: message.into(),
        }
    }
}

/// Errors raised by the writer pipeline
///
/// Only `Config`, `Init` and `Io` ever reach the caller of `start`; the
/// others are handled on the writer thread and surface as metrics and logs.
#[derive(Debug, Error)]
pub enum WriterError {
    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The live file could not be opened, created or inspected
    #[error("failed to open output file '{}': {source}", path.display())]
    Init {
        path: PathBuf,
        #[source]
        source: CodecError,
    },

    /// A rollover failed; the previous file stays bound
    #[error("rollover of '{}' failed: {source}", path.display())]
    Rollover {
        path: PathBuf,
        archive_path: Option<PathBuf>,
        #[source]
        source: RollingError,
    },

    /// The rolling policy could not decide
    #[error("rolling policy failed: {0}")]
    Policy(#[source] RollingError),

    /// Pending records could not be written out
    #[error("flush failed: {0}")]
    Flush(#[source] CodecError),

    /// A single record could not be appended
    #[error("append failed: {0}")]
    Append(#[source] CodecError),

    /// No file is bound (never bound, or re-binding after a roll failed)
    #[error("no output file bound")]
    NotBound,

    /// The binder has been closed
    #[error("writer is closed")]
    Closed,

    /// Thread or filesystem failure outside the container codec
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl WriterError {
    /// Create a Rollover error from a failed policy roll
    pub fn rollover(path: impl Into<PathBuf>, source: RollingError) -> Self {
        Self::Rollover {
            path: path.into(),
            archive_path: source.archive_path().map(PathBuf::from),
            source,
        }
    }

    /// Whether the record being written made it into a file
    ///
    /// Rollover and policy failures happen after the append succeeded.
    pub fn record_persisted(&self) -> bool {
        matches!(
            self,
            Self::Rollover { .. } | Self::Policy(_) | Self::Init { .. }
        )
    }
}
