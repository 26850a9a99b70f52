//! Rolling policy errors

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type for rolling operations
pub type Result<T> = std::result::Result<T, RollingError>;

/// Errors raised while deciding on or performing a rollover
#[derive(Debug, Error)]
pub enum RollingError {
    /// The live file could not be renamed to its archive name
    #[error("failed to roll over to '{}': {source}", archive_path.display())]
    Rename {
        archive_path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The live file's size could not be read
    #[error("failed to read size of '{}': {source}", path.display())]
    SizeProbe {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The policy was used before `register_path`
    #[error("rolling policy has no registered path")]
    NotRegistered,

    /// Rolling configuration is out of range
    #[error("invalid rolling configuration: {0}")]
    InvalidConfig(String),
}

impl RollingError {
    /// Create an InvalidConfig error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Archive name a failed rename was aiming for
    pub fn archive_path(&self) -> Option<&Path> {
        match self {
            Self::Rename { archive_path, .. } => Some(archive_path),
            _ => None,
        }
    }
}
