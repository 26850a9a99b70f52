//! Container codec error types

use std::io;
use thiserror::Error;

/// Result type for container operations
pub type Result<T> = std::result::Result<T, CodecError>;

/// Errors raised while reading or writing container files
#[derive(Debug, Error)]
pub enum CodecError {
    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Record or schema could not be (de)serialized
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Schema definition is malformed
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// File header carries a different schema than the caller expects
    #[error("schema mismatch: file has '{found}', expected '{expected}'")]
    SchemaMismatch {
        /// Full name of the expected schema
        expected: String,
        /// Full name of the schema embedded in the file
        found: String,
    },

    /// Record does not conform to the writer's schema
    #[error("record violates schema '{schema}': field '{field}' {reason}")]
    SchemaViolation {
        schema: String,
        field: String,
        reason: String,
    },

    /// File does not start with the container magic
    #[error("not a spool container (bad magic)")]
    BadMagic,

    /// Block framing is broken (torn write, foreign data, wrong marker)
    #[error("corrupt block at offset {offset}: {reason}")]
    CorruptBlock { offset: u64, reason: String },

    /// Encoded record exceeds what a length prefix may describe
    #[error("record of {size} bytes exceeds the {max} byte limit")]
    RecordTooLarge { size: usize, max: usize },

    /// A failed block write could not be cut off; the file ends mid-block
    #[error("output file holds a torn block after offset {offset}")]
    TornBlock { offset: u64 },
}

impl CodecError {
    /// Create an InvalidSchema error
    pub fn invalid_schema(msg: impl Into<String>) -> Self {
        Self::InvalidSchema(msg.into())
    }

    /// Create a SchemaViolation error
    pub fn violation(
        schema: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::SchemaViolation {
            schema: schema.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a CorruptBlock error
    pub fn corrupt(offset: u64, reason: impl Into<String>) -> Self {
        Self::CorruptBlock {
            offset,
            reason: reason.into(),
        }
    }
}
