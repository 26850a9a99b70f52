//! Spool - Container
//!
//! Self-describing, block-oriented binary container for record files.
//! Every file embeds the record schema in its header, so a file can always
//! be read back (or appended to) without out-of-band metadata.
//!
//! # File Format
//!
//! ```text
//! header : "SPOOL\x01" | u32 schema length | schema JSON | 16-byte sync marker
//! block  : u32 record count | u32 payload length | payload | sync marker
//! payload: (u32 record length | record JSON)*
//! ```
//!
//! All integers are big-endian. The sync marker is random per file and is
//! repeated after every block, so a reader can detect torn or foreign data.
//!
//! # Example
//!
//! ```ignore
//! use spool_container::{ContainerReader, ContainerWriter, Schema, WriterOptions};
//!
//! let schema = Schema::parse(r#"{"name": "click", "fields": [{"name": "id", "type": "long"}]}"#)?;
//! let mut writer = ContainerWriter::create("clicks.spl", &schema, WriterOptions::default())?;
//! writer.append(&serde_json::json!({"id": 1}))?;
//! writer.close()?;
//!
//! let reader = ContainerReader::open("clicks.spl")?;
//! for record in reader.records() {
//!     println!("{}", record?);
//! }
//! ```

mod error;
mod reader;
mod schema;
mod writer;

pub use error::{CodecError, Result};
pub use reader::{ContainerReader, RecordIter, read_schema};
pub use schema::{Field, FieldType, Schema};
pub use writer::{
    ContainerWriter, DEFAULT_SYNC_INTERVAL, MAX_RECORD_SIZE, MAX_SYNC_INTERVAL, WriterOptions,
};

/// Magic bytes at the start of every container file
pub const MAGIC: [u8; 6] = *b"SPOOL\x01";

/// Size of the per-file sync marker in bytes
pub const MARKER_SIZE: usize = 16;

/// Sync marker written after the header and after every block
pub type SyncMarker = [u8; MARKER_SIZE];

#[cfg(test)]
#[path = "container_test.rs"]
mod container_test;
