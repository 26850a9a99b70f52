//! Container writer
//!
//! Records are serialized into an in-memory block and emitted as one framed
//! block when the block outgrows the sync interval or when the caller
//! flushes. Between flushes, the file on disk always ends on a block
//! boundary, which keeps it readable while it is still being written.
//!
//! A frame that fails part way is cut off again, so the next block lands on
//! the last good boundary instead of behind torn bytes.

use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bytes::{BufMut, BytesMut};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{CodecError, Result};
use crate::reader::read_header;
use crate::schema::Schema;
use crate::{MAGIC, SyncMarker};

/// Default block size before a block is emitted without an explicit flush (2MB)
pub const DEFAULT_SYNC_INTERVAL: usize = 2 * 1024 * 1024;

/// Largest accepted sync interval (1GB)
///
/// Keeps every block payload well inside its u32 length prefix.
pub const MAX_SYNC_INTERVAL: usize = 1024 * 1024 * 1024;

/// Largest encoded record (64MB)
pub const MAX_RECORD_SIZE: usize = 64 * 1024 * 1024;

/// Upper bound for a block payload: a block just under the interval plus one record
pub(crate) const MAX_BLOCK_SIZE: usize = MAX_SYNC_INTERVAL + 4 + MAX_RECORD_SIZE;

/// Options for opening a container writer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterOptions {
    /// Approximate block size in bytes; a full block is written out on append.
    /// Values above [`MAX_SYNC_INTERVAL`] are capped.
    pub sync_interval: usize,

    /// Call `sync_data` on every flush
    pub sync_on_flush: bool,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            sync_interval: DEFAULT_SYNC_INTERVAL,
            sync_on_flush: false,
        }
    }
}

impl WriterOptions {
    /// Set the sync interval
    pub fn with_sync_interval(mut self, bytes: usize) -> Self {
        self.sync_interval = bytes;
        self
    }

    /// Enable `sync_data` on flush
    pub fn with_sync_on_flush(mut self) -> Self {
        self.sync_on_flush = true;
        self
    }

    fn block_limit(&self) -> usize {
        self.sync_interval.min(MAX_SYNC_INTERVAL)
    }
}

/// Output a block frame can be written to and cut back from
pub(crate) trait BlockOutput: Write {
    /// Drop everything past `len` and continue writing there
    fn cut_to(&mut self, len: u64) -> io::Result<()>;
}

impl BlockOutput for File {
    fn cut_to(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)?;
        self.seek(SeekFrom::Start(len)).map(|_| ())
    }
}

/// Writer bound to a single container file
pub struct ContainerWriter {
    path: PathBuf,
    schema: Schema,
    file: File,
    marker: SyncMarker,
    options: WriterOptions,

    /// File length at the end of the last complete block
    good_len: u64,
    /// Set when a torn block could not be cut off
    poisoned: bool,

    /// Serialized records not yet written as a block
    block: BytesMut,
    block_records: u32,

    /// Bytes handed to the file by this writer (header included when created)
    bytes_written: u64,
    records_written: u64,
}

impl ContainerWriter {
    /// Create (or truncate) a container file and write its header
    ///
    /// The header is flushed immediately so the file is self-describing from
    /// the moment it exists.
    pub fn create(path: impl AsRef<Path>, schema: &Schema, options: WriterOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::options()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;

        let marker = *Uuid::new_v4().as_bytes();
        let schema_json = schema.to_json()?;

        let mut header = BytesMut::with_capacity(MAGIC.len() + 4 + schema_json.len() + marker.len());
        header.put_slice(&MAGIC);
        header.put_u32(schema_json.len() as u32);
        header.put_slice(&schema_json);
        header.put_slice(&marker);

        file.write_all(&header)?;
        let header_len = header.len() as u64;

        tracing::debug!(path = %path.display(), schema = %schema.full_name(), "created container file");

        Ok(Self {
            path,
            schema: schema.clone(),
            file,
            marker,
            options,
            good_len: header_len,
            poisoned: false,
            block: BytesMut::with_capacity(options.block_limit().min(DEFAULT_SYNC_INTERVAL)),
            block_records: 0,
            bytes_written: header_len,
            records_written: 0,
        })
    }

    /// Open an existing container file for appending
    ///
    /// The embedded schema must equal `expected`; the file's own sync marker
    /// is reused for new blocks.
    pub fn append_to(
        path: impl AsRef<Path>,
        expected: &Schema,
        options: WriterOptions,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let (found, marker) = {
            let mut file = io::BufReader::new(File::open(&path)?);
            let (schema, marker, _) = read_header(&mut file)?;
            (schema, marker)
        };

        if &found != expected {
            return Err(CodecError::SchemaMismatch {
                expected: expected.full_name(),
                found: found.full_name(),
            });
        }

        let file = File::options().append(true).open(&path)?;
        let good_len = file.metadata()?.len();

        tracing::debug!(path = %path.display(), schema = %found.full_name(), "appending to container file");

        Ok(Self {
            path,
            schema: found,
            file,
            marker,
            options,
            good_len,
            poisoned: false,
            block: BytesMut::with_capacity(options.block_limit().min(DEFAULT_SYNC_INTERVAL)),
            block_records: 0,
            bytes_written: 0,
            records_written: 0,
        })
    }

    /// Append one record to the current block
    ///
    /// The record is validated against the schema before anything is
    /// buffered, so a rejected record leaves the block untouched.
    pub fn append<T: Serialize + ?Sized>(&mut self, record: &T) -> Result<()> {
        self.check_poisoned()?;

        let value = serde_json::to_value(record)?;
        self.schema.validate(&value)?;
        let encoded = serde_json::to_vec(&value)?;
        if encoded.len() > MAX_RECORD_SIZE {
            return Err(CodecError::RecordTooLarge {
                size: encoded.len(),
                max: MAX_RECORD_SIZE,
            });
        }

        self.block.put_u32(encoded.len() as u32);
        self.block.extend_from_slice(&encoded);
        self.block_records += 1;
        self.records_written += 1;

        if self.block.len() >= self.options.block_limit() {
            self.write_block()?;
        }
        Ok(())
    }

    /// Write the pending block and flush it to the operating system
    pub fn flush(&mut self) -> Result<()> {
        self.check_poisoned()?;
        self.write_block()?;
        self.file.flush()?;
        if self.options.sync_on_flush {
            self.file.sync_data()?;
        }
        Ok(())
    }

    /// Flush and close the file
    pub fn close(mut self) -> Result<()> {
        self.flush()?;
        tracing::debug!(
            path = %self.path.display(),
            records = self.records_written,
            bytes = self.bytes_written,
            "closed container file"
        );
        Ok(())
    }

    /// Path of the bound file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Schema records are validated against
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Bytes handed to the file by this writer
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Records appended through this writer
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Records buffered in the pending block
    pub fn pending_records(&self) -> u32 {
        self.block_records
    }

    /// True once a torn block was left in the file; every later call fails
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    fn check_poisoned(&self) -> Result<()> {
        if self.poisoned {
            return Err(CodecError::TornBlock {
                offset: self.good_len,
            });
        }
        Ok(())
    }

    fn write_block(&mut self) -> Result<()> {
        if self.block_records == 0 {
            return Ok(());
        }

        let frame = encode_frame(self.block_records, &self.block, &self.marker);

        // The block is discarded even if the frame write failed
        self.block.clear();
        self.block_records = 0;

        let result = emit_frame(&mut self.file, &frame, self.good_len);
        if matches!(result, Err(CodecError::TornBlock { .. })) {
            self.poisoned = true;
        }
        result?;

        self.good_len += frame.len() as u64;
        self.bytes_written += frame.len() as u64;
        Ok(())
    }
}

/// Frame a block payload: count, length, payload, sync marker
pub(crate) fn encode_frame(count: u32, payload: &[u8], marker: &SyncMarker) -> BytesMut {
    let mut frame = BytesMut::with_capacity(8 + payload.len() + marker.len());
    frame.put_u32(count);
    frame.put_u32(payload.len() as u32);
    frame.put_slice(payload);
    frame.put_slice(marker);
    frame
}

/// Write one frame; on failure cut the output back to `good_len`
pub(crate) fn emit_frame(out: &mut impl BlockOutput, frame: &[u8], good_len: u64) -> Result<()> {
    let Err(e) = out.write_all(frame) else {
        return Ok(());
    };

    match out.cut_to(good_len) {
        Ok(()) => Err(e.into()),
        Err(cut) => {
            tracing::error!(
                offset = good_len,
                error = %e,
                cut_error = %cut,
                "failed to cut off torn block"
            );
            Err(CodecError::TornBlock { offset: good_len })
        }
    }
}

impl std::fmt::Debug for ContainerWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerWriter")
            .field("path", &self.path)
            .field("schema", &self.schema.full_name())
            .field("pending_records", &self.block_records)
            .field("records_written", &self.records_written)
            .field("poisoned", &self.poisoned)
            .finish()
    }
}
