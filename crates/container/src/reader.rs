//! Container reader
//!
//! Sequential reader for container files. Reads the header once, then
//! yields records block by block, checking every block's sync marker.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use bytes::{Buf, Bytes};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{CodecError, Result};
use crate::schema::Schema;
use crate::writer::MAX_BLOCK_SIZE;
use crate::{MAGIC, MARKER_SIZE, SyncMarker};

/// Upper bound for an embedded schema (guards against reading garbage)
const MAX_SCHEMA_SIZE: usize = 1024 * 1024;

/// Read only the schema embedded in a container file's header
pub fn read_schema(path: impl AsRef<Path>) -> Result<Schema> {
    let mut reader = BufReader::new(File::open(path)?);
    let (schema, _, _) = read_header(&mut reader)?;
    Ok(schema)
}

/// Parse a container header, returning schema, sync marker and header length
pub(crate) fn read_header(reader: &mut impl Read) -> Result<(Schema, SyncMarker, u64)> {
    let mut magic = [0u8; MAGIC.len()];
    match reader.read_exact(&mut magic) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Err(CodecError::BadMagic),
        Err(e) => return Err(e.into()),
    }
    if magic != MAGIC {
        return Err(CodecError::BadMagic);
    }

    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes)?;
    let schema_len = u32::from_be_bytes(len_bytes) as usize;
    if schema_len == 0 || schema_len > MAX_SCHEMA_SIZE {
        return Err(CodecError::corrupt(
            MAGIC.len() as u64,
            format!("implausible schema length {}", schema_len),
        ));
    }

    let mut schema_bytes = vec![0u8; schema_len];
    reader.read_exact(&mut schema_bytes)?;
    let schema: Schema = serde_json::from_slice(&schema_bytes)?;

    let mut marker = [0u8; MARKER_SIZE];
    reader.read_exact(&mut marker)?;

    let header_len = (MAGIC.len() + 4 + schema_len + MARKER_SIZE) as u64;
    Ok((schema, marker, header_len))
}

/// Sequential reader over the records of one container file
pub struct ContainerReader<R = BufReader<File>> {
    reader: R,
    schema: Schema,
    marker: SyncMarker,

    /// Remaining payload of the current block
    block: Bytes,
    remaining_in_block: u32,

    /// Byte offset of the next unread block
    offset: u64,
    blocks_read: u64,
}

impl ContainerReader<BufReader<File>> {
    /// Open a container file for reading
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        Self::new(BufReader::with_capacity(32 * 1024, file))
    }
}

impl<R: Read> ContainerReader<R> {
    /// Wrap any reader positioned at the start of a container
    pub fn new(mut reader: R) -> Result<Self> {
        let (schema, marker, header_len) = read_header(&mut reader)?;
        Ok(Self {
            reader,
            schema,
            marker,
            block: Bytes::new(),
            remaining_in_block: 0,
            offset: header_len,
            blocks_read: 0,
        })
    }

    /// Schema embedded in the file header
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Number of complete blocks read so far
    pub fn blocks_read(&self) -> u64 {
        self.blocks_read
    }

    /// Read the next record
    ///
    /// Returns `None` at a clean end of file.
    pub fn next_record(&mut self) -> Result<Option<Value>> {
        while self.remaining_in_block == 0 {
            if !self.read_block()? {
                return Ok(None);
            }
        }

        let offset = self.offset;
        if self.block.remaining() < 4 {
            return Err(CodecError::corrupt(offset, "truncated record length"));
        }
        let len = self.block.get_u32() as usize;
        if self.block.remaining() < len {
            return Err(CodecError::corrupt(offset, "record overruns block"));
        }
        let encoded = self.block.split_to(len);
        self.remaining_in_block -= 1;

        Ok(Some(serde_json::from_slice(&encoded)?))
    }

    /// Read all remaining records
    pub fn read_all(&mut self) -> Result<Vec<Value>> {
        let mut records = Vec::new();
        while let Some(record) = self.next_record()? {
            records.push(record);
        }
        Ok(records)
    }

    /// Iterate over the remaining records as JSON values
    pub fn records(self) -> RecordIter<R> {
        RecordIter {
            reader: self,
            failed: false,
        }
    }

    /// Iterate over the remaining records, deserializing each into `T`
    pub fn records_as<T: DeserializeOwned>(self) -> impl Iterator<Item = Result<T>> {
        self.records()
            .map(|record| record.and_then(|value| Ok(serde_json::from_value(value)?)))
    }

    /// Load the next block; returns false at end of file
    fn read_block(&mut self) -> Result<bool> {
        let mut frame = [0u8; 8];
        match read_full(&mut self.reader, &mut frame)? {
            0 => return Ok(false),
            8 => {}
            _ => return Err(CodecError::corrupt(self.offset, "truncated block header")),
        }

        let count = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]);
        let payload_len = u32::from_be_bytes([frame[4], frame[5], frame[6], frame[7]]) as usize;

        if payload_len > MAX_BLOCK_SIZE {
            return Err(CodecError::corrupt(
                self.offset,
                format!("implausible block length {}", payload_len),
            ));
        }

        // Grow with the data actually present, not with the claimed length
        let mut payload = Vec::new();
        (&mut self.reader)
            .take(payload_len as u64)
            .read_to_end(&mut payload)
            .map_err(|_| CodecError::corrupt(self.offset, "truncated block payload"))?;
        if payload.len() < payload_len {
            return Err(CodecError::corrupt(self.offset, "truncated block payload"));
        }

        let mut marker = [0u8; MARKER_SIZE];
        self.reader
            .read_exact(&mut marker)
            .map_err(|_| CodecError::corrupt(self.offset, "missing sync marker"))?;
        if marker != self.marker {
            return Err(CodecError::corrupt(self.offset, "sync marker mismatch"));
        }

        self.offset += (frame.len() + payload_len + MARKER_SIZE) as u64;
        self.blocks_read += 1;
        self.block = Bytes::from(payload);
        self.remaining_in_block = count;
        Ok(true)
    }
}

/// Read until `buf` is full or EOF; returns bytes read
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Iterator over the records in a container file
///
/// Stops after the first error; framing cannot be trusted past it.
pub struct RecordIter<R> {
    reader: ContainerReader<R>,
    failed: bool,
}

impl<R: Read> Iterator for RecordIter<R> {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.reader.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
