//! Tests for the container writer and reader

use crate::writer::{BlockOutput, emit_frame, encode_frame};
use crate::{
    CodecError, ContainerReader, ContainerWriter, Field, FieldType, MAGIC, MARKER_SIZE, Schema,
    WriterOptions, read_schema,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fs;
use std::io::Cursor;
use tempfile::TempDir;

fn click_schema() -> Schema {
    Schema::new(
        "click",
        vec![
            Field::required("id", FieldType::Long),
            Field::optional("campaign", FieldType::String),
        ],
    )
    .unwrap()
    .with_namespace("ads")
}

fn view_schema() -> Schema {
    Schema::new("view", vec![Field::required("id", FieldType::Long)]).unwrap()
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Click {
    id: i64,
    campaign: Option<String>,
}

// ============================================================================
// Writing and reading back
// ============================================================================

#[test]
fn test_create_writes_readable_header() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("clicks.spl");

    let writer = ContainerWriter::create(&path, &click_schema(), WriterOptions::default()).unwrap();
    let header_len = writer.bytes_written();

    // The header is on disk before any record is written
    let on_disk = fs::metadata(&path).unwrap().len();
    assert_eq!(on_disk, header_len);
    assert_eq!(&fs::read(&path).unwrap()[..MAGIC.len()], &MAGIC);

    assert_eq!(read_schema(&path).unwrap(), click_schema());
    writer.close().unwrap();
}

#[test]
fn test_write_and_read_back() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("clicks.spl");

    let mut writer =
        ContainerWriter::create(&path, &click_schema(), WriterOptions::default()).unwrap();
    for i in 0..100 {
        writer
            .append(&json!({"id": i, "campaign": format!("c{}", i % 3)}))
            .unwrap();
    }
    assert_eq!(writer.pending_records(), 100);
    writer.close().unwrap();

    let mut reader = ContainerReader::open(&path).unwrap();
    assert_eq!(reader.schema(), &click_schema());

    let records = reader.read_all().unwrap();
    assert_eq!(records.len(), 100);
    assert_eq!(records[0], json!({"id": 0, "campaign": "c0"}));
    assert_eq!(records[99], json!({"id": 99, "campaign": "c0"}));
    assert_eq!(reader.blocks_read(), 1);
}

#[test]
fn test_typed_records() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("clicks.spl");

    let mut writer =
        ContainerWriter::create(&path, &click_schema(), WriterOptions::default()).unwrap();
    writer
        .append(&Click {
            id: 7,
            campaign: Some("spring".into()),
        })
        .unwrap();
    writer.append(&Click { id: 8, campaign: None }).unwrap();
    writer.close().unwrap();

    let clicks: Vec<Click> = ContainerReader::open(&path)
        .unwrap()
        .records_as::<Click>()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(
        clicks,
        vec![
            Click {
                id: 7,
                campaign: Some("spring".into())
            },
            Click { id: 8, campaign: None },
        ]
    );
}

#[test]
fn test_each_flush_emits_one_block() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("clicks.spl");

    let mut writer =
        ContainerWriter::create(&path, &click_schema(), WriterOptions::default()).unwrap();
    for batch in 0..5 {
        for i in 0..10 {
            writer.append(&json!({"id": batch * 10 + i})).unwrap();
        }
        writer.flush().unwrap();
        assert_eq!(writer.pending_records(), 0);
    }
    // Flushing an empty block writes nothing
    let before = writer.bytes_written();
    writer.flush().unwrap();
    assert_eq!(writer.bytes_written(), before);
    assert_eq!(fs::metadata(&path).unwrap().len(), before);
    writer.close().unwrap();

    let mut reader = ContainerReader::open(&path).unwrap();
    let ids: Vec<i64> = reader
        .read_all()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, (0..50).collect::<Vec<_>>());
    assert_eq!(reader.blocks_read(), 5);
}

#[test]
fn test_sync_interval_emits_blocks_without_flush() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("clicks.spl");

    let options = WriterOptions::default().with_sync_interval(256);
    let mut writer = ContainerWriter::create(&path, &click_schema(), options).unwrap();
    let header_len = writer.bytes_written();

    for i in 0..200 {
        writer.append(&json!({"id": i, "campaign": "autumn"})).unwrap();
    }
    assert!(writer.bytes_written() > header_len);
    assert!(writer.pending_records() < 200);

    // Drop without close: only full blocks reach the file, and they are readable
    let pending = writer.pending_records() as usize;
    drop(writer);

    let records = ContainerReader::open(&path).unwrap().read_all().unwrap();
    assert_eq!(records.len(), 200 - pending);
}

#[test]
fn test_sync_on_flush() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("clicks.spl");

    let options = WriterOptions::default().with_sync_on_flush();
    assert!(options.sync_on_flush);

    let mut writer = ContainerWriter::create(&path, &click_schema(), options).unwrap();
    writer.append(&json!({"id": 1})).unwrap();
    writer.flush().unwrap();
    writer.close().unwrap();

    assert_eq!(ContainerReader::open(&path).unwrap().read_all().unwrap().len(), 1);
}

// ============================================================================
// Schema enforcement
// ============================================================================

#[test]
fn test_rejected_record_leaves_block_intact() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("clicks.spl");

    let mut writer =
        ContainerWriter::create(&path, &click_schema(), WriterOptions::default()).unwrap();
    writer.append(&json!({"id": 1})).unwrap();

    let err = writer.append(&json!({"campaign": "no id"})).unwrap_err();
    assert!(matches!(err, CodecError::SchemaViolation { .. }));
    assert_eq!(writer.pending_records(), 1);

    writer.append(&json!({"id": 2})).unwrap();
    writer.close().unwrap();

    let records = ContainerReader::open(&path).unwrap().read_all().unwrap();
    assert_eq!(records, vec![json!({"id": 1}), json!({"id": 2})]);
}

#[test]
fn test_append_to_continues_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("clicks.spl");

    let mut writer =
        ContainerWriter::create(&path, &click_schema(), WriterOptions::default()).unwrap();
    writer.append(&json!({"id": 1})).unwrap();
    writer.close().unwrap();

    let mut writer =
        ContainerWriter::append_to(&path, &click_schema(), WriterOptions::default()).unwrap();
    assert_eq!(writer.bytes_written(), 0);
    writer.append(&json!({"id": 2})).unwrap();
    writer.close().unwrap();

    let mut reader = ContainerReader::open(&path).unwrap();
    let records = reader.read_all().unwrap();
    assert_eq!(records, vec![json!({"id": 1}), json!({"id": 2})]);
    assert_eq!(reader.blocks_read(), 2);
}

#[test]
fn test_append_to_rejects_different_schema() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("clicks.spl");

    ContainerWriter::create(&path, &click_schema(), WriterOptions::default())
        .unwrap()
        .close()
        .unwrap();

    let err = ContainerWriter::append_to(&path, &view_schema(), WriterOptions::default())
        .unwrap_err();
    match err {
        CodecError::SchemaMismatch { expected, found } => {
            assert_eq!(expected, "view");
            assert_eq!(found, "ads.click");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_append_to_missing_file() {
    let dir = TempDir::new().unwrap();
    let err = ContainerWriter::append_to(
        dir.path().join("absent.spl"),
        &click_schema(),
        WriterOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, CodecError::Io(_)));
}

// ============================================================================
// Corruption detection
// ============================================================================

#[test]
fn test_bad_magic() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("plain.txt");
    fs::write(&path, b"just some text that is long enough").unwrap();

    assert!(matches!(read_schema(&path), Err(CodecError::BadMagic)));
    assert!(matches!(
        ContainerReader::open(&path),
        Err(CodecError::BadMagic)
    ));

    // Empty files are not containers either
    fs::write(&path, b"").unwrap();
    assert!(matches!(read_schema(&path), Err(CodecError::BadMagic)));
}

#[test]
fn test_corrupt_sync_marker_is_detected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("clicks.spl");

    let mut writer =
        ContainerWriter::create(&path, &click_schema(), WriterOptions::default()).unwrap();
    writer.append(&json!({"id": 1})).unwrap();
    writer.close().unwrap();

    let mut bytes = fs::read(&path).unwrap();
    let last = bytes.len() - MARKER_SIZE;
    bytes[last] ^= 0xFF;
    fs::write(&path, &bytes).unwrap();

    let err = ContainerReader::open(&path).unwrap().read_all().unwrap_err();
    match err {
        CodecError::CorruptBlock { reason, .. } => assert!(reason.contains("marker")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_truncated_block_is_detected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("clicks.spl");

    let mut writer =
        ContainerWriter::create(&path, &click_schema(), WriterOptions::default()).unwrap();
    writer.append(&json!({"id": 1})).unwrap();
    writer.close().unwrap();

    let bytes = fs::read(&path).unwrap();
    let reader = ContainerReader::new(Cursor::new(bytes[..bytes.len() - 4].to_vec())).unwrap();

    let results: Vec<_> = reader.records().collect();
    assert_eq!(results.len(), 1);
    assert!(matches!(results[0], Err(CodecError::CorruptBlock { .. })));
}

// ============================================================================
// Torn and oversized blocks
// ============================================================================

/// In-memory output that fails after a byte budget and can refuse to be cut
#[derive(Default)]
struct FlakyOutput {
    data: Vec<u8>,
    fail_after: Option<usize>,
    refuse_cut: bool,
}

impl std::io::Write for FlakyOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self.fail_after {
            Some(0) => Err(std::io::Error::new(
                std::io::ErrorKind::StorageFull,
                "no space left on device",
            )),
            Some(budget) => {
                let n = budget.min(buf.len());
                self.data.extend_from_slice(&buf[..n]);
                self.fail_after = Some(budget - n);
                Ok(n)
            }
            None => {
                self.data.extend_from_slice(buf);
                Ok(buf.len())
            }
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl BlockOutput for FlakyOutput {
    fn cut_to(&mut self, len: u64) -> std::io::Result<()> {
        if self.refuse_cut {
            return Err(std::io::Error::other("truncate refused"));
        }
        self.data.truncate(len as usize);
        Ok(())
    }
}

const TEST_MARKER: [u8; MARKER_SIZE] = [7; MARKER_SIZE];

fn header(schema: &Schema) -> Vec<u8> {
    let schema_json = schema.to_json().unwrap();
    let mut bytes = MAGIC.to_vec();
    bytes.extend_from_slice(&(schema_json.len() as u32).to_be_bytes());
    bytes.extend_from_slice(&schema_json);
    bytes.extend_from_slice(&TEST_MARKER);
    bytes
}

fn frame(ids: &[i64]) -> Vec<u8> {
    let mut payload = Vec::new();
    for id in ids {
        let encoded = serde_json::to_vec(&json!({"id": id})).unwrap();
        payload.extend_from_slice(&(encoded.len() as u32).to_be_bytes());
        payload.extend_from_slice(&encoded);
    }
    encode_frame(ids.len() as u32, &payload, &TEST_MARKER).to_vec()
}

#[test]
fn test_failed_frame_write_is_cut_off() {
    let mut out = FlakyOutput {
        data: header(&view_schema()),
        ..FlakyOutput::default()
    };
    let mut good_len = out.data.len() as u64;

    let first = frame(&[1, 2]);
    emit_frame(&mut out, &first, good_len).unwrap();
    good_len += first.len() as u64;

    // Dies part way through the payload
    out.fail_after = Some(12);
    let err = emit_frame(&mut out, &frame(&[3, 4]), good_len).unwrap_err();
    assert!(matches!(err, CodecError::Io(_)));
    assert_eq!(out.data.len() as u64, good_len);

    out.fail_after = None;
    emit_frame(&mut out, &frame(&[5]), good_len).unwrap();

    let records = ContainerReader::new(Cursor::new(out.data))
        .unwrap()
        .read_all()
        .unwrap();
    let ids: Vec<i64> = records.iter().map(|r| r["id"].as_i64().unwrap()).collect();
    assert_eq!(ids, vec![1, 2, 5]);
}

#[test]
fn test_uncut_torn_frame_is_reported() {
    let mut out = FlakyOutput {
        data: header(&view_schema()),
        fail_after: Some(5),
        refuse_cut: true,
    };
    let good_len = out.data.len() as u64;

    match emit_frame(&mut out, &frame(&[1]), good_len) {
        Err(CodecError::TornBlock { offset }) => assert_eq!(offset, good_len),
        other => panic!("expected torn block, got {other:?}"),
    }
}

#[test]
fn test_implausible_block_length_is_rejected() {
    let mut bytes = header(&view_schema());
    bytes.extend_from_slice(&1u32.to_be_bytes());
    bytes.extend_from_slice(&u32::MAX.to_be_bytes());
    bytes.extend_from_slice(&[0u8; 32]);

    let err = ContainerReader::new(Cursor::new(bytes))
        .unwrap()
        .read_all()
        .unwrap_err();
    match err {
        CodecError::CorruptBlock { reason, .. } => assert!(reason.contains("implausible")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_block_longer_than_file_is_truncated() {
    let mut bytes = header(&view_schema());
    bytes.extend_from_slice(&1u32.to_be_bytes());
    bytes.extend_from_slice(&(512 * 1024 * 1024u32).to_be_bytes());
    bytes.extend_from_slice(&[0u8; 32]);

    let err = ContainerReader::new(Cursor::new(bytes))
        .unwrap()
        .read_all()
        .unwrap_err();
    match err {
        CodecError::CorruptBlock { reason, .. } => assert!(reason.contains("truncated")),
        other => panic!("unexpected error: {other}"),
    }
}
