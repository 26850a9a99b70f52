//! Tests for the publisher facade and writer startup

use crate::{ConfigError, WriterConfig, WriterError, start};
use serde::Serialize;
use serde_json::json;
use spool_container::{ContainerReader, Field, FieldType, Schema};
use spool_ring::{ProducerType, RingError, WaitStrategyKind};
use std::path::Path;
use tempfile::TempDir;

#[derive(Serialize)]
struct Click {
    id: i64,
}

fn config(dir: &TempDir) -> WriterConfig {
    let schema = Schema::new("click", vec![Field::required("id", FieldType::Long)]).unwrap();
    WriterConfig::new(dir.path().join("clicks.spl"), schema)
        .with_ring_buffer_size(64)
        .with_wait_strategy(WaitStrategyKind::Blocking)
}

fn record_count(path: &Path) -> usize {
    ContainerReader::open(path).unwrap().read_all().unwrap().len()
}

// ============================================================================
// Startup
// ============================================================================

#[test]
fn test_start_rejects_invalid_config() {
    let dir = TempDir::new().unwrap();
    let result = start::<Click>(&config(&dir).with_ring_buffer_size(100));

    match result {
        Err(WriterError::Config(ConfigError::InvalidValue { field, .. })) => {
            assert_eq!(field, "ring_buffer_size")
        }
        other => panic!("expected config error, got {other:?}"),
    }
}

#[test]
fn test_start_reports_bind_failure() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    std::fs::write(&config.path, b"garbage that is not a container").unwrap();

    assert!(matches!(
        start::<Click>(&config),
        Err(WriterError::Init { .. })
    ));
}

#[test]
fn test_start_creates_live_file() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);

    let publisher = start::<Click>(&config).unwrap();
    assert!(config.path.exists());
    assert_eq!(publisher.path(), config.path.as_path());
    assert_eq!(publisher.remaining_capacity(), 64);
    publisher.close();
}

// ============================================================================
// Publishing and shutdown
// ============================================================================

#[test]
fn test_publish_then_close_persists_everything() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);

    let mut publisher = start::<Click>(&config).unwrap();
    for id in 0..500 {
        publisher.publish(Click { id });
    }
    let snapshot = publisher.close();

    assert_eq!(snapshot.records_published, 500);
    assert_eq!(snapshot.records_written, 500);
    assert!(snapshot.flushes >= 1);
    assert_eq!(record_count(&config.path), 500);
}

#[test]
fn test_publish_after_close_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);

    let mut publisher = start::<Click>(&config).unwrap();
    publisher.publish(Click { id: 1 });
    publisher.close();
    assert!(publisher.is_closed());

    publisher.publish(Click { id: 2 });
    let snapshot = publisher.metrics().snapshot();
    assert_eq!(snapshot.records_rejected, 1);
    assert_eq!(snapshot.records_written, 1);
    assert_eq!(record_count(&config.path), 1);
}

#[test]
fn test_close_is_idempotent_across_clones() {
    let dir = TempDir::new().unwrap();
    let mut publisher = start::<Click>(&config(&dir)).unwrap();
    let clone = publisher.try_clone().unwrap();

    publisher.publish(Click { id: 1 });
    let first = clone.close();
    let second = publisher.close();

    assert_eq!(first, second);
    assert_eq!(first.records_written, 1);
}

#[test]
fn test_single_producer_publisher_cannot_be_cloned() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir).with_producer_type(ProducerType::Single);

    let publisher = start::<Click>(&config).unwrap();
    assert!(matches!(
        publisher.try_clone(),
        Err(RingError::SingleProducer)
    ));
    publisher.close();
}

#[test]
fn test_dropping_last_publisher_shuts_down() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);

    let mut publisher = start::<Click>(&config).unwrap();
    let metrics = publisher.metrics();
    let clone = publisher.try_clone().unwrap();
    for id in 0..100 {
        publisher.publish(Click { id });
    }

    drop(publisher);
    drop(clone);

    assert_eq!(metrics.snapshot().records_written, 100);
    assert_eq!(record_count(&config.path), 100);
}

#[test]
fn test_invalid_records_are_counted_not_raised() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);

    let mut publisher = start::<serde_json::Value>(&config).unwrap();
    publisher.publish(json!({"id": 1}));
    publisher.publish(json!({"id": "not a number"}));
    publisher.publish(json!({"name": "missing id"}));
    publisher.publish(json!({"id": 2}));
    let snapshot = publisher.close();

    assert_eq!(snapshot.records_published, 4);
    assert_eq!(snapshot.records_written, 2);
    assert_eq!(snapshot.write_errors, 2);
    assert_eq!(record_count(&config.path), 2);
}
