use crate::query::decode::decode_timestamp;
use crate::query::{CorrelationStore, QueryRecord, StartedEvent};
use pretty_assertions::assert_eq;

fn record(id: &str, ts: &str) -> QueryRecord {
    QueryRecord::new(StartedEvent {
        id: id.to_string(),
        ts: decode_timestamp("dt", ts).expect("valid test timestamp"),
        pid: 1,
        host: "127.0.0.1".to_string(),
        port: 9000,
        query: "SELECT 1".to_string(),
    })
}

fn ids(records: &[QueryRecord]) -> Vec<&str> {
    let mut ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
    ids.sort_unstable();
    ids
}

#[test]
fn insert_if_absent_keeps_the_first_record() {
    // Arrange
    let mut store = CorrelationStore::new();
    let mut second = record("a", "2024.03.01 12:00:00.000000");
    second.query = "SELECT 2".to_string();

    // Act
    let (_, first_inserted) = store.insert_if_absent(record("a", "2024.03.01 12:00:00.000000"));
    let (stored, second_inserted) = store.insert_if_absent(second);

    // Assert
    assert!(first_inserted);
    assert!(!second_inserted);
    assert_eq!(stored.query, "SELECT 1");
    assert_eq!(store.len(), 1);
}

#[test]
fn evict_older_than_removes_only_earlier_starts() {
    // Arrange
    let mut store = CorrelationStore::new();
    store.insert_if_absent(record("old", "2024.03.01 10:00:00.000000"));
    store.insert_if_absent(record("edge", "2024.03.01 11:00:00.000000"));
    store.insert_if_absent(record("new", "2024.03.01 12:00:00.000000"));
    let cutoff = decode_timestamp("dt", "2024.03.01 11:00:00.000000").unwrap();

    // Act
    let evicted = store.evict_older_than(cutoff);

    // Assert
    assert_eq!(ids(&evicted), ["old"]);
    assert!(store.contains("edge"));
    assert!(store.contains("new"));
}

#[test]
fn evict_oldest_beyond_trims_to_capacity() {
    // Arrange
    let mut store = CorrelationStore::new();
    for (id, ts) in [
        ("c", "2024.03.01 12:00:03.000000"),
        ("a", "2024.03.01 12:00:01.000000"),
        ("d", "2024.03.01 12:00:04.000000"),
        ("b", "2024.03.01 12:00:02.000000"),
    ] {
        store.insert_if_absent(record(id, ts));
    }

    // Act
    let evicted = store.evict_oldest_beyond(2);

    // Assert
    assert_eq!(ids(&evicted), ["a", "b"]);
    let mut kept: Vec<&str> = store.iter().map(|r| r.id.as_str()).collect();
    kept.sort_unstable();
    assert_eq!(kept, ["c", "d"]);
    assert!(store.evict_oldest_beyond(2).is_empty());
}
