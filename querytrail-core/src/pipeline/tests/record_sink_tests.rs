use crate::pipeline::{DiscardSink, JsonLinesSink, RecordSink};
use crate::query::decode::decode_timestamp;
use crate::query::{QueryRecord, StartedEvent};
use serde_json::Value;
use tempfile::TempDir;

fn record(id: &str) -> QueryRecord {
    QueryRecord::new(StartedEvent {
        id: id.to_string(),
        ts: decode_timestamp("dt", "2024.03.01 12:00:00.000000").unwrap(),
        pid: 1,
        host: "127.0.0.1".to_string(),
        port: 9000,
        query: "SELECT 1".to_string(),
    })
}

#[test]
fn json_lines_writes_one_document_per_record() {
    // Arrange
    let mut sink = JsonLinesSink::new(Vec::new());

    // Act
    sink.emit(&record("a")).unwrap();
    sink.emit(&record("b")).unwrap();

    // Assert
    let out = String::from_utf8(sink.into_inner()).unwrap();
    let ids: Vec<String> = out
        .lines()
        .map(|line| {
            let doc: Value = serde_json::from_str(line).unwrap();
            doc["id"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(ids, ["a", "b"]);
}

#[test]
fn append_to_keeps_existing_content() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("completed.jsonl");
    std::fs::write(&path, "{\"id\":\"earlier\"}\n").unwrap();

    let mut sink = JsonLinesSink::append_to(&path).unwrap();
    sink.emit(&record("later")).unwrap();
    drop(sink);

    let contents = std::fs::read_to_string(&path).unwrap();
    assert_eq!(contents.lines().count(), 2);
    assert!(contents.lines().nth(1).unwrap().contains("\"id\":\"later\""));
}

#[test]
fn discard_accepts_everything() {
    assert!(DiscardSink.emit(&record("x")).is_ok());
}
