use crate::query::statement::StatementKind;
use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Typed events produced by decoding a matched log line.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryEvent {
    Started(StartedEvent),
    Stats(StatsEvent),
    MemoryPeak(MemoryPeakEvent),
    Failed(FailedEvent),
}

impl QueryEvent {
    pub fn id(&self) -> &str {
        match self {
            QueryEvent::Started(e) => &e.id,
            QueryEvent::Stats(e) => &e.id,
            QueryEvent::MemoryPeak(e) => &e.id,
            QueryEvent::Failed(e) => &e.id,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StartedEvent {
    pub id: String,
    pub ts: NaiveDateTime,
    pub pid: i64,
    pub host: String,
    pub port: i64,
    pub query: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatsEvent {
    pub id: String,
    pub rows_read: i64,
    pub bytes_read: u64,
    pub rows_per_second: i64,
    pub bytes_per_second: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemoryPeakEvent {
    pub id: String,
    pub ts: NaiveDateTime,
    pub memory: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailedEvent {
    pub id: String,
    pub code: i64,
    pub message: String,
}

/// Position of a record in its lifecycle, inferred from which fields are populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    Started,
    StatsKnown,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFailure {
    pub code: i64,
    pub message: String,
}

/// Everything known about one query, merged from the lines that share its id.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRecord {
    pub id: String,
    pub host: String,
    pub port: i64,
    pub pid: i64,
    pub query: String,
    pub kind: StatementKind,
    pub start: NaiveDateTime,
    pub end: Option<NaiveDateTime>,
    pub rows_read: i64,
    pub bytes_read: u64,
    /// `end - start` in seconds, once the memory peak is known.
    pub elapsed: f64,
    /// Rates as reported by the server, not recomputed.
    pub rows_per_second: i64,
    pub bytes_per_second: u64,
    /// Peak memory in bytes.
    pub memory: u64,
    pub fully_described: bool,
    pub failure: Option<QueryFailure>,

    pub(crate) stats_seen: bool,
}

impl QueryRecord {
    pub fn new(event: StartedEvent) -> Self {
        let kind = StatementKind::classify(&event.query);

        Self {
            id: event.id,
            host: event.host,
            port: event.port,
            pid: event.pid,
            query: event.query,
            kind,
            start: event.ts,
            end: None,
            rows_read: 0,
            bytes_read: 0,
            elapsed: 0.0,
            rows_per_second: 0,
            bytes_per_second: 0,
            memory: 0,
            fully_described: false,
            failure: None,
            stats_seen: false,
        }
    }

    pub fn state(&self) -> QueryState {
        if self.end.is_some() {
            QueryState::Complete
        } else if self.stats_seen {
            QueryState::StatsKnown
        } else {
            QueryState::Started
        }
    }

    pub fn has_stats(&self) -> bool {
        self.stats_seen
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }
}

/// Wire shape of a record. Field names are a stable schema for downstream consumers.
#[derive(Serialize)]
struct RecordView<'a> {
    id: &'a str,
    host: &'a str,
    port: i64,
    pid: i64,
    query: &'a str,
    starttime: String,
    endtime: Option<String>,
    rowsread: i64,
    bytesread: u64,
    elapsed: f64,
    rps: i64,
    bps: u64,
    memused: u64,
    err: bool,
    errcode: i64,
    errmsg: &'a str,
    stmttype: StatementKind,
}

impl Serialize for QueryRecord {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        RecordView {
            id: &self.id,
            host: &self.host,
            port: self.port,
            pid: self.pid,
            query: &self.query,
            starttime: self.start.format(TIMESTAMP_FORMAT).to_string(),
            endtime: self
                .end
                .map(|ts| ts.format(TIMESTAMP_FORMAT).to_string()),
            rowsread: self.rows_read,
            bytesread: self.bytes_read,
            elapsed: self.elapsed,
            rps: self.rows_per_second,
            bps: self.bytes_per_second,
            memused: self.memory,
            err: self.failure.is_some(),
            errcode: self.failure.as_ref().map_or(0, |f| f.code),
            errmsg: self.failure.as_ref().map_or("", |f| f.message.as_str()),
            stmttype: self.kind,
        }
        .serialize(s)
    }
}
