use crate::metrics::MetricsSink;
use crate::query::decode::{
    DecodeError, decode_failed, decode_memory_peak, decode_started, decode_stats,
};
use crate::query::patterns::{
    PatternLibrary, RawEvent, RawFailed, RawMemoryPeak, RawStarted, RawStats, RegexPatterns,
};
use crate::query::statement::StatementKind;
use crate::query::store::CorrelationStore;
use crate::query::types::{QueryFailure, QueryRecord};
use std::sync::Arc;

pub const DUPLICATED_INITIAL_QUERY: &str = "duplicated_initial_query";
pub const NOT_FOUND_QUERY: &str = "not_found_query";
pub const DUPLICATED_STATS_EVENT: &str = "duplicated_stats_event";
pub const DUPLICATED_MEMORY_EVENT: &str = "duplicated_memory_event";
pub const DUPLICATED_ERROR_EVENT: &str = "duplicated_error_event";

/// Merges classified log lines into [`QueryRecord`]s.
///
/// Lines are applied one at a time. A record is created by its start line, enriched by
/// stats, failure and memory-peak lines, and flagged `fully_described` once the memory
/// peak arrives for anything but an insert. The correlator never evicts; the caller
/// removes records it has consumed (see [`Correlator::take`]).
pub struct Correlator<P = RegexPatterns> {
    patterns: P,
    store: CorrelationStore,
    metrics: Arc<dyn MetricsSink>,
}

impl Correlator<RegexPatterns> {
    pub fn new(metrics: Arc<dyn MetricsSink>) -> Self {
        Self::with_patterns(RegexPatterns, metrics)
    }
}

impl<P: PatternLibrary> Correlator<P> {
    pub fn with_patterns(patterns: P, metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            patterns,
            store: CorrelationStore::new(),
            metrics,
        }
    }

    pub fn store(&self) -> &CorrelationStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut CorrelationStore {
        &mut self.store
    }

    /// Remove a record from the store, typically once it is fully described.
    pub fn take(&mut self, id: &str) -> Option<QueryRecord> {
        self.store.remove(id)
    }

    /// Apply one log line and return the record it touched, if any.
    pub fn process_line(&mut self, line: &str) -> Option<&QueryRecord> {
        let event = self.patterns.classify(line)?;
        self.apply(event)
    }

    /// Apply an already classified line.
    pub fn apply(&mut self, event: RawEvent<'_>) -> Option<&QueryRecord> {
        match event {
            RawEvent::Started(raw) => self.on_started(&raw),
            RawEvent::Stats(raw) => self.on_stats(&raw),
            RawEvent::Failed(raw) => self.on_failed(&raw),
            RawEvent::MemoryPeak(raw) => self.on_memory_peak(&raw),
        }
    }

    fn on_started(&mut self, raw: &RawStarted<'_>) -> Option<&QueryRecord> {
        if self.store.contains(raw.id) {
            self.metrics.internal_error(DUPLICATED_INITIAL_QUERY);
            tracing::warn!(id = raw.id, kind = "initial", "duplicated query in log");
            return self.store.get(raw.id);
        }

        let event = match decode_started(raw) {
            Ok(event) => event,
            Err(e) => return self.drop_event(raw.id, "initial", e),
        };

        let record = QueryRecord::new(event);
        self.metrics.query_started(record.kind);

        let (record, _) = self.store.insert_if_absent(record);
        Some(&*record)
    }

    fn on_stats(&mut self, raw: &RawStats<'_>) -> Option<&QueryRecord> {
        let Some(record) = self.store.get(raw.id) else {
            return self.not_found(raw.id, "processed");
        };

        if record.has_stats() {
            self.metrics.internal_error(DUPLICATED_STATS_EVENT);
            tracing::warn!(id = raw.id, kind = "processed", "duplicated stats for query");
            return self.store.get(raw.id);
        }

        let event = match decode_stats(raw) {
            Ok(event) => event,
            Err(e) => return self.drop_event(raw.id, "processed", e),
        };

        let record = self.store.get_mut(raw.id)?;
        record.rows_read = event.rows_read;
        record.bytes_read = event.bytes_read;
        record.rows_per_second = event.rows_per_second;
        record.bytes_per_second = event.bytes_per_second;
        record.stats_seen = true;

        self.metrics.rows_read(record.rows_read as f64);
        self.metrics.bytes_read(record.bytes_read as f64);
        self.metrics.rows_per_second(record.rows_per_second as f64);
        self.metrics.bytes_per_second(record.bytes_per_second as f64);

        Some(&*record)
    }

    fn on_failed(&mut self, raw: &RawFailed<'_>) -> Option<&QueryRecord> {
        let Some(record) = self.store.get(raw.id) else {
            return self.not_found(raw.id, "error");
        };

        if record.is_failed() {
            self.metrics.internal_error(DUPLICATED_ERROR_EVENT);
            tracing::warn!(id = raw.id, kind = "error", "duplicated error for query");
            return self.store.get(raw.id);
        }

        let event = match decode_failed(raw) {
            Ok(event) => event,
            Err(e) => return self.drop_event(raw.id, "error", e),
        };

        let record = self.store.get_mut(raw.id)?;
        self.metrics.query_failed(record.kind, event.code);
        record.failure = Some(QueryFailure {
            code: event.code,
            message: event.message,
        });

        Some(&*record)
    }

    fn on_memory_peak(&mut self, raw: &RawMemoryPeak<'_>) -> Option<&QueryRecord> {
        let Some(record) = self.store.get(raw.id) else {
            return self.not_found(raw.id, "memory");
        };

        if record.end.is_some() {
            self.metrics.internal_error(DUPLICATED_MEMORY_EVENT);
            tracing::warn!(id = raw.id, kind = "memory", "duplicated memory peak for query");
            return self.store.get(raw.id);
        }

        let event = match decode_memory_peak(raw) {
            Ok(event) => event,
            Err(e) => return self.drop_event(raw.id, "memory", e),
        };

        let record = self.store.get_mut(raw.id)?;
        record.memory = event.memory;
        record.end = Some(event.ts);
        record.elapsed = elapsed_seconds(record, event.ts);

        self.metrics.query_duration(record.kind, record.elapsed);

        // Inserts report their completion elsewhere; leave them open.
        if record.kind != StatementKind::Insert {
            record.fully_described = true;
        }

        Some(&*record)
    }

    fn not_found(&self, id: &str, kind: &'static str) -> Option<&QueryRecord> {
        self.metrics.internal_error(NOT_FOUND_QUERY);
        tracing::warn!(
            id,
            kind,
            "can't find such query, might be in another log file"
        );
        None
    }

    fn drop_event(&self, id: &str, kind: &'static str, e: DecodeError) -> Option<&QueryRecord> {
        self.metrics.internal_error(e.category());
        tracing::error!(
            id,
            kind,
            field = e.field,
            raw = %e.raw,
            "can't convert field, dropping line"
        );
        None
    }
}

fn elapsed_seconds(record: &QueryRecord, end: chrono::NaiveDateTime) -> f64 {
    let delta = end - record.start;
    delta
        .num_microseconds()
        .map_or(delta.num_milliseconds() as f64 / 1_000.0, |us| {
            us as f64 / 1_000_000.0
        })
}
