//! The line loop: pulls lines from a [`LineSource`], feeds the correlator, hands
//! fully described queries to a [`RecordSink`] and keeps the store bounded.

mod eviction;
mod record_sink;
mod source;
#[cfg(test)]
mod tests;

pub use eviction::{EVICTED_OVERFLOW_QUERY, EVICTED_STALE_QUERY, EvictionPolicy};
pub use record_sink::{DiscardSink, JsonLinesSink, RecordSink};
pub use source::LineSource;

use crate::metrics::MetricsSink;
use crate::query::{Correlator, QueryRecord};
use chrono::NaiveDateTime;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

pub const TAIL_LINE_ERROR: &str = "tail_line";
pub const RECORD_OUTPUT_ERROR: &str = "record_output";

/// What one pass of [`Pipeline::poll_once`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Poll {
    Line,
    Error,
    Idle,
}

pub struct Pipeline<S: LineSource> {
    source: S,
    correlator: Correlator,
    metrics: Arc<dyn MetricsSink>,
    sink: Box<dyn RecordSink>,
    eviction: EvictionPolicy,
    /// Newest log timestamp seen; ages are measured against it.
    newest: Option<NaiveDateTime>,
    lines_since_sweep: u64,
}

impl<S: LineSource> Pipeline<S> {
    pub fn new(
        source: S,
        metrics: Arc<dyn MetricsSink>,
        sink: Box<dyn RecordSink>,
        eviction: EvictionPolicy,
    ) -> Self {
        Self {
            source,
            correlator: Correlator::new(Arc::clone(&metrics)),
            metrics,
            sink,
            eviction,
            newest: None,
            lines_since_sweep: 0,
        }
    }

    pub fn correlator(&self) -> &Correlator {
        &self.correlator
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Follow the source until `stop` is set, then release it.
    pub fn run(&mut self, stop: &AtomicBool) {
        tracing::info!("line loop started");

        while !stop.load(Ordering::Relaxed) {
            match self.poll_once() {
                Poll::Line => {}
                // A source that keeps failing is retried at the idle pace.
                Poll::Idle | Poll::Error => thread::sleep(self.source.poll_interval()),
            }
        }

        self.source.close();
        tracing::info!(open_queries = self.correlator.store().len(), "line loop stopped");
    }

    /// Read at most one line from the source and process it.
    pub fn poll_once(&mut self) -> Poll {
        match self.source.try_next_line() {
            Ok(Some(line)) => {
                self.process_line(&line);
                Poll::Line
            }
            Ok(None) => {
                if self.lines_since_sweep > 0 {
                    self.sweep();
                }
                Poll::Idle
            }
            Err(err) => {
                self.metrics.internal_error(TAIL_LINE_ERROR);
                tracing::warn!(error = %err, "can't read log line");
                Poll::Error
            }
        }
    }

    pub fn process_line(&mut self, line: &str) {
        self.metrics.read_line();

        let completed = match self.correlator.process_line(line) {
            Some(record) => {
                let seen = record.end.unwrap_or(record.start);
                if self.newest.is_none_or(|newest| seen > newest) {
                    self.newest = Some(seen);
                }
                record.fully_described.then(|| record.id.clone())
            }
            None => None,
        };

        if let Some(record) = completed.and_then(|id| self.correlator.take(&id)) {
            self.complete(record);
        }

        self.lines_since_sweep += 1;
        if self.lines_since_sweep >= self.eviction.sweep_interval {
            self.sweep();
        }
    }

    /// Apply the eviction policy now. Returns the number of evicted records.
    pub fn sweep(&mut self) -> usize {
        self.lines_since_sweep = 0;
        self.eviction.sweep(
            self.correlator.store_mut(),
            self.newest,
            self.metrics.as_ref(),
        )
    }

    fn complete(&mut self, record: QueryRecord) {
        tracing::debug!(
            id = %record.id,
            kind = %record.kind,
            elapsed = record.elapsed,
            rows_read = record.rows_read,
            memory = record.memory,
            failed = record.is_failed(),
            "query fully described"
        );

        if let Err(err) = self.sink.emit(&record) {
            self.metrics.internal_error(RECORD_OUTPUT_ERROR);
            tracing::warn!(id = %record.id, error = %err, "can't write completed query");
        }
    }
}
