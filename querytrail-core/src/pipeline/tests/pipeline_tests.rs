use crate::metrics::{ExporterMetrics, MetricsSink};
use crate::pipeline::{
    EVICTED_OVERFLOW_QUERY, EVICTED_STALE_QUERY, EvictionPolicy, LineSource, Pipeline, Poll,
    RECORD_OUTPUT_ERROR, RecordSink, TAIL_LINE_ERROR,
};
use crate::query::QueryRecord;
use crate::query::tests::fixtures::{T0, T0_END, T0_STATS, memory, started, stats};
use crate::source::SourceError;
use pretty_assertions::assert_eq;
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Replays scripted reads, then reports idle forever (or raises `stop_when_drained`).
#[derive(Default)]
struct ScriptedSource {
    reads: VecDeque<Result<String, SourceError>>,
    stop_when_drained: Option<Arc<AtomicBool>>,
    closed: bool,
}

impl ScriptedSource {
    fn lines(lines: impl IntoIterator<Item = String>) -> Self {
        Self {
            reads: lines.into_iter().map(Ok).collect(),
            ..Self::default()
        }
    }
}

impl LineSource for ScriptedSource {
    fn try_next_line(&mut self) -> Result<Option<String>, SourceError> {
        match self.reads.pop_front() {
            Some(read) => read.map(Some),
            None => {
                if let Some(stop) = &self.stop_when_drained {
                    stop.store(true, Ordering::Relaxed);
                }
                Ok(None)
            }
        }
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(1)
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/// Fails every read, raising `stop` after `failures_before_stop` attempts.
struct BrokenSource {
    attempts: u32,
    failures_before_stop: u32,
    stop: Arc<AtomicBool>,
}

impl LineSource for BrokenSource {
    fn try_next_line(&mut self) -> Result<Option<String>, SourceError> {
        self.attempts += 1;
        if self.attempts >= self.failures_before_stop {
            self.stop.store(true, Ordering::Relaxed);
        }
        Err(SourceError::Decode { offset: 0 })
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(20)
    }

    fn close(&mut self) {}
}

#[derive(Clone, Default)]
struct CollectingSink(Arc<Mutex<Vec<QueryRecord>>>);

impl CollectingSink {
    fn ids(&self) -> Vec<String> {
        self.0.lock().unwrap().iter().map(|r| r.id.clone()).collect()
    }
}

impl RecordSink for CollectingSink {
    fn emit(&mut self, record: &QueryRecord) -> io::Result<()> {
        self.0.lock().unwrap().push(record.clone());
        Ok(())
    }
}

struct FailingSink;

impl RecordSink for FailingSink {
    fn emit(&mut self, _record: &QueryRecord) -> io::Result<()> {
        Err(io::Error::other("disk full"))
    }
}

fn pipeline(
    source: ScriptedSource,
    eviction: EvictionPolicy,
) -> (Pipeline<ScriptedSource>, Arc<ExporterMetrics>, CollectingSink) {
    let metrics = Arc::new(ExporterMetrics::new());
    let sink = CollectingSink::default();
    let sink_metrics: Arc<dyn MetricsSink> = metrics.clone();
    let pipeline = Pipeline::new(source, sink_metrics, Box::new(sink.clone()), eviction);
    (pipeline, metrics, sink)
}

fn drain(pipeline: &mut Pipeline<ScriptedSource>) {
    while pipeline.poll_once() != Poll::Idle {}
}

#[test]
fn fully_described_query_is_emitted_and_forgotten() {
    // Arrange
    let source = ScriptedSource::lines([
        started("q1", T0, "SELECT 1"),
        "2024.03.01 12:00:00.100000 [ 42 ] {q1} <Trace> Aggregator: merging".to_string(),
        stats("q1", T0_STATS),
        memory("q1", T0_END, "5.00 MiB"),
    ]);
    let (mut pipeline, metrics, sink) = pipeline(source, EvictionPolicy::disabled());

    // Act
    drain(&mut pipeline);

    // Assert
    assert_eq!(sink.ids(), ["q1"]);
    assert!(pipeline.correlator().store().is_empty());
    assert_eq!(metrics.read_lines.get(&[]), 4);
    assert!(metrics.errors.samples().is_empty());
}

#[test]
fn insert_stays_open_and_is_not_emitted() {
    let source = ScriptedSource::lines([
        started("ins", T0, "INSERT INTO t VALUES"),
        memory("ins", T0_END, "1 MiB"),
    ]);
    let (mut pipeline, _, sink) = pipeline(source, EvictionPolicy::disabled());

    drain(&mut pipeline);

    assert!(sink.ids().is_empty());
    assert!(pipeline.correlator().store().contains("ins"));
}

#[test]
fn source_errors_are_counted_and_skipped() {
    // Arrange
    let mut source = ScriptedSource::lines([started("q1", T0, "SELECT 1")]);
    source.reads.push_front(Err(SourceError::Decode { offset: 0 }));
    let (mut pipeline, metrics, _) = pipeline(source, EvictionPolicy::disabled());

    // Act
    let first = pipeline.poll_once();
    let second = pipeline.poll_once();

    // Assert
    assert_eq!(first, Poll::Error);
    assert_eq!(second, Poll::Line);
    assert_eq!(metrics.error_count(TAIL_LINE_ERROR), 1);
    assert_eq!(metrics.read_lines.get(&[]), 1);
}

#[test]
fn stale_queries_are_evicted_by_log_time() {
    // Arrange
    let source = ScriptedSource::lines([
        started("old", "2024.03.01 10:00:00.000000", "INSERT INTO t VALUES"),
        started("recent", "2024.03.01 11:30:00.000000", "SELECT 1"),
        started("new", "2024.03.01 12:00:00.000000", "SELECT 2"),
    ]);
    let policy = EvictionPolicy {
        max_age: Some(Duration::from_secs(3_600)),
        max_records: None,
        sweep_interval: 1,
    };
    let (mut pipeline, metrics, sink) = pipeline(source, policy);

    // Act
    drain(&mut pipeline);

    // Assert
    let store = pipeline.correlator().store();
    assert!(!store.contains("old"));
    assert!(store.contains("recent"));
    assert!(store.contains("new"));
    assert_eq!(metrics.error_count(EVICTED_STALE_QUERY), 1);
    assert!(sink.ids().is_empty());
}

#[test]
fn overflow_evicts_the_oldest_queries() {
    let source = ScriptedSource::lines([
        started("a", "2024.03.01 12:00:01.000000", "SELECT 1"),
        started("b", "2024.03.01 12:00:02.000000", "SELECT 1"),
        started("c", "2024.03.01 12:00:03.000000", "SELECT 1"),
    ]);
    let policy = EvictionPolicy {
        max_age: None,
        max_records: Some(2),
        sweep_interval: 1_000,
    };
    let (mut pipeline, metrics, _) = pipeline(source, policy);

    // The idle poll at the end triggers the sweep.
    drain(&mut pipeline);

    let store = pipeline.correlator().store();
    assert_eq!(store.len(), 2);
    assert!(!store.contains("a"));
    assert_eq!(metrics.error_count(EVICTED_OVERFLOW_QUERY), 1);
}

#[test]
fn sink_failures_are_counted() {
    let metrics = Arc::new(ExporterMetrics::new());
    let sink_metrics: Arc<dyn MetricsSink> = metrics.clone();
    let source = ScriptedSource::lines([
        started("q1", T0, "SELECT 1"),
        memory("q1", T0_END, "1 KiB"),
    ]);
    let mut pipeline = Pipeline::new(
        source,
        sink_metrics,
        Box::new(FailingSink),
        EvictionPolicy::disabled(),
    );

    drain(&mut pipeline);

    assert_eq!(metrics.error_count(RECORD_OUTPUT_ERROR), 1);
    assert!(pipeline.correlator().store().is_empty());
}

#[test]
fn run_stops_on_flag_and_closes_the_source() {
    // Arrange
    let stop = Arc::new(AtomicBool::new(false));
    let mut source = ScriptedSource::lines([
        started("q1", T0, "SELECT 1"),
        memory("q1", T0_END, "1 KiB"),
    ]);
    source.stop_when_drained = Some(Arc::clone(&stop));
    let (mut pipeline, metrics, sink) = pipeline(source, EvictionPolicy::default());

    // Act
    pipeline.run(&stop);

    // Assert
    assert!(pipeline.source().closed);
    assert_eq!(sink.ids(), ["q1"]);
    assert_eq!(metrics.read_lines.get(&[]), 2);
}

#[test]
fn run_backs_off_while_the_source_keeps_failing() {
    // Arrange
    let stop = Arc::new(AtomicBool::new(false));
    let source = BrokenSource {
        attempts: 0,
        failures_before_stop: 4,
        stop: Arc::clone(&stop),
    };
    let metrics = Arc::new(ExporterMetrics::new());
    let sink_metrics: Arc<dyn MetricsSink> = metrics.clone();
    let mut pipeline = Pipeline::new(
        source,
        sink_metrics,
        Box::new(CollectingSink::default()),
        EvictionPolicy::disabled(),
    );

    // Act
    let started_at = Instant::now();
    pipeline.run(&stop);
    let elapsed = started_at.elapsed();

    // Assert
    assert_eq!(pipeline.source().attempts, 4);
    assert_eq!(metrics.error_count(TAIL_LINE_ERROR), 4);
    assert!(
        elapsed >= Duration::from_millis(60),
        "failed reads were retried without pausing: {elapsed:?}"
    );
}
