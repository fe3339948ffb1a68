use crate::metrics::sink::MetricsSink;
use crate::query::StatementKind;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

const QUERY_TIME_BUCKETS: &[f64] = &[
    1.0, 5.0, 10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 120.0, 180.0, 300.0, 1800.0,
];

const ROWS_READ_BUCKETS: &[f64] = &[
    1e6, 1e7, 5e7, 1e8, 5e8, 1e9, 2e9, 3e9, 1e10,
];

const BYTES_READ_BUCKETS: &[f64] = &[
    5_368_709_120.0,
    10_737_418_240.0,
    53_687_091_200.0,
    107_374_182_400.0,
    536_870_912_000.0,
    1_073_741_824_000.0,
];

const ROWS_PER_SECOND_BUCKETS: &[f64] = &[
    5e4, 1e5, 5e5, 1e6, 2e6, 5e6, 1e7, 5e7, 1e8, 1e9,
];

const BYTES_PER_SECOND_BUCKETS: &[f64] = &[
    104_857_600.0,
    524_288_000.0,
    1_073_741_824.0,
    5_368_709_120.0,
    21_474_836_480.0,
    53_687_091_200.0,
];

/// Label values of one series, in the order of the family's label names.
pub type LabelValues = Vec<String>;

fn label_values(labels: &[&str]) -> LabelValues {
    labels.iter().map(|s| s.to_string()).collect()
}

/// Fixed-bucket histogram updated without locks.
#[derive(Debug)]
pub struct Histogram {
    buckets: &'static [f64],
    counts: Vec<AtomicU64>, // +Inf bucket last
    sum_bits: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    pub(crate) fn new(buckets: &'static [f64]) -> Self {
        Self {
            buckets,
            counts: (0..=buckets.len()).map(|_| AtomicU64::new(0)).collect(),
            sum_bits: AtomicU64::new(0f64.to_bits()),
            count: AtomicU64::new(0),
        }
    }

    pub(crate) fn observe(&self, value: f64) {
        let idx = self
            .buckets
            .iter()
            .position(|b| value <= *b)
            .unwrap_or(self.buckets.len());
        self.counts[idx].fetch_add(1, Ordering::Relaxed);

        let mut current = self.sum_bits.load(Ordering::Relaxed);
        loop {
            let next = (f64::from_bits(current) + value).to_bits();
            match self.sum_bits.compare_exchange_weak(
                current,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }

        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Cumulative `(upper bound, count)` pairs, ending with `+Inf`.
    pub fn cumulative_buckets(&self) -> Vec<(f64, u64)> {
        let mut running = 0;
        self.counts
            .iter()
            .enumerate()
            .map(|(i, c)| {
                running += c.load(Ordering::Relaxed);
                let upper = self.buckets.get(i).copied().unwrap_or(f64::INFINITY);
                (upper, running)
            })
            .collect()
    }

    pub fn sum(&self) -> f64 {
        f64::from_bits(self.sum_bits.load(Ordering::Relaxed))
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

#[derive(Debug)]
pub struct CounterFamily {
    pub name: &'static str,
    pub help: &'static str,
    pub label_names: &'static [&'static str],
    series: DashMap<LabelValues, AtomicU64>,
}

impl CounterFamily {
    fn new(
        name: &'static str,
        help: &'static str,
        label_names: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            help,
            label_names,
            series: DashMap::new(),
        }
    }

    pub fn inc(&self, labels: &[&str]) {
        debug_assert_eq!(labels.len(), self.label_names.len());

        let key = label_values(labels);
        if let Some(counter) = self.series.get(&key) {
            counter.fetch_add(1, Ordering::Relaxed);
            return;
        }

        self.series
            .entry(key)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self, labels: &[&str]) -> u64 {
        self.series
            .get(&label_values(labels))
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }

    /// All series sorted by label values.
    pub fn samples(&self) -> Vec<(LabelValues, u64)> {
        let mut out: Vec<(LabelValues, u64)> = self
            .series
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().load(Ordering::Relaxed)))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}

#[derive(Debug)]
pub struct HistogramFamily {
    pub name: &'static str,
    pub help: &'static str,
    pub label_names: &'static [&'static str],
    buckets: &'static [f64],
    series: DashMap<LabelValues, Histogram>,
}

impl HistogramFamily {
    fn new(
        name: &'static str,
        help: &'static str,
        label_names: &'static [&'static str],
        buckets: &'static [f64],
    ) -> Self {
        Self {
            name,
            help,
            label_names,
            buckets,
            series: DashMap::new(),
        }
    }

    pub fn observe(&self, labels: &[&str], value: f64) {
        debug_assert_eq!(labels.len(), self.label_names.len());

        let key = label_values(labels);
        if let Some(histogram) = self.series.get(&key) {
            histogram.observe(value);
            return;
        }

        self.series
            .entry(key)
            .or_insert_with(|| Histogram::new(self.buckets))
            .observe(value);
    }

    pub fn count(&self, labels: &[&str]) -> u64 {
        self.series.get(&label_values(labels)).map_or(0, |h| h.count())
    }

    pub fn sum(&self, labels: &[&str]) -> f64 {
        self.series.get(&label_values(labels)).map_or(0.0, |h| h.sum())
    }

    /// Apply `f` to every series, sorted by label values.
    pub fn for_each_sorted(&self, mut f: impl FnMut(&[String], &Histogram)) {
        let mut keys: Vec<LabelValues> = self.series.iter().map(|e| e.key().clone()).collect();
        keys.sort();

        for key in keys {
            if let Some(h) = self.series.get(&key) {
                f(&key, h.value());
            }
        }
    }
}

/// Process-wide exporter metrics.
///
/// Created once at startup and shared (via `Arc`) between the line loop, which records,
/// and the metrics endpoint, which renders.
#[derive(Debug)]
pub struct ExporterMetrics {
    pub errors: CounterFamily,
    pub read_lines: CounterFamily,
    pub query_errors: CounterFamily,
    pub query_count: CounterFamily,
    pub query_time: HistogramFamily,
    pub rows_read: HistogramFamily,
    pub bytes_read: HistogramFamily,
    pub rows_per_second: HistogramFamily,
    pub bytes_per_second: HistogramFamily,
}

impl Default for ExporterMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ExporterMetrics {
    pub fn new() -> Self {
        Self {
            errors: CounterFamily::new(
                "querytrail_errors",
                "Exporter internal errors by type",
                &["type"],
            ),
            read_lines: CounterFamily::new("querytrail_read_lines", "Total read lines count", &[]),
            query_errors: CounterFamily::new(
                "clickhouse_query_errors",
                "Query errors count by statement type and code",
                &["type", "code"],
            ),
            query_count: CounterFamily::new(
                "clickhouse_query_count",
                "Query count by statement type",
                &["type"],
            ),
            query_time: HistogramFamily::new(
                "clickhouse_query_time",
                "Time needed to process query by statement type",
                &["type"],
                QUERY_TIME_BUCKETS,
            ),
            rows_read: HistogramFamily::new(
                "clickhouse_select_query_rows_read",
                "Number of rows read by query",
                &[],
                ROWS_READ_BUCKETS,
            ),
            bytes_read: HistogramFamily::new(
                "clickhouse_select_query_bytes_read",
                "Bytes read by query",
                &[],
                BYTES_READ_BUCKETS,
            ),
            rows_per_second: HistogramFamily::new(
                "clickhouse_select_query_rows_per_second",
                "Rows per second speed by query",
                &[],
                ROWS_PER_SECOND_BUCKETS,
            ),
            bytes_per_second: HistogramFamily::new(
                "clickhouse_select_query_bytes_per_second",
                "Bytes per second speed by query",
                &[],
                BYTES_PER_SECOND_BUCKETS,
            ),
        }
    }

    pub fn counters(&self) -> [&CounterFamily; 4] {
        [
            &self.errors,
            &self.read_lines,
            &self.query_errors,
            &self.query_count,
        ]
    }

    pub fn histograms(&self) -> [&HistogramFamily; 5] {
        [
            &self.query_time,
            &self.rows_read,
            &self.bytes_read,
            &self.rows_per_second,
            &self.bytes_per_second,
        ]
    }

    pub fn error_count(&self, category: &str) -> u64 {
        self.errors.get(&[category])
    }
}

impl MetricsSink for ExporterMetrics {
    fn internal_error(&self, category: &str) {
        self.errors.inc(&[category]);
    }

    fn read_line(&self) {
        self.read_lines.inc(&[]);
    }

    fn query_started(&self, kind: StatementKind) {
        self.query_count.inc(&[kind.as_str()]);
    }

    fn query_failed(&self, kind: StatementKind, code: i64) {
        self.query_errors.inc(&[kind.as_str(), &code.to_string()]);
    }

    fn query_duration(&self, kind: StatementKind, seconds: f64) {
        self.query_time.observe(&[kind.as_str()], seconds);
    }

    fn rows_read(&self, rows: f64) {
        self.rows_read.observe(&[], rows);
    }

    fn bytes_read(&self, bytes: f64) {
        self.bytes_read.observe(&[], bytes);
    }

    fn rows_per_second(&self, rps: f64) {
        self.rows_per_second.observe(&[], rps);
    }

    fn bytes_per_second(&self, bps: f64) {
        self.bytes_per_second.observe(&[], bps);
    }
}
