use crate::query::StatementKind;

/// Destination for every metric the exporter produces.
///
/// Implementations own their synchronization: the line loop and the metrics
/// endpoint call into the same sink from different threads.
pub trait MetricsSink: Send + Sync {
    /// Internal exporter error, labeled by category (`not_found_query`, `convert_bytes`, ...).
    fn internal_error(&self, category: &str);

    fn read_line(&self);

    fn query_started(&self, kind: StatementKind);

    fn query_failed(&self, kind: StatementKind, code: i64);

    fn query_duration(&self, kind: StatementKind, seconds: f64);

    fn rows_read(&self, rows: f64);

    fn bytes_read(&self, bytes: f64);

    fn rows_per_second(&self, rps: f64);

    fn bytes_per_second(&self, bps: f64);
}

/// Sink that drops every observation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn internal_error(&self, _category: &str) {}
    fn read_line(&self) {}
    fn query_started(&self, _kind: StatementKind) {}
    fn query_failed(&self, _kind: StatementKind, _code: i64) {}
    fn query_duration(&self, _kind: StatementKind, _seconds: f64) {}
    fn rows_read(&self, _rows: f64) {}
    fn bytes_read(&self, _bytes: f64) {}
    fn rows_per_second(&self, _rps: f64) {}
    fn bytes_per_second(&self, _bps: f64) {}
}
