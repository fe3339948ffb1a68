use crate::metrics::{ExporterMetrics, MetricsSink};
use crate::query::StatementKind;

#[test]
fn renders_help_type_and_samples() {
    // Arrange
    let metrics = ExporterMetrics::new();
    metrics.read_line();
    metrics.read_line();
    metrics.query_started(StatementKind::Select);
    metrics.query_failed(StatementKind::Select, 241);
    metrics.internal_error("not_found_query");

    // Act
    let body = metrics.render_prometheus();

    // Assert
    assert!(body.contains("# HELP querytrail_read_lines Total read lines count\n"));
    assert!(body.contains("# TYPE querytrail_read_lines counter\n"));
    assert!(body.contains("querytrail_read_lines 2\n"));
    assert!(body.contains("querytrail_errors{type=\"not_found_query\"} 1\n"));
    assert!(body.contains("clickhouse_query_count{type=\"select\"} 1\n"));
    assert!(body.contains("clickhouse_query_errors{type=\"select\",code=\"241\"} 1\n"));
}

#[test]
fn renders_histogram_series() {
    let metrics = ExporterMetrics::new();
    metrics.query_duration(StatementKind::Insert, 2.5);

    let body = metrics.render_prometheus();

    assert!(body.contains("# TYPE clickhouse_query_time histogram\n"));
    assert!(body.contains("clickhouse_query_time_bucket{type=\"insert\",le=\"1\"} 0\n"));
    assert!(body.contains("clickhouse_query_time_bucket{type=\"insert\",le=\"5\"} 1\n"));
    assert!(body.contains("clickhouse_query_time_bucket{type=\"insert\",le=\"+Inf\"} 1\n"));
    assert!(body.contains("clickhouse_query_time_sum{type=\"insert\"} 2.5\n"));
    assert!(body.contains("clickhouse_query_time_count{type=\"insert\"} 1\n"));
}

#[test]
fn families_without_samples_still_have_headers() {
    let body = ExporterMetrics::new().render_prometheus();

    for name in [
        "querytrail_errors",
        "clickhouse_query_errors",
        "clickhouse_select_query_rows_read",
        "clickhouse_select_query_bytes_per_second",
    ] {
        assert!(body.contains(&format!("# HELP {name} ")), "missing {name}");
    }
    assert!(!body.contains("clickhouse_select_query_rows_read_count"));
}

#[test]
fn label_values_are_escaped() {
    let metrics = ExporterMetrics::new();
    metrics.internal_error("quote\"back\\slash\nline");

    let body = metrics.render_prometheus();

    assert!(body.contains(r#"querytrail_errors{type="quote\"back\\slash\nline"} 1"#));
}
