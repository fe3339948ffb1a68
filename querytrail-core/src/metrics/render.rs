use crate::metrics::registry::{CounterFamily, ExporterMetrics, HistogramFamily};
use std::fmt::Write as _;

pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

impl ExporterMetrics {
    /// Render every family in Prometheus text exposition format.
    pub fn render_prometheus(&self) -> String {
        let mut output = String::new();

        for family in self.counters() {
            push_counter_family(&mut output, family);
        }
        for family in self.histograms() {
            push_histogram_family(&mut output, family);
        }

        output
    }
}

fn push_counter_family(output: &mut String, family: &CounterFamily) {
    push_header(output, family.name, family.help, "counter");

    for (values, count) in family.samples() {
        let labels = format_labels(family.label_names, &values, None);
        let _ = writeln!(output, "{}{labels} {count}", family.name);
    }
}

fn push_histogram_family(output: &mut String, family: &HistogramFamily) {
    push_header(output, family.name, family.help, "histogram");

    family.for_each_sorted(|values, histogram| {
        for (upper, count) in histogram.cumulative_buckets() {
            let le = format_float(upper);
            let labels = format_labels(family.label_names, values, Some(&le));
            let _ = writeln!(output, "{}_bucket{labels} {count}", family.name);
        }

        let labels = format_labels(family.label_names, values, None);
        let _ = writeln!(
            output,
            "{}_sum{labels} {}",
            family.name,
            format_float(histogram.sum())
        );
        let _ = writeln!(output, "{}_count{labels} {}", family.name, histogram.count());
    });
}

fn push_header(output: &mut String, name: &str, help: &str, metric_type: &str) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} {metric_type}");
}

fn format_labels(names: &[&str], values: &[String], le: Option<&str>) -> String {
    let mut pairs: Vec<String> = names
        .iter()
        .zip(values)
        .map(|(name, value)| format!("{name}=\"{}\"", escape_label(value)))
        .collect();

    if let Some(le) = le {
        pairs.push(format!("le=\"{le}\""));
    }

    if pairs.is_empty() {
        String::new()
    } else {
        format!("{{{}}}", pairs.join(","))
    }
}

fn escape_label(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn format_float(value: f64) -> String {
    if value.is_infinite() {
        if value > 0.0 { "+Inf" } else { "-Inf" }.to_string()
    } else if value.is_nan() {
        "NaN".to_string()
    } else {
        value.to_string()
    }
}
