//! Metrics sink and its Prometheus pull endpoint.

mod registry;
mod render;
mod server;
mod sink;
#[cfg(test)]
mod tests;

pub use registry::{CounterFamily, ExporterMetrics, Histogram, HistogramFamily, LabelValues};
pub use render::CONTENT_TYPE;
pub use server::{MetricsServer, MetricsServerError, MetricsServerHandle};
pub use sink::{MetricsSink, NoopMetrics};
