use anyhow::{Context, Result};
use querytrail_core::config::ExporterConfig;
use querytrail_core::metrics::{ExporterMetrics, MetricsServer, MetricsSink};
use querytrail_core::pipeline::{DiscardSink, JsonLinesSink, Pipeline, RecordSink};
use querytrail_core::source::{LogTail, check_log_file};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::runtime::Builder;

/// Serve metrics and follow the log until interrupted.
pub fn run(cfg: ExporterConfig) -> Result<()> {
    let log_path = cfg.log_path()?.to_path_buf();
    check_log_file(&log_path)
        .with_context(|| format!("{} can't be followed", log_path.display()))?;

    let metrics = Arc::new(ExporterMetrics::new());

    // The endpoint gets its own runtime; the line loop stays on this thread.
    let metrics_rt = Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("querytrail-metrics")
        .enable_all()
        .build()
        .context("failed to build metrics runtime")?;

    let server = MetricsServer::new(cfg.metrics.listen.clone(), Arc::clone(&metrics));
    let handle = metrics_rt.block_on(server.start())?;

    let stop = Arc::new(AtomicBool::new(false));
    ctrlc::set_handler({
        let stop = Arc::clone(&stop);
        move || {
            tracing::info!("shutdown requested");
            stop.store(true, Ordering::Relaxed);
        }
    })
    .context("failed to install signal handler")?;

    let sink: Box<dyn RecordSink> = match &cfg.output.completed_output {
        Some(path) => Box::new(
            JsonLinesSink::append_to(path)
                .with_context(|| format!("can't open {}", path.display()))?,
        ),
        None => Box::new(DiscardSink),
    };

    let tail = LogTail::open(&log_path, cfg.tail_options())?;
    tracing::info!(
        path = %log_path.display(),
        listen = %handle.local_addr(),
        from_start = cfg.source.from_start,
        "following server log"
    );

    let sink_metrics: Arc<dyn MetricsSink> = metrics;
    let mut pipeline = Pipeline::new(tail, sink_metrics, sink, cfg.eviction_policy());
    pipeline.run(&stop);

    metrics_rt.block_on(handle.shutdown(cfg.shutdown_grace()));
    Ok(())
}
