use crate::harness::{CapturedEvent, init_test_tracing};
use querytrail_core::config::ExporterConfig;
use querytrail_core::metrics::{ExporterMetrics, MetricsServer, MetricsServerHandle, MetricsSink};
use querytrail_core::pipeline::{JsonLinesSink, Pipeline};
use querytrail_core::source::LogTail;
use reqwest::blocking::{Client, RequestBuilder};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::runtime::{Builder, Runtime};

/// A running exporter following a log file in its own temp directory.
///
/// Everything is wired the way the binary wires it: the line loop on a thread,
/// the metrics endpoint on a separate tokio runtime.
pub struct TestExporter {
    dir: TempDir,
    log_path: PathBuf,
    output_path: PathBuf,
    base_url: String,
    client: Client,
    stop: Arc<AtomicBool>,
    line_loop: Option<JoinHandle<()>>,
    runtime: Runtime,
    handle: Option<MetricsServerHandle>,
}

impl TestExporter {
    /// Start an exporter on an empty log file.
    ///
    /// `extra_toml` is appended to the generated config, e.g. an `[eviction]` section.
    pub fn start(extra_toml: &str) -> Self {
        init_test_tracing(events());

        let dir = TempDir::new().expect("failed to create temp dir");
        let log_path = dir.path().join("clickhouse-server.log");
        let output_path = dir.path().join("completed.jsonl");
        fs::write(&log_path, "").expect("failed to create log file");

        let toml = format!(
            "[source]\npath = {log:?}\nfrom_start = true\npoll_interval_ms = 10\n\n\
             [metrics]\nlisten = \"127.0.0.1:0\"\nshutdown_grace_ms = 1000\n\n\
             [output]\ncompleted_output = {out:?}\n\n{extra_toml}",
            log = log_path.display().to_string(),
            out = output_path.display().to_string(),
        );
        let cfg: ExporterConfig = toml.parse().expect("invalid test config");
        cfg.validate().expect("test config should validate");

        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .expect("failed to build metrics runtime");

        let metrics = Arc::new(ExporterMetrics::new());
        let handle = runtime
            .block_on(MetricsServer::new(cfg.metrics.listen.clone(), Arc::clone(&metrics)).start())
            .expect("failed to start metrics server");
        let base_url = format!("http://{}", handle.local_addr());

        let stop = Arc::new(AtomicBool::new(false));
        let line_loop = thread::spawn({
            let stop = Arc::clone(&stop);
            let tail = LogTail::open(&log_path, cfg.tail_options()).expect("failed to open log");
            let sink = JsonLinesSink::append_to(&output_path).expect("failed to open output");
            let sink_metrics: Arc<dyn MetricsSink> = metrics;
            let eviction = cfg.eviction_policy();

            move || {
                let mut pipeline = Pipeline::new(tail, sink_metrics, Box::new(sink), eviction);
                pipeline.run(&stop);
            }
        });

        let client = Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .expect("failed to build client");

        Self {
            dir,
            log_path,
            output_path,
            base_url,
            client,
            stop,
            line_loop: Some(line_loop),
            runtime,
            handle: Some(handle),
        }
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(format!("{}{}", self.base_url, path))
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Append lines to the followed log, newline terminated.
    pub fn append(&self, lines: &[String]) {
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.log_path)
            .expect("failed to open log for append");

        for line in lines {
            writeln!(file, "{line}").expect("failed to append log line");
        }
        file.flush().expect("failed to flush log");
    }

    pub fn scrape(&self) -> String {
        let res = self.get("/metrics").send().expect("scrape failed");
        assert_eq!(res.status(), 200);
        res.text().expect("scrape body")
    }

    /// Scrape until `predicate` holds for the body, or panic after a few seconds.
    pub fn wait_for_metrics(&self, predicate: impl Fn(&str) -> bool) -> String {
        let deadline = Instant::now() + Duration::from_secs(5);

        loop {
            let body = self.scrape();
            if predicate(&body) {
                return body;
            }
            if Instant::now() > deadline {
                panic!("metrics never reached the expected state:\n{body}");
            }
            thread::sleep(Duration::from_millis(25));
        }
    }

    /// Records written to the completed-query output so far.
    pub fn completed(&self) -> Vec<Value> {
        let contents = fs::read_to_string(&self.output_path).unwrap_or_default();
        contents
            .lines()
            .map(|line| serde_json::from_str(line).expect("completed output is JSON"))
            .collect()
    }

    /// Wait until at least `count` records were written to the completed-query output.
    pub fn wait_for_completed(&self, count: usize) -> Vec<Value> {
        let deadline = Instant::now() + Duration::from_secs(5);

        loop {
            let completed = self.completed();
            if completed.len() >= count {
                return completed;
            }
            if Instant::now() > deadline {
                panic!("expected {count} completed queries, got {}", completed.len());
            }
            thread::sleep(Duration::from_millis(25));
        }
    }

    pub fn events(&self) -> Vec<CapturedEvent> {
        events().lock().unwrap().clone()
    }

    /// Wait for a captured tracing event matching `predicate`.
    pub fn wait_for_event(&self, predicate: impl Fn(&CapturedEvent) -> bool) -> CapturedEvent {
        let deadline = Instant::now() + Duration::from_secs(5);

        loop {
            if let Some(event) = self.events().into_iter().find(|e| predicate(e)) {
                return event;
            }
            if Instant::now() > deadline {
                panic!("no matching tracing event was captured");
            }
            thread::sleep(Duration::from_millis(25));
        }
    }

    /// Stop the line loop, then the metrics endpoint.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(line_loop) = self.line_loop.take() {
            let _ = line_loop.join();
        }
        if let Some(handle) = self.handle.take() {
            self.runtime
                .block_on(handle.shutdown(Duration::from_secs(1)));
        }
    }
}

impl Drop for TestExporter {
    fn drop(&mut self) {
        self.shutdown();
    }
}

static EVENTS: OnceLock<Arc<Mutex<Vec<CapturedEvent>>>> = OnceLock::new();

fn events() -> Arc<Mutex<Vec<CapturedEvent>>> {
    EVENTS
        .get_or_init(|| Arc::new(Mutex::new(Vec::new())))
        .clone()
}

/// Pull one sample value out of a Prometheus text body.
pub fn sample(body: &str, series: &str) -> Option<f64> {
    body.lines()
        .filter(|line| !line.starts_with('#'))
        .find_map(|line| {
            let (name, value) = line.rsplit_once(' ')?;
            (name == series).then(|| value.parse().ok()).flatten()
        })
}
