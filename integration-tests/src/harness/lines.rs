//! Builders for server log lines.

pub fn started(id: &str, ts: &str, query: &str) -> String {
    format!("{ts} [ 42 ] {{{id}}} <Debug> executeQuery: (from 127.0.0.1:9000) {query}")
}

pub fn stats(id: &str, ts: &str, rows: u64, size: &str) -> String {
    format!(
        "{ts} [ 42 ] {{{id}}} <Information> executeQuery: Read {rows} rows, {size} in 0.5 sec., {rows} rows/sec., {size}/sec."
    )
}

pub fn memory(id: &str, ts: &str, size: &str) -> String {
    format!("{ts} [ 42 ] {{{id}}} <Debug> MemoryTracker: Peak memory usage (for query): {size}.")
}

pub fn failed(id: &str, ts: &str, code: i64, message: &str) -> String {
    format!("{ts} [ 42 ] {{{id}}} <Error> executeQuery: Code: {code}, e.displayText() = {message}")
}

pub fn noise(ts: &str) -> String {
    format!("{ts} [ 1 ] {{}} <Trace> SystemLog: Flushing system log")
}
