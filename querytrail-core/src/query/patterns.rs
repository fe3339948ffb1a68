//! Line shapes recognised by the exporter.
//!
//! Every relevant server line has the layout
//!
//! ```text
//! <datetime> [ <pid> ] {<query id>} <Level> <component>: <message>
//! ```
//!
//! and only four messages matter: the query start (`executeQuery: (from ...)`),
//! the read statistics (`executeQuery: Read N rows, ...`), the memory peak
//! (`MemoryTracker: Peak memory usage (for query): ...`) and the failure
//! (`executeQuery: Code: N, e.displayText() = ...`). The shapes are disjoint by level
//! and message prefix, so at most one of them matches any line.
//!
//! Captures borrow from the line; decoding into typed values happens in
//! [`crate::query::decode`].

use once_cell::sync::Lazy;
use regex::Regex;

const DATETIME: &str = r"(?P<dt>\d{1,4}[.\-/]\d{1,2}[.\-/]\d{1,4} \d{1,2}:\d{1,2}:\d{1,2}\.\d{1,6})";
const HEADER: &str = r" \[ (?P<pid>\d+) \] \{(?P<id>.*)\} ";

static STARTED_RE: Lazy<Regex> = Lazy::new(|| {
    compile(&format!(
        r"^{DATETIME}{HEADER}<Debug> executeQuery: \(from (?P<host>(?:[0-9]{{1,3}}\.){{3}}[0-9]{{1,3}}):(?P<port>\d+)(?P<additional>.*?)\) (?P<query>.*)$"
    ))
});

static STATS_RE: Lazy<Regex> = Lazy::new(|| {
    compile(&format!(
        r"^{DATETIME}{HEADER}<Information> executeQuery: Read (?P<rows>\d+) rows, (?P<bytes>[.\d]+ \w+) in (?P<elapsed>[.\d]+) sec\., (?P<rps>[.\d]+) rows/sec\., (?P<speed>[.\d]+ \w+)[/\w]+\.$"
    ))
});

static MEMORY_RE: Lazy<Regex> = Lazy::new(|| {
    compile(&format!(
        r"^{DATETIME}{HEADER}<Debug> MemoryTracker: Peak memory usage \(for query\): (?P<bytes>[.\d]+ \w+)\.$"
    ))
});

static FAILED_RE: Lazy<Regex> = Lazy::new(|| {
    compile(&format!(
        r"^{DATETIME}{HEADER}<Error> executeQuery: Code: (?P<code>\d+), e\.displayText\(\) = (?P<message>.*)$"
    ))
});

fn compile(pattern: &str) -> Regex {
    // Patterns are compile-time constants; a failure here is a programming error.
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid line pattern {pattern}: {e}"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawStarted<'a> {
    pub dt: &'a str,
    pub pid: &'a str,
    pub id: &'a str,
    pub host: &'a str,
    pub port: &'a str,
    pub additional: &'a str,
    pub query: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawStats<'a> {
    pub dt: &'a str,
    pub pid: &'a str,
    pub id: &'a str,
    pub rows: &'a str,
    pub bytes: &'a str,
    pub elapsed: &'a str,
    pub rps: &'a str,
    pub speed: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawMemoryPeak<'a> {
    pub dt: &'a str,
    pub pid: &'a str,
    pub id: &'a str,
    pub bytes: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawFailed<'a> {
    pub dt: &'a str,
    pub pid: &'a str,
    pub id: &'a str,
    pub code: &'a str,
    pub message: &'a str,
}

/// A matched line, before any field is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEvent<'a> {
    Started(RawStarted<'a>),
    Stats(RawStats<'a>),
    Failed(RawFailed<'a>),
    MemoryPeak(RawMemoryPeak<'a>),
}

impl RawEvent<'_> {
    pub fn id(&self) -> &str {
        match self {
            RawEvent::Started(e) => e.id,
            RawEvent::Stats(e) => e.id,
            RawEvent::Failed(e) => e.id,
            RawEvent::MemoryPeak(e) => e.id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RawEvent::Started(_) => "initial",
            RawEvent::Stats(_) => "processed",
            RawEvent::Failed(_) => "error",
            RawEvent::MemoryPeak(_) => "memory",
        }
    }
}

/// One matcher per line shape.
pub trait PatternLibrary {
    fn started<'a>(&self, line: &'a str) -> Option<RawStarted<'a>>;
    fn stats<'a>(&self, line: &'a str) -> Option<RawStats<'a>>;
    fn memory_peak<'a>(&self, line: &'a str) -> Option<RawMemoryPeak<'a>>;
    fn failed<'a>(&self, line: &'a str) -> Option<RawFailed<'a>>;

    /// Cheap pre-filter: only debug, information and error lines can match.
    fn is_candidate(&self, line: &str) -> bool {
        line.contains("Debug") || line.contains("Information") || line.contains("Error")
    }

    /// Try every shape in evaluation order; `None` means the line is irrelevant.
    fn classify<'a>(&self, line: &'a str) -> Option<RawEvent<'a>> {
        if !self.is_candidate(line) {
            return None;
        }

        self.started(line)
            .map(RawEvent::Started)
            .or_else(|| self.stats(line).map(RawEvent::Stats))
            .or_else(|| self.failed(line).map(RawEvent::Failed))
            .or_else(|| self.memory_peak(line).map(RawEvent::MemoryPeak))
    }
}

/// Regex-backed [`PatternLibrary`].
#[derive(Debug, Default, Clone, Copy)]
pub struct RegexPatterns;

impl PatternLibrary for RegexPatterns {
    fn started<'a>(&self, line: &'a str) -> Option<RawStarted<'a>> {
        let caps = STARTED_RE.captures(line)?;
        let get = |name| caps.name(name).map_or("", |m| m.as_str());

        Some(RawStarted {
            dt: get("dt"),
            pid: get("pid"),
            id: get("id"),
            host: get("host"),
            port: get("port"),
            additional: get("additional"),
            query: get("query"),
        })
    }

    fn stats<'a>(&self, line: &'a str) -> Option<RawStats<'a>> {
        let caps = STATS_RE.captures(line)?;
        let get = |name| caps.name(name).map_or("", |m| m.as_str());

        Some(RawStats {
            dt: get("dt"),
            pid: get("pid"),
            id: get("id"),
            rows: get("rows"),
            bytes: get("bytes"),
            elapsed: get("elapsed"),
            rps: get("rps"),
            speed: get("speed"),
        })
    }

    fn memory_peak<'a>(&self, line: &'a str) -> Option<RawMemoryPeak<'a>> {
        let caps = MEMORY_RE.captures(line)?;
        let get = |name| caps.name(name).map_or("", |m| m.as_str());

        Some(RawMemoryPeak {
            dt: get("dt"),
            pid: get("pid"),
            id: get("id"),
            bytes: get("bytes"),
        })
    }

    fn failed<'a>(&self, line: &'a str) -> Option<RawFailed<'a>> {
        let caps = FAILED_RE.captures(line)?;
        let get = |name| caps.name(name).map_or("", |m| m.as_str());

        Some(RawFailed {
            dt: get("dt"),
            pid: get("pid"),
            id: get("id"),
            code: get("code"),
            message: get("message"),
        })
    }
}
