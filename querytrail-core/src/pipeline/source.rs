use crate::source::{LogTail, SourceError};
use std::time::Duration;

/// Anything the pipeline can pull log lines from.
pub trait LineSource {
    /// Next complete line, or `Ok(None)` when nothing is available yet.
    fn try_next_line(&mut self) -> Result<Option<String>, SourceError>;

    /// How long to wait after an empty read.
    fn poll_interval(&self) -> Duration;

    fn close(&mut self);
}

impl LineSource for LogTail {
    fn try_next_line(&mut self) -> Result<Option<String>, SourceError> {
        LogTail::try_next_line(self)
    }

    fn poll_interval(&self) -> Duration {
        LogTail::poll_interval(self)
    }

    fn close(&mut self) {
        LogTail::close(self)
    }
}
