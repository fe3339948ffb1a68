use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("can't stat log file {path}: {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is a directory")]
    IsDirectory { path: PathBuf },

    #[error("{path} is a {format} archive")]
    Archive { path: PathBuf, format: &'static str },

    #[error("can't open log file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read log file: {0}")]
    Read(#[from] std::io::Error),

    #[error("line at offset {offset} is not valid UTF-8")]
    Decode { offset: u64 },
}

impl SourceError {
    pub fn stat(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Stat {
            path: path.into(),
            source,
        }
    }

    pub fn open(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Open {
            path: path.into(),
            source,
        }
    }
}
