use crate::source::error::SourceError;
use std::fs::{self, File, Metadata};
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartPosition {
    Beginning,
    #[default]
    End,
}

#[derive(Debug, Clone, Copy)]
pub struct TailOptions {
    pub start: StartPosition,
    /// How long callers should wait after an empty read before polling again.
    pub poll_interval: Duration,
}

impl Default for TailOptions {
    fn default() -> Self {
        Self {
            start: StartPosition::End,
            poll_interval: Duration::from_millis(250),
        }
    }
}

/// Identity of the file behind a path, used to notice rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileId {
    dev: u64,
    ino: u64,
}

impl FileId {
    #[cfg(unix)]
    fn of(meta: &Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(Self {
            dev: meta.dev(),
            ino: meta.ino(),
        })
    }

    #[cfg(not(unix))]
    fn of(_meta: &Metadata) -> Option<Self> {
        None
    }
}

/// Follows a growing log file line by line.
///
/// Rotation (the path now names a different file) reopens the new file from its start;
/// truncation (the file shrank below the read offset) rewinds. A trailing line without
/// its newline is held back until the rest of it is written.
pub struct LogTail {
    path: PathBuf,
    options: TailOptions,
    reader: Option<BufReader<File>>,
    file_id: Option<FileId>,
    offset: u64,
    pending: Vec<u8>,
}

impl LogTail {
    pub fn open(path: impl Into<PathBuf>, options: TailOptions) -> Result<Self, SourceError> {
        let path = path.into();
        let mut tail = Self {
            path,
            options,
            reader: None,
            file_id: None,
            offset: 0,
            pending: Vec::new(),
        };

        tail.open_file(options.start)?;
        Ok(tail)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn poll_interval(&self) -> Duration {
        self.options.poll_interval
    }

    /// Current read position in the followed file.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Return the next complete line, or `Ok(None)` when nothing new is available yet.
    ///
    /// Errors affect a single call only; the tail keeps following afterwards.
    pub fn try_next_line(&mut self) -> Result<Option<String>, SourceError> {
        if self.reader.is_none() {
            match self.open_file(StartPosition::Beginning) {
                Ok(()) => {}
                // Between rename and create during rotation the path may be missing.
                Err(SourceError::Open { source, .. })
                    if source.kind() == std::io::ErrorKind::NotFound =>
                {
                    return Ok(None);
                }
                Err(e) => return Err(e),
            }
        }

        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };

        let line_start = self.offset - self.pending.len() as u64;
        let read = match reader.read_until(b'\n', &mut self.pending) {
            Ok(read) => read,
            Err(e) => {
                // Reopen at the same offset on the next call.
                self.reader = None;
                return Err(SourceError::Read(e));
            }
        };
        self.offset += read as u64;

        if self.pending.last() == Some(&b'\n') {
            return self.take_pending(line_start).map(Some);
        }

        if read == 0 {
            self.check_rotation(line_start)
        } else {
            Ok(None)
        }
    }

    /// Release the underlying file.
    pub fn close(&mut self) {
        self.reader = None;
        self.file_id = None;
        self.pending.clear();
        tracing::debug!(path = %self.path.display(), "log tail closed");
    }

    fn open_file(&mut self, start: StartPosition) -> Result<(), SourceError> {
        let file = File::open(&self.path).map_err(|e| SourceError::open(&self.path, e))?;
        let meta = file.metadata()?;
        let mut reader = BufReader::new(file);

        let offset = match start {
            StartPosition::Beginning => 0,
            StartPosition::End => reader.seek(SeekFrom::End(0))?,
        };

        if self.file_id.is_some() && self.offset > 0 && start == StartPosition::Beginning {
            // Reopening after a failed read keeps the previous position.
            if self.file_id == FileId::of(&meta) && meta.len() >= self.offset {
                reader.seek(SeekFrom::Start(self.offset))?;
                self.reader = Some(reader);
                return Ok(());
            }
        }

        tracing::debug!(path = %self.path.display(), offset, "log file opened");

        self.reader = Some(reader);
        self.file_id = FileId::of(&meta);
        self.offset = offset;
        self.pending.clear();
        Ok(())
    }

    fn check_rotation(&mut self, line_start: u64) -> Result<Option<String>, SourceError> {
        let meta = match fs::metadata(&self.path) {
            Ok(meta) => meta,
            // Rotated away and not recreated yet; keep draining the old handle.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SourceError::Read(e)),
        };

        let current = FileId::of(&meta);
        if current.is_some() && current != self.file_id {
            tracing::info!(path = %self.path.display(), "log file rotated, reopening");

            // The old file ended without a newline; its last line is complete now.
            let leftover = if self.pending.is_empty() {
                None
            } else {
                Some(self.take_pending(line_start))
            };

            self.reader = None;
            self.file_id = None;
            self.offset = 0;
            self.open_file(StartPosition::Beginning)?;

            return leftover.transpose();
        }

        if meta.len() < self.offset {
            tracing::info!(
                path = %self.path.display(),
                size = meta.len(),
                offset = self.offset,
                "log file truncated, rewinding"
            );
            if let Some(reader) = self.reader.as_mut() {
                reader.seek(SeekFrom::Start(0))?;
            }
            self.offset = 0;
            self.pending.clear();
        }

        Ok(None)
    }

    fn take_pending(&mut self, line_start: u64) -> Result<String, SourceError> {
        let mut bytes = std::mem::take(&mut self.pending);
        if bytes.last() == Some(&b'\n') {
            bytes.pop();
        }
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }

        String::from_utf8(bytes).map_err(|_| SourceError::Decode { offset: line_start })
    }
}
