use crate::source::error::SourceError;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

const HEAD_LEN: usize = 262;

/// Leading signatures of the archive formats log rotation commonly produces.
const SIGNATURES: &[(&str, usize, &[u8])] = &[
    ("gzip", 0, &[0x1f, 0x8b]),
    ("zip", 0, b"PK\x03\x04"),
    ("zip", 0, b"PK\x05\x06"),
    ("bzip2", 0, b"BZh"),
    ("xz", 0, &[0xfd, b'7', b'z', b'X', b'Z', 0x00]),
    ("zstd", 0, &[0x28, 0xb5, 0x2f, 0xfd]),
    ("7z", 0, &[b'7', b'z', 0xbc, 0xaf, 0x27, 0x1c]),
    ("rar", 0, b"Rar!\x1a\x07"),
    ("lz4", 0, &[0x04, 0x22, 0x4d, 0x18]),
    ("tar", 257, b"ustar"),
];

/// Make sure `path` is a plain, uncompressed file we can follow.
pub fn check_log_file(path: &Path) -> Result<(), SourceError> {
    tracing::info!(file = %path.display(), "checking file");

    let meta = fs::metadata(path).map_err(|e| SourceError::stat(path, e))?;
    if meta.is_dir() {
        return Err(SourceError::IsDirectory {
            path: path.to_path_buf(),
        });
    }

    let mut head = Vec::with_capacity(HEAD_LEN);
    File::open(path)
        .map_err(|e| SourceError::open(path, e))?
        .take(HEAD_LEN as u64)
        .read_to_end(&mut head)?;

    if let Some(format) = archive_format(&head) {
        return Err(SourceError::Archive {
            path: path.to_path_buf(),
            format,
        });
    }

    Ok(())
}

pub(crate) fn archive_format(head: &[u8]) -> Option<&'static str> {
    SIGNATURES
        .iter()
        .find(|(_, offset, magic)| {
            head.get(*offset..offset + magic.len())
                .is_some_and(|bytes| bytes == *magic)
        })
        .map(|(format, _, _)| *format)
}
