use crate::source::check::archive_format;
use crate::source::{SourceError, check_log_file};
use std::fs;
use tempfile::TempDir;

#[test]
fn plain_and_empty_files_pass() {
    let dir = TempDir::new().unwrap();
    let plain = dir.path().join("server.log");
    let empty = dir.path().join("empty.log");
    fs::write(&plain, "2024.03.01 12:00:00.000000 [ 1 ] {} <Information> Application: Ready\n")
        .unwrap();
    fs::write(&empty, "").unwrap();

    assert!(check_log_file(&plain).is_ok());
    assert!(check_log_file(&empty).is_ok());
}

#[test]
fn missing_file_fails_to_stat() {
    let dir = TempDir::new().unwrap();

    let err = check_log_file(&dir.path().join("nope.log")).unwrap_err();

    assert!(matches!(err, SourceError::Stat { .. }), "got {err:?}");
}

#[test]
fn directory_is_rejected() {
    let dir = TempDir::new().unwrap();

    let err = check_log_file(dir.path()).unwrap_err();

    assert!(matches!(err, SourceError::IsDirectory { .. }), "got {err:?}");
}

#[test]
fn rotated_archive_is_rejected() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("server.log.1.gz");
    fs::write(&path, [0x1f, 0x8b, 0x08, 0x00, 0x00]).unwrap();

    // Act
    let err = check_log_file(&path).unwrap_err();

    // Assert
    match err {
        SourceError::Archive { format, .. } => assert_eq!(format, "gzip"),
        other => panic!("expected archive error, got {other:?}"),
    }
}

#[test]
fn archive_signatures() {
    let mut tar = vec![0_u8; 300];
    tar[257..262].copy_from_slice(b"ustar");

    assert_eq!(archive_format(&[0x28, 0xb5, 0x2f, 0xfd, 0x00]), Some("zstd"));
    assert_eq!(archive_format(b"PK\x03\x04rest"), Some("zip"));
    assert_eq!(archive_format(b"BZh91AY"), Some("bzip2"));
    assert_eq!(archive_format(&tar), Some("tar"));
    assert_eq!(archive_format(b"2024.03.01 12:00:00"), None);
    assert_eq!(archive_format(b""), None);
}
