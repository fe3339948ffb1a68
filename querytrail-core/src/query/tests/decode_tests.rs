use crate::query::decode::{decode_bytes, decode_int, decode_rate, decode_timestamp};
use crate::query::DecodeKind;
use chrono::{NaiveDate, NaiveDateTime};
use pretty_assertions::assert_eq;

fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32, micro: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, mo, d)
        .and_then(|date| date.and_hms_micro_opt(h, mi, s, micro))
        .expect("valid test timestamp")
}

#[test]
fn timestamp_accepts_every_date_separator() {
    let expected = at(2024, 3, 1, 12, 0, 5, 123_456);

    for raw in [
        "2024.03.01 12:00:05.123456",
        "2024-03-01 12:00:05.123456",
        "2024/03/01 12:00:05.123456",
    ] {
        assert_eq!(decode_timestamp("dt", raw).unwrap(), expected, "raw: {raw}");
    }
}

#[test]
fn timestamp_scales_short_fractions_to_microseconds() {
    // Arrange
    let raw = "2024.03.01 12:00:05.5";

    // Act
    let ts = decode_timestamp("dt", raw).unwrap();

    // Assert
    assert_eq!(ts, at(2024, 3, 1, 12, 0, 5, 500_000));
}

#[test]
fn timestamp_rejects_impossible_dates() {
    for raw in [
        "2024.13.01 12:00:00.000000",
        "2024.02.30 12:00:00.000000",
        "2024.03.01 25:00:00.000000",
        "2024.03.01 12:00:00",
        "2024.03.01 12:00:00.1234567",
        "not a date",
    ] {
        let err = decode_timestamp("dt", raw).unwrap_err();
        assert_eq!(err.kind, DecodeKind::Timestamp, "raw: {raw}");
        assert_eq!(err.category(), "convert_timestamp");
    }
}

#[test]
fn bytes_use_binary_multiples() {
    let cases = [
        ("12 B", 12),
        ("5.00 MiB", 5_242_880),
        ("1 GiB", 1_073_741_824),
        ("1GiB", 1_073_741_824),
        ("2.50 KiB", 2_560),
        ("1 KB", 1_024),
        ("3 k", 3_072),
        ("1.00 TiB", 1_099_511_627_776),
    ];

    for (raw, expected) in cases {
        assert_eq!(decode_bytes("bytes", raw).unwrap(), expected, "raw: {raw}");
    }
}

#[test]
fn bytes_truncate_fractional_results() {
    assert_eq!(decode_bytes("bytes", "1.5 B").unwrap(), 1);
}

#[test]
fn bytes_reject_unknown_units() {
    for raw in ["5.00 XiB", "MiB", "12", ""] {
        let err = decode_bytes("bytes", raw).unwrap_err();
        assert_eq!(err.category(), "convert_bytes", "raw: {raw}");
        assert_eq!(err.field, "bytes");
    }
}

#[test]
fn int_fields_must_be_whole_numbers() {
    assert_eq!(decode_int("code", "241").unwrap(), 241);

    let err = decode_int("code", "24x").unwrap_err();
    assert_eq!(err.category(), "convert_int");
    assert_eq!(err.raw, "24x");
}

#[test]
fn rate_truncates_fractional_values() {
    assert_eq!(decode_rate("rps", "2500").unwrap(), 2_500);
    assert_eq!(decode_rate("rps", "2500.9").unwrap(), 2_500);
    assert!(decode_rate("rps", "fast").is_err());
}

#[test]
fn decode_event_keeps_the_query_id() {
    use crate::query::patterns::{PatternLibrary, RegexPatterns};
    use crate::query::tests::fixtures::{T0_END, memory};
    use crate::query::QueryEvent;
    use crate::query::decode::decode_event;

    let line = memory("mem-1", T0_END, "3 KiB");
    let raw = RegexPatterns.classify(&line).expect("memory line should classify");

    let event = decode_event(&raw).unwrap();

    assert_eq!(event.id(), "mem-1");
    match event {
        QueryEvent::MemoryPeak(peak) => assert_eq!(peak.memory, 3_072),
        other => panic!("expected memory peak, got {other:?}"),
    }
}
