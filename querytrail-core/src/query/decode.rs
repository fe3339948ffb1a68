use crate::query::patterns::{RawEvent, RawFailed, RawMemoryPeak, RawStarted, RawStats};
use crate::query::types::{FailedEvent, MemoryPeakEvent, QueryEvent, StartedEvent, StatsEvent};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeKind {
    Timestamp,
    Bytes,
    Int,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("can't convert {field} '{raw}' ({kind:?})")]
pub struct DecodeError {
    pub field: &'static str,
    pub raw: String,
    pub kind: DecodeKind,
}

impl DecodeError {
    fn new(field: &'static str, raw: &str, kind: DecodeKind) -> Self {
        Self {
            field,
            raw: raw.to_string(),
            kind,
        }
    }

    /// Internal-error label identifying the conversion that failed.
    pub fn category(&self) -> &'static str {
        match self.kind {
            DecodeKind::Timestamp => "convert_timestamp",
            DecodeKind::Bytes => "convert_bytes",
            DecodeKind::Int => "convert_int",
        }
    }
}

/// Parse `YYYY.MM.DD hh:mm:ss.ffffff`. Date parts may be separated by `.`, `-` or `/`,
/// the year has at most 4 digits and the fraction 1 to 6 digits.
pub fn decode_timestamp(field: &'static str, raw: &str) -> Result<NaiveDateTime, DecodeError> {
    let err = || DecodeError::new(field, raw, DecodeKind::Timestamp);

    let (date, time) = raw.trim().split_once(' ').ok_or_else(err)?;

    let mut parts = date.split(['.', '-', '/']);
    let year = number::<i32>(parts.next(), 4).ok_or_else(err)?;
    let month = number::<u32>(parts.next(), 2).ok_or_else(err)?;
    let day = number::<u32>(parts.next(), 2).ok_or_else(err)?;
    if parts.next().is_some() {
        return Err(err());
    }

    let (clock, fraction) = time.split_once('.').ok_or_else(err)?;
    let mut parts = clock.split(':');
    let hour = number::<u32>(parts.next(), 2).ok_or_else(err)?;
    let minute = number::<u32>(parts.next(), 2).ok_or_else(err)?;
    let second = number::<u32>(parts.next(), 2).ok_or_else(err)?;
    if parts.next().is_some() {
        return Err(err());
    }

    let digits = fraction.len();
    let fraction = number::<u32>(Some(fraction), 6).ok_or_else(err)?;
    let micros = fraction * 10u32.pow((6 - digits) as u32);

    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(err)?;
    let time = NaiveTime::from_hms_micro_opt(hour, minute, second, micros).ok_or_else(err)?;

    Ok(NaiveDateTime::new(date, time))
}

fn number<T: std::str::FromStr>(part: Option<&str>, max_digits: usize) -> Option<T> {
    let part = part?;
    if part.is_empty() || part.len() > max_digits || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}

/// Parse a human readable size such as `5.00 MiB`, `1GiB` or `12 B` into bytes.
///
/// Every unit prefix is binary: `K`, `KB` and `KiB` all mean 1024.
/// Fractional results are truncated to whole bytes.
pub fn decode_bytes(field: &'static str, raw: &str) -> Result<u64, DecodeError> {
    let err = || DecodeError::new(field, raw, DecodeKind::Bytes);

    let compact: String = raw.split_whitespace().collect();
    let split = compact
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .ok_or_else(err)?;
    let (value, unit) = compact.split_at(split);

    if value.is_empty() {
        return Err(err());
    }
    let value: f64 = value.parse().map_err(|_| err())?;

    let multiplier: u64 = match unit.to_ascii_uppercase().as_str() {
        "B" => 1,
        "K" | "KB" | "KIB" => 1 << 10,
        "M" | "MB" | "MIB" => 1 << 20,
        "G" | "GB" | "GIB" => 1 << 30,
        "T" | "TB" | "TIB" => 1 << 40,
        "P" | "PB" | "PIB" => 1 << 50,
        "E" | "EB" | "EIB" => 1 << 60,
        _ => return Err(err()),
    };

    let bytes = value * multiplier as f64;
    if !bytes.is_finite() || bytes >= u64::MAX as f64 {
        return Err(err());
    }

    Ok(bytes as u64)
}

pub fn decode_int(field: &'static str, raw: &str) -> Result<i64, DecodeError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| DecodeError::new(field, raw, DecodeKind::Int))
}

/// Rows per second are printed with a fractional part by some server versions.
/// The value is truncated towards zero.
pub fn decode_rate(field: &'static str, raw: &str) -> Result<i64, DecodeError> {
    if let Ok(v) = decode_int(field, raw) {
        return Ok(v);
    }

    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v.abs() < i64::MAX as f64 => Ok(v as i64),
        _ => Err(DecodeError::new(field, raw, DecodeKind::Int)),
    }
}

pub fn decode_started(raw: &RawStarted<'_>) -> Result<StartedEvent, DecodeError> {
    Ok(StartedEvent {
        id: raw.id.to_string(),
        pid: decode_int("pid", raw.pid)?,
        port: decode_int("port", raw.port)?,
        ts: decode_timestamp("dt", raw.dt)?,
        host: raw.host.to_string(),
        query: raw.query.to_string(),
    })
}

pub fn decode_stats(raw: &RawStats<'_>) -> Result<StatsEvent, DecodeError> {
    Ok(StatsEvent {
        id: raw.id.to_string(),
        bytes_read: decode_bytes("bytes", raw.bytes)?,
        bytes_per_second: decode_bytes("speed", raw.speed)?,
        rows_read: decode_int("rows", raw.rows)?,
        rows_per_second: decode_rate("rps", raw.rps)?,
    })
}

pub fn decode_memory_peak(raw: &RawMemoryPeak<'_>) -> Result<MemoryPeakEvent, DecodeError> {
    Ok(MemoryPeakEvent {
        id: raw.id.to_string(),
        ts: decode_timestamp("dt", raw.dt)?,
        memory: decode_bytes("bytes", raw.bytes)?,
    })
}

pub fn decode_failed(raw: &RawFailed<'_>) -> Result<FailedEvent, DecodeError> {
    Ok(FailedEvent {
        id: raw.id.to_string(),
        code: decode_int("code", raw.code)?,
        message: raw.message.to_string(),
    })
}

pub fn decode_event(raw: &RawEvent<'_>) -> Result<QueryEvent, DecodeError> {
    match raw {
        RawEvent::Started(e) => decode_started(e).map(QueryEvent::Started),
        RawEvent::Stats(e) => decode_stats(e).map(QueryEvent::Stats),
        RawEvent::Failed(e) => decode_failed(e).map(QueryEvent::Failed),
        RawEvent::MemoryPeak(e) => decode_memory_peak(e).map(QueryEvent::MemoryPeak),
    }
}
