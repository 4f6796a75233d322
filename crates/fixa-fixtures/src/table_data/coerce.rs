//! Conversion between fixture cells and database values

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use fixa_core::{SqlType, Value};
use std::iter;

/// How the cells of one column are converted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CellKind {
    Binary,
    Number,
    Boolean,
    /// DATE, TIME or TIMESTAMP
    Temporal(SqlType),
    Text,
}

/// Width of the compact `yyyyMMddHHmmssSSS` form
const COMPACT_LEN: usize = 17;

/// Turn a stored cell into the value bound to the INSERT.
///
/// Text cells are parsed according to the column kind; empty text in a
/// binary, numeric, boolean or date column means NULL. Values that are
/// already typed pass through. `Err` carries the reason only.
pub(crate) fn to_bind_value(kind: CellKind, cell: &Value) -> Result<Value, &'static str> {
    let text = match cell {
        Value::Null => return Ok(Value::Null),
        Value::String(s) | Value::Decimal(s) => s.as_str(),
        Value::Date(d) if matches!(kind, CellKind::Temporal(_)) => {
            return Ok(temporal_value(kind, d.and_time(NaiveTime::MIN)));
        }
        Value::Time(t) if matches!(kind, CellKind::Temporal(_)) => {
            return Ok(temporal_value(kind, NaiveDate::default().and_time(*t)));
        }
        Value::DateTime(dt) if matches!(kind, CellKind::Temporal(_)) => {
            return Ok(temporal_value(kind, *dt));
        }
        other => return Ok(other.clone()),
    };

    match kind {
        CellKind::Text => Ok(Value::String(text.to_string())),
        _ if text.trim().is_empty() => Ok(Value::Null),
        CellKind::Binary => hex::decode(text.trim())
            .map(Value::Bytes)
            .map_err(|_| "invalid hex string"),
        CellKind::Number if is_decimal(text.trim()) => Ok(Value::Decimal(text.trim().to_string())),
        CellKind::Number => Err("invalid number format"),
        CellKind::Boolean => parse_flag(text)
            .map(Value::Bool)
            .ok_or("invalid boolean value"),
        CellKind::Temporal(_) => parse_temporal(text)
            .map(|dt| temporal_value(kind, dt))
            .ok_or("invalid date format"),
    }
}

fn temporal_value(kind: CellKind, dt: NaiveDateTime) -> Value {
    match kind {
        CellKind::Temporal(SqlType::Date) => Value::Date(dt.date()),
        CellKind::Temporal(SqlType::Time) => Value::Time(dt.time()),
        _ => Value::DateTime(dt),
    }
}

/// Canonical form of a value read back from the database
pub(crate) fn normalize_loaded(kind: CellKind, value: Value) -> Value {
    match (kind, value) {
        (_, Value::Null) => Value::Null,
        (CellKind::Binary, Value::Bytes(bytes)) => Value::String(hex::encode_upper(bytes)),
        (CellKind::Number, Value::Int64(n)) => Value::Decimal(n.to_string()),
        (CellKind::Number, Value::Float64(f)) => Value::Decimal(trim_decimal(&f.to_string())),
        (CellKind::Number, Value::String(s) | Value::Decimal(s)) => {
            Value::Decimal(trim_decimal(&s))
        }
        (CellKind::Boolean, Value::Int64(n)) => Value::Bool(n != 0),
        (CellKind::Boolean, Value::String(s)) => match parse_flag(&s) {
            Some(flag) => Value::Bool(flag),
            None => Value::String(s),
        },
        (CellKind::Temporal(sql_type), value) => match temporal_of(&value) {
            Some(dt) => Value::String(format_temporal(sql_type, dt)),
            None => value,
        },
        (_, value) => value,
    }
}

fn temporal_of(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::String(s) => parse_temporal(s),
        Value::Date(d) => Some(d.and_time(NaiveTime::MIN)),
        Value::Time(t) => Some(NaiveDate::default().and_time(*t)),
        Value::DateTime(dt) => Some(*dt),
        _ => None,
    }
}

/// Text used when cells are compared or printed. NULL and omitted cells
/// read as `null`.
pub(crate) fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "null".to_string(),
        Some(Value::Bytes(bytes)) => hex::encode_upper(bytes),
        Some(Value::Date(d)) => d.format("%Y-%m-%d").to_string(),
        Some(Value::Time(t)) => t.format("%H:%M:%S%.3f").to_string(),
        Some(other) => other.to_string(),
    }
}

/// Expected cells written in any accepted form, rewritten the way the
/// database side is loaded so the two compare as text
pub(crate) fn normalize_expected(kind: CellKind, value: &Value) -> Value {
    match (kind, value) {
        (CellKind::Binary, Value::String(s)) => Value::String(s.trim().to_ascii_uppercase()),
        (CellKind::Number, Value::String(s)) if is_decimal(s.trim()) => {
            Value::Decimal(trim_decimal(s))
        }
        (CellKind::Boolean, Value::String(s)) => match parse_flag(s) {
            Some(flag) => Value::Bool(flag),
            None => value.clone(),
        },
        (CellKind::Temporal(_), _) => normalize_loaded(kind, value.clone()),
        _ => value.clone(),
    }
}

pub(crate) fn format_temporal(sql_type: SqlType, dt: NaiveDateTime) -> String {
    let pattern = match sql_type {
        SqlType::Date => "%Y-%m-%d",
        SqlType::Time => "%H:%M:%S%.3f",
        _ => "%Y-%m-%d %H:%M:%S%.3f",
    };
    dt.format(pattern).to_string()
}

/// Parse a date cell.
///
/// A `-` at index 4 selects the SQL timestamp literal `yyyy-MM-dd[ HH:mm:ss[.fff]]`,
/// a `:` at index 2 a bare time of day `HH:mm:ss[.fff]`. Anything else is
/// read as compact `yyyyMMddHHmmssSSS`, right padded with zeros. Fractions
/// are cut or padded to milliseconds.
pub(crate) fn parse_temporal(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    let bytes = text.as_bytes();
    if bytes.len() > 4 && bytes[4] == b'-' {
        parse_timestamp_escape(text)
    } else if bytes.len() > 2 && bytes[2] == b':' {
        parse_time_of_day(text).map(|t| NaiveDate::default().and_time(t))
    } else {
        parse_compact(text)
    }
}

fn parse_timestamp_escape(text: &str) -> Option<NaiveDateTime> {
    let (date, time) = match text.split_once(' ') {
        Some((date, time)) => (date, Some(time.trim())),
        None => (text, None),
    };
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    let time = match time {
        Some(time) => parse_time_of_day(time)?,
        None => NaiveTime::MIN,
    };
    Some(date.and_time(time))
}

fn parse_time_of_day(text: &str) -> Option<NaiveTime> {
    let (hms, fraction) = text.split_once('.').unwrap_or((text, ""));
    if !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let millis: String = fraction.chars().chain(iter::repeat('0')).take(3).collect();
    let millis: u32 = millis.parse().ok()?;
    NaiveTime::parse_from_str(hms, "%H:%M:%S")
        .ok()?
        .with_nanosecond(millis * 1_000_000)
}

fn parse_compact(text: &str) -> Option<NaiveDateTime> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let padded: String = text.chars().chain(iter::repeat('0')).take(COMPACT_LEN).collect();
    let field = |from: usize, to: usize| padded[from..to].parse::<u32>().ok();

    let year = padded[0..4].parse::<i32>().ok()?;
    NaiveDate::from_ymd_opt(year, field(4, 6)?, field(6, 8)?)?.and_hms_milli_opt(
        field(8, 10)?,
        field(10, 12)?,
        field(12, 14)?,
        field(14, 17)?,
    )
}

/// `true/1/on/yes` or `false/0/off/no`, any case
pub(crate) fn parse_flag(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Some(true),
        "false" | "0" | "off" | "no" => Some(false),
        _ => None,
    }
}

/// Exact decimal literal: optional sign, digits with an optional fraction,
/// optional exponent
fn is_decimal(text: &str) -> bool {
    let digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    let unsigned = text.strip_prefix(['+', '-']).unwrap_or(text);
    let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
        Some(at) => (&unsigned[..at], Some(&unsigned[at + 1..])),
        None => (unsigned, None),
    };
    let (int, frac) = mantissa.split_once('.').unwrap_or((mantissa, ""));

    let mantissa_ok = !(int.is_empty() && frac.is_empty()) && digits(int) && digits(frac);
    let exponent_ok = exponent.is_none_or(|e| {
        let e = e.strip_prefix(['+', '-']).unwrap_or(e);
        !e.is_empty() && digits(e)
    });
    mantissa_ok && exponent_ok
}

/// Drop trailing fractional zeros: `1.50` reads `1.5`, `2.00` reads `2`
pub(crate) fn trim_decimal(text: &str) -> String {
    let text = text.trim();
    if !text.contains('.') || text.contains(['e', 'E']) {
        return text.to_string();
    }
    match text.trim_end_matches('0').trim_end_matches('.') {
        "" | "-" | "-0" | "+0" => "0".to_string(),
        trimmed => trimmed.to_string(),
    }
}
