use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;

/// Byte units as printed by the portal. Every step is a factor of 1024.
const BYTE_UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];

static RE_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+):([0-5]\d):([0-5]\d)$").expect("invalid regex: duration")
});

static RE_DATETIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{2}/\d{2}/\d{4} \d{2}:\d{2}:\d{2}$").expect("invalid regex: datetime")
});

static RE_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{2}/\d{2}/\d{4}$").expect("invalid regex: date"));

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversionError {
    #[error("Invalid currency amount: '{0}'")]
    Currency(String),
    #[error("Invalid duration, expected HH:MM:SS: '{0}'")]
    Duration(String),
    #[error("Invalid data volume: '{0}'")]
    Bytes(String),
    #[error("Invalid datetime, expected dd/mm/yyyy HH:MM:SS: '{0}'")]
    DateTime(String),
    #[error("Invalid date, expected dd/mm/yyyy: '{0}'")]
    Date(String),
}

/// Parses amounts such as `$46,52 CUP` or `$25,00`.
///
/// The comma is the decimal separator. When a comma is present any dot is
/// taken as a thousands separator.
pub fn parse_currency(value: &str) -> Result<f64, ConversionError> {
    let err = || ConversionError::Currency(value.to_string());

    let amount = value
        .trim()
        .trim_start_matches('$')
        .split_whitespace()
        .next()
        .ok_or_else(err)?;

    let normalized = if amount.contains(',') {
        amount.replace('.', "").replace(',', ".")
    } else {
        amount.to_string()
    };

    if !normalized
        .chars()
        .all(|c| c.is_ascii_digit() || c == '.' || c == '-')
    {
        return Err(err());
    }

    normalized.parse::<f64>().map_err(|_| err())
}

pub fn format_currency(amount: f64) -> String {
    format!("${:.2}", amount).replace('.', ",")
}

/// `HH:MM:SS` to seconds. Hours are unbounded (`720:00:00` is valid).
pub fn time_to_seconds(value: &str) -> Result<u64, ConversionError> {
    let caps = RE_DURATION
        .captures(value.trim())
        .ok_or_else(|| ConversionError::Duration(value.to_string()))?;

    let field = |i: usize| {
        caps[i]
            .parse::<u64>()
            .map_err(|_| ConversionError::Duration(value.to_string()))
    };

    let (hours, minutes, seconds) = (field(1)?, field(2)?, field(3)?);
    hours
        .checked_mul(3600)
        .and_then(|secs| secs.checked_add(minutes * 60 + seconds))
        .ok_or_else(|| ConversionError::Duration(value.to_string()))
}

pub fn seconds_to_time(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let seconds = seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

/// Parses volumes such as `1,28 GB`, `542,47 KB` or `0 Bytes` into bytes.
///
/// Units are base 1024. A trailing `ps` (as in `KBps`) is ignored.
pub fn parse_bytes(value: &str) -> Result<u64, ConversionError> {
    let err = || ConversionError::Bytes(value.to_string());

    let mut parts = value.split_whitespace();
    let number = parts.next().ok_or_else(err)?;
    let unit = parts.next().ok_or_else(err)?;
    if parts.next().is_some() {
        return Err(err());
    }

    let unit = unit.to_lowercase();
    let unit = unit.strip_suffix("ps").unwrap_or(&unit);
    let exponent = match unit {
        "b" | "byte" | "bytes" => 0,
        "kb" => 1,
        "mb" => 2,
        "gb" => 3,
        "tb" => 4,
        _ => return Err(err()),
    };

    let number: f64 = number.replace(',', ".").parse().map_err(|_| err())?;
    if !number.is_finite() || number.is_sign_negative() {
        return Err(err());
    }

    let bytes = number * 1024f64.powi(exponent);
    if bytes >= u64::MAX as f64 {
        return Err(err());
    }
    Ok(bytes as u64)
}

/// Inverse of [`parse_bytes`]: two decimals at most, comma separated.
pub fn format_bytes(bytes: u64) -> String {
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < BYTE_UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    let formatted = format!("{:.2}", size);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed.replace('.', ","), BYTE_UNITS[unit])
}

pub fn parse_datetime(value: &str) -> Result<NaiveDateTime, ConversionError> {
    let value = value.trim();
    if !RE_DATETIME.is_match(value) {
        return Err(ConversionError::DateTime(value.to_string()));
    }
    NaiveDateTime::parse_from_str(value, "%d/%m/%Y %H:%M:%S")
        .map_err(|_| ConversionError::DateTime(value.to_string()))
}

pub fn parse_date(value: &str) -> Result<NaiveDate, ConversionError> {
    let value = value.trim();
    if !RE_DATE.is_match(value) {
        return Err(ConversionError::Date(value.to_string()));
    }
    NaiveDate::parse_from_str(value, "%d/%m/%Y")
        .map_err(|_| ConversionError::Date(value.to_string()))
}
