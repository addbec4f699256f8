//! Guide timestamp parsing

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use super::EpgError;

lazy_static! {
    /// `yyyyMMddHHmmss` with an optional signed 4-digit offset
    static ref XMLTV_TIME_REGEX: Regex =
        Regex::new(r"^(\d{14})(?:\s*([+-])(\d{2})(\d{2}))?$").unwrap();
}

/// Integers below this are epoch seconds, at or above it epoch millis
const MILLIS_THRESHOLD: i64 = 100_000_000_000;

fn time_error(value: &str) -> EpgError {
    EpgError::TimeParse {
        value: value.to_string(),
    }
}

/// Parse an XMLTV timestamp to epoch millis. A missing offset means UTC.
pub fn parse_xmltv_time(value: &str) -> Result<i64, EpgError> {
    let trimmed = value.trim();
    let caps = XMLTV_TIME_REGEX
        .captures(trimmed)
        .ok_or_else(|| time_error(value))?;

    let naive = NaiveDateTime::parse_from_str(&caps[1], "%Y%m%d%H%M%S")
        .map_err(|_| time_error(value))?;

    let offset_secs = match (caps.get(2), caps.get(3), caps.get(4)) {
        (Some(sign), Some(hours), Some(minutes)) => {
            let hours: i32 = hours.as_str().parse().map_err(|_| time_error(value))?;
            let minutes: i32 = minutes.as_str().parse().map_err(|_| time_error(value))?;
            if hours > 23 || minutes > 59 {
                return Err(time_error(value));
            }
            let secs = hours * 3600 + minutes * 60;
            if sign.as_str() == "-" {
                -secs
            } else {
                secs
            }
        }
        _ => 0,
    };

    let offset = FixedOffset::east_opt(offset_secs).ok_or_else(|| time_error(value))?;
    let instant = offset
        .from_local_datetime(&naive)
        .single()
        .ok_or_else(|| time_error(value))?;

    Ok(instant.timestamp_millis())
}

fn from_epoch(n: i64) -> i64 {
    if n.abs() < MILLIS_THRESHOLD {
        n * 1000
    } else {
        n
    }
}

/// Parse a JSON guide time: epoch number (seconds or millis), numeric
/// string, XMLTV string or RFC 3339 string.
pub fn parse_json_time(value: &Value) -> Result<i64, EpgError> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .map(from_epoch)
            .ok_or_else(|| time_error(&n.to_string())),
        Value::String(s) => {
            let s = s.trim();
            if !s.is_empty() && s.len() != 14 && s.chars().all(|c| c.is_ascii_digit()) {
                return s.parse::<i64>().map(from_epoch).map_err(|_| time_error(s));
            }
            parse_xmltv_time(s).or_else(|_| {
                DateTime::parse_from_rfc3339(s)
                    .map(|dt| dt.timestamp_millis())
                    .map_err(|_| time_error(s))
            })
        }
        other => Err(time_error(&other.to_string())),
    }
}
