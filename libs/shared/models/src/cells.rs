//! Serde codecs for spreadsheet cells.
//!
//! The remote sheet is loosely typed: numeric-looking columns come back as
//! JSON numbers, booleans as `"TRUE"`/`"FALSE"`, and date/time cells as
//! RFC 3339 timestamps anchored on arbitrary days. These modules are used with
//! `#[serde(with = "...")]` on the row types of each cell.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{de::Error as _, Deserialize, Deserializer, Serializer};
use serde_json::Value;

fn value_to_string(value: Value) -> Result<String, String> {
    match value {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s.trim().to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(format!("expected a scalar cell, found {}", other)),
    }
}

/// `YYYY-MM-DD`, an RFC 3339 timestamp, or a locale date such as `5/1/2024`
/// (day first, falling back to month first when the day-first reading is invalid).
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.contains('/') {
        let date_part = raw.split(|c: char| c == ',' || c.is_whitespace()).next().unwrap_or(raw);
        return NaiveDate::parse_from_str(date_part, "%d/%m/%Y")
            .or_else(|_| NaiveDate::parse_from_str(date_part, "%m/%d/%Y"))
            .ok();
    }
    let date_part = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    let time_part = match raw.split_once('T') {
        Some((_, rest)) => rest,
        None => raw,
    };
    if let Some(hms) = time_part.get(..8) {
        if let Ok(t) = NaiveTime::parse_from_str(hms, "%H:%M:%S") {
            return Some(t);
        }
    }
    let hm = time_part.get(..5).unwrap_or(time_part);
    NaiveTime::parse_from_str(hm, "%H:%M").ok()
}

/// Strings that may arrive as numbers (national IDs, establishment codes).
pub mod text {
    use super::*;

    pub fn serialize<S: Serializer>(value: &str, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        let value = Value::deserialize(deserializer)?;
        value_to_string(value).map_err(D::Error::custom)
    }
}

pub mod bool_flag {
    use super::*;

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(if *value { "TRUE" } else { "FALSE" })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Bool(b) => Ok(b),
            Value::Null => Ok(false),
            Value::String(s) => match s.trim().to_ascii_uppercase().as_str() {
                "TRUE" | "1" => Ok(true),
                "FALSE" | "0" | "" => Ok(false),
                other => Err(D::Error::custom(format!("invalid boolean cell '{}'", other))),
            },
            other => Err(D::Error::custom(format!("invalid boolean cell {}", other))),
        }
    }
}

pub mod count {
    use super::*;

    pub fn serialize<S: Serializer>(value: &u32, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(*value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        let raw = value_to_string(Value::deserialize(deserializer)?).map_err(D::Error::custom)?;
        if raw.is_empty() {
            return Ok(0);
        }
        raw.parse::<f64>()
            .ok()
            .filter(|n| *n >= 0.0 && n.fract() == 0.0)
            .map(|n| n as u32)
            .ok_or_else(|| D::Error::custom(format!("invalid count cell '{}'", raw)))
    }
}

pub mod date {
    use super::*;

    pub fn serialize<S: Serializer>(value: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.format("%Y-%m-%d").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = value_to_string(Value::deserialize(deserializer)?).map_err(D::Error::custom)?;
        parse_date(&raw).ok_or_else(|| D::Error::custom(format!("invalid date cell '{}'", raw)))
    }
}

pub mod time {
    use super::*;

    pub fn serialize<S: Serializer>(value: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = value_to_string(Value::deserialize(deserializer)?).map_err(D::Error::custom)?;
        parse_time(&raw).ok_or_else(|| D::Error::custom(format!("invalid time cell '{}'", raw)))
    }
}

/// Optional RFC 3339 timestamp; empty cells decode to `None`.
pub mod timestamp {
    use super::*;

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(ts) => serializer.serialize_str(&ts.to_rfc3339()),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw = value_to_string(Value::deserialize(deserializer)?).map_err(D::Error::custom)?;
        if raw.is_empty() {
            return Ok(None);
        }
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| Some(ts.with_timezone(&Utc)))
            .map_err(|e| D::Error::custom(format!("invalid timestamp cell '{}': {}", raw, e)))
    }
}
