//! # Reading Validator
//!
//! Normalizes an untyped payload into a `Reading`. Rejections are returned as
//! values so every caller (HTTP handler, line reader) can report them its own
//! way.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::reading::Reading;

/// Why a payload was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "reason", content = "field", rename_all = "camelCase")]
pub enum RejectReason {
    /// The field is absent or `null`.
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    /// The field is present but is not a finite number.
    #[error("field `{0}` is not a finite number")]
    NotNumeric(&'static str),
}

impl RejectReason {
    /// Name of the offending field.
    pub fn field(&self) -> &'static str {
        match self {
            RejectReason::MissingField(field) | RejectReason::NotNumeric(field) => field,
        }
    }
}

/// Validates `raw`, stamping it with the current time when it carries no
/// usable timestamp.
pub fn validate(raw: &Value) -> Result<Reading, RejectReason> {
    validate_at(raw, Utc::now())
}

/// Same as [`validate`] with an explicit receipt time.
pub fn validate_at(raw: &Value, now: DateTime<Utc>) -> Result<Reading, RejectReason> {
    let distance = numeric_field(raw, "distance")?;
    let tds = numeric_field(raw, "tds")?;
    let timestamp = raw.get("timestamp").and_then(parse_timestamp).unwrap_or(now);

    Ok(Reading::new(distance, tds, timestamp))
}

fn numeric_field(raw: &Value, field: &'static str) -> Result<f64, RejectReason> {
    let value = match raw.get(field) {
        None | Some(Value::Null) => return Err(RejectReason::MissingField(field)),
        Some(value) => value,
    };

    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match number {
        Some(n) if n.is_finite() => Ok(n),
        _ => Err(RejectReason::NotNumeric(field)),
    }
}

// ISO 8601 strings (a missing offset means UTC) or integer epoch milliseconds.
// Anything else, or an instant outside years 0000-9999, is ignored.
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let parsed = match value {
        Value::String(s) => parse_iso8601(s.trim()),
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    };
    parsed.filter(|ts| (0..=9999).contains(&ts.year()))
}

fn parse_iso8601(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = s.parse::<NaiveDateTime>() {
        return Some(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    s.parse::<NaiveDate>()
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
