//! # Reading
//!
//! One sensor observation. This is both the persisted record and the payload
//! pushed to live viewers, so its serde shape is the external wire format:
//!
//! ```json
//! { "distance": 55.2, "tds": 210.7, "timestamp": "2024-05-01T12:00:00.000Z" }
//! ```

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// A validated sensor reading.
///
/// Both measurements are always finite; `validator::validate` is the only
/// place a `Reading` is built from untrusted input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Distance to the water surface, in centimeters.
    pub distance: f64,
    /// Total dissolved solids, in parts per million.
    pub tds: f64,
    /// When the reading was taken (or received, if the producer sent none).
    #[serde(with = "iso_millis")]
    pub timestamp: DateTime<Utc>,
}

impl Reading {
    /// Builds a reading from already-checked parts. The timestamp is
    /// truncated to whole milliseconds, the precision of the wire format.
    pub fn new(distance: f64, tds: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            distance,
            tds,
            timestamp: timestamp.trunc_subsecs(3),
        }
    }
}

/// ISO-8601 with millisecond precision and a `Z` suffix, the format the
/// producers emit (`2024-05-01T12:00:00.000Z`).
pub mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serializes a timestamp as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
    pub fn serialize<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    /// Accepts any RFC 3339 timestamp and normalizes it to UTC.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
