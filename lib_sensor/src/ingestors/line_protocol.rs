//! # Device Line Protocol
//!
//! The device prints one reading per line:
//!
//! ```text
//! distance:42.17,tds:318.5
//! tds:318.5,distance:42.17
//! ```
//!
//! Fields may come in either order and surrounding whitespace is ignored.
//! Unknown `key:value` parts are skipped. The decoded line carries no
//! timestamp; the coordinator stamps it on receipt.

use serde_json::{json, Value};
use thiserror::Error;

/// Why a line was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineError {
    /// One of the two fields never appeared on the line.
    #[error("line has no `{0}` field")]
    MissingField(&'static str),
    /// A field was present but its value is not a finite number.
    #[error("`{field}` value {value:?} is not a finite number")]
    BadNumber {
        /// Field name.
        field: &'static str,
        /// The raw text after the colon.
        value: String,
    },
}

/// Decodes one line into a raw payload `{ "distance": .., "tds": .. }`.
pub fn parse_line(line: &str) -> Result<Value, LineError> {
    let mut distance = None;
    let mut tds = None;

    for part in line.trim().split(',') {
        let Some((key, value)) = part.split_once(':') else {
            continue;
        };
        match key.trim() {
            "distance" => distance = Some(parse_number("distance", value)?),
            "tds" => tds = Some(parse_number("tds", value)?),
            _ => {}
        }
    }

    let distance = distance.ok_or(LineError::MissingField("distance"))?;
    let tds = tds.ok_or(LineError::MissingField("tds"))?;
    Ok(json!({ "distance": distance, "tds": tds }))
}

fn parse_number(field: &'static str, raw: &str) -> Result<f64, LineError> {
    match raw.trim().parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(n),
        _ => Err(LineError::BadNumber {
            field,
            value: raw.trim().to_string(),
        }),
    }
}
