//! Decoding of temperature telemetry published by the sensor broker.
//!
//! Sensors publish either a JSON object or a bare number:
//!
//! ```text
//! {"temperature": 23.5, "timestamp": "2025-01-01T10:00:00Z"}
//! {"temperature": 23.5, "observedAt": 1735725600000}
//! 23.5
//! ```
//!
//! Anything else is rejected. In particular a missing or non-numeric
//! temperature is an error, never a zero reading.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ProtocolError;

/// One decoded temperature measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
    /// Degrees Celsius.
    pub temperature: f64,
    /// When the sensor took the measurement, or when it was received if the
    /// payload carried no timestamp.
    pub observed_at: DateTime<Utc>,
}

impl SensorReading {
    /// Decodes one broker payload.
    ///
    /// `received_at` is used as `observed_at` when the payload has no
    /// timestamp of its own.
    ///
    /// # Errors
    /// - `ProtocolError::Decode`: the payload is not valid JSON
    /// - `ProtocolError::InvalidReading`: valid JSON, but not a reading
    pub fn decode(
        payload: &[u8],
        received_at: DateTime<Utc>,
    ) -> Result<Self, ProtocolError> {
        let text = std::str::from_utf8(payload)
            .map_err(|_| invalid("payload is not valid UTF-8"))?
            .trim();
        if text.is_empty() {
            return Err(invalid("empty payload"));
        }

        let value: Value = serde_json::from_str(text).map_err(ProtocolError::Decode)?;

        let (temperature, observed_at) = match &value {
            Value::Number(_) => (number(&value)?, received_at),
            Value::Object(fields) => {
                let temperature = fields
                    .get("temperature")
                    .ok_or_else(|| invalid("missing temperature field"))?;
                let timestamp = fields.get("timestamp").or_else(|| fields.get("observedAt"));
                let observed_at = match timestamp {
                    Some(ts) => timestamp_of(ts)?,
                    None => received_at,
                };
                (number(temperature)?, observed_at)
            }
            _ => return Err(invalid("expected a number or an object")),
        };

        Ok(Self {
            temperature,
            observed_at,
        })
    }
}

fn number(value: &Value) -> Result<f64, ProtocolError> {
    let n = value
        .as_f64()
        .ok_or_else(|| invalid(format!("temperature is not a number: {value}")))?;
    if !n.is_finite() {
        return Err(invalid("temperature is not finite"));
    }
    Ok(n)
}

fn timestamp_of(value: &Value) -> Result<DateTime<Utc>, ProtocolError> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| invalid(format!("bad timestamp {s:?}: {e}"))),
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .ok_or_else(|| invalid(format!("bad epoch timestamp {n}"))),
        other => Err(invalid(format!("bad timestamp {other}"))),
    }
}

fn invalid(reason: impl Into<String>) -> ProtocolError {
    ProtocolError::InvalidReading(reason.into())
}
