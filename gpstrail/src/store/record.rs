//! Stored representation of a fix.
//!
//! Optional measurements are persisted as text: the decimal numeral of the
//! value, or the empty string when it was not measured. Decoding maps the
//! empty string back to `None`, so an absent measurement never comes back as
//! zero.

use crate::fix::{Fix, FixKind, UNKNOWN_COORDINATE};

use super::types::RecordError;

/// Identifier used for records that have not been assigned one by the store.
pub const UNASSIGNED_ID: i64 = 0;

/// Row of the location table.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    /// Store-assigned identifier ([`UNASSIGNED_ID`] before insertion).
    pub id: i64,
    /// Acquisition time, epoch milliseconds.
    pub acquisition_time: i64,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Altitude in meters.
    pub altitude: f64,
    /// Bearing numeral or empty.
    pub bearing: String,
    /// Accuracy numeral or empty.
    pub accuracy: String,
    /// Speed numeral or empty.
    pub speed: String,
}

impl StoredRecord {
    /// Encode a fix as a new, unassigned record.
    pub fn from_fix(fix: &Fix) -> Self {
        Self {
            id: UNASSIGNED_ID,
            acquisition_time: fix.timestamp,
            latitude: fix.latitude,
            longitude: fix.longitude,
            altitude: fix.altitude,
            bearing: encode_measurement(fix.bearing),
            accuracy: encode_measurement(fix.accuracy),
            speed: encode_measurement(fix.speed),
        }
    }

    /// Decode back into a fix.
    ///
    /// A record with no measurements and all coordinates at the unknown
    /// sentinel is restored as a placeholder.
    pub fn to_fix(&self) -> Result<Fix, RecordError> {
        let bearing = decode_measurement(self.id, "bearing", &self.bearing)?;
        let accuracy = decode_measurement(self.id, "accuracy", &self.accuracy)?;
        let speed = decode_measurement(self.id, "speed", &self.speed)?;

        // A measured fix at exactly 0/0/0 with no measurements is stored
        // identically and also comes back as a placeholder.
        let is_placeholder = bearing.is_none()
            && accuracy.is_none()
            && speed.is_none()
            && self.latitude == UNKNOWN_COORDINATE
            && self.longitude == UNKNOWN_COORDINATE
            && self.altitude == UNKNOWN_COORDINATE;

        if is_placeholder {
            return Ok(Fix::placeholder(self.acquisition_time));
        }

        Ok(Fix {
            timestamp: self.acquisition_time,
            latitude: self.latitude,
            longitude: self.longitude,
            altitude: self.altitude,
            bearing,
            speed,
            accuracy,
            kind: FixKind::Measured,
        })
    }

    /// Copy of this record with a store-assigned identifier.
    pub fn with_id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }
}

/// Encode an optional measurement: its decimal numeral, or `""` when absent.
pub fn encode_measurement(value: Option<f32>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => String::new(),
    }
}

/// Decode an optional measurement column.
///
/// Empty (or whitespace-only) text is `None`. Anything else must parse as a
/// finite decimal numeral.
pub fn decode_measurement(
    id: i64,
    field: &'static str,
    text: &str,
) -> Result<Option<f32>, RecordError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    match trimmed.parse::<f32>() {
        Ok(value) if value.is_finite() => Ok(Some(value)),
        _ => Err(RecordError::MalformedMeasurement {
            id,
            field,
            value: text.to_string(),
        }),
    }
}
