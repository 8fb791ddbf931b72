//! Position fixes.
//!
//! A [`Fix`] is one immutable position sample. Fixes are created by the
//! ingestion loop from provider payloads ([`RawFix`]), synthesized as
//! placeholders when the provider cannot produce a location, or restored from
//! stored records during recovery.
//!
//! Optional measurements (bearing, speed, accuracy) are `None` when the
//! provider did not report them. An absent measurement is never represented
//! as zero.

use std::time::Duration;

use tracing::debug;

use crate::provider::RawFix;
use crate::time::{duration_to_millis, format_clock_time, EpochMillis};

/// Coordinate value carried by placeholder fixes.
pub const UNKNOWN_COORDINATE: f64 = 0.0;

/// How a fix came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FixKind {
    /// Reported by the positioning provider.
    #[default]
    Measured,
    /// Synthesized while the provider was unavailable; coordinates are the
    /// [`UNKNOWN_COORDINATE`] sentinel and all measurements are absent.
    Placeholder,
}

impl std::fmt::Display for FixKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Measured => write!(f, "Measured"),
            Self::Placeholder => write!(f, "Placeholder"),
        }
    }
}

/// A single position sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Fix {
    /// Acquisition time in epoch milliseconds.
    ///
    /// Not guaranteed to be monotonic across fixes: providers may deliver
    /// out-of-order or synthetic samples.
    pub timestamp: EpochMillis,

    /// Latitude in degrees.
    pub latitude: f64,

    /// Longitude in degrees.
    pub longitude: f64,

    /// Altitude in meters.
    pub altitude: f64,

    /// Bearing in degrees, [0, 360).
    pub bearing: Option<f32>,

    /// Ground speed in meters per second.
    pub speed: Option<f32>,

    /// Horizontal accuracy radius in meters.
    pub accuracy: Option<f32>,

    /// Measured or placeholder.
    pub kind: FixKind,
}

impl Fix {
    /// Create a measured fix with no optional measurements.
    pub fn new(timestamp: EpochMillis, latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            timestamp,
            latitude,
            longitude,
            altitude,
            bearing: None,
            speed: None,
            accuracy: None,
            kind: FixKind::Measured,
        }
    }

    /// Create a placeholder fix carrying only a timestamp.
    pub fn placeholder(timestamp: EpochMillis) -> Self {
        Self {
            timestamp,
            latitude: UNKNOWN_COORDINATE,
            longitude: UNKNOWN_COORDINATE,
            altitude: UNKNOWN_COORDINATE,
            bearing: None,
            speed: None,
            accuracy: None,
            kind: FixKind::Placeholder,
        }
    }

    /// Set the bearing, wrapping it into [0, 360).
    pub fn with_bearing(mut self, bearing: f32) -> Self {
        self.bearing = normalize_bearing(bearing);
        self
    }

    /// Set the ground speed in m/s.
    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = finite(speed);
        self
    }

    /// Set the accuracy radius in meters.
    pub fn with_accuracy(mut self, accuracy: f32) -> Self {
        self.accuracy = finite(accuracy);
        self
    }

    /// True for fixes that carry real coordinates.
    pub fn has_position(&self) -> bool {
        self.kind == FixKind::Measured
    }

    /// True when no optional measurement is present.
    pub fn has_no_measurements(&self) -> bool {
        self.bearing.is_none() && self.speed.is_none() && self.accuracy.is_none()
    }

    /// Age of this fix relative to `now`, in milliseconds.
    ///
    /// Negative when the fix is timestamped in the future.
    pub fn age_at(&self, now: EpochMillis) -> i64 {
        now.saturating_sub(self.timestamp)
    }

    /// A fix is stale once `now - timestamp >= ttl`.
    pub fn is_stale_at(&self, now: EpochMillis, ttl: Duration) -> bool {
        is_stale(self.timestamp, now, ttl)
    }

    /// Acquisition time as `HH:MM:SS` in local time.
    pub fn clock_label(&self) -> String {
        format_clock_time(self.timestamp)
    }
}

impl From<RawFix> for Fix {
    /// Normalize a provider payload.
    ///
    /// Non-finite measurements are dropped, bearing is wrapped into
    /// [0, 360) and a sample without usable coordinates degrades to a
    /// placeholder at the same timestamp.
    fn from(raw: RawFix) -> Self {
        if !raw.latitude.is_finite() || !raw.longitude.is_finite() {
            debug!(
                timestamp = raw.time,
                "Provider fix has no usable coordinates, storing placeholder"
            );
            return Fix::placeholder(raw.time);
        }

        Self {
            timestamp: raw.time,
            latitude: raw.latitude,
            longitude: raw.longitude,
            altitude: if raw.altitude.is_finite() {
                raw.altitude
            } else {
                0.0
            },
            bearing: raw.bearing.and_then(normalize_bearing),
            speed: raw.speed.and_then(finite),
            accuracy: raw.accuracy.and_then(finite),
            kind: FixKind::Measured,
        }
    }
}

/// Staleness rule shared by live eviction and recovery.
pub fn is_stale(timestamp: EpochMillis, now: EpochMillis, ttl: Duration) -> bool {
    now.saturating_sub(timestamp) >= duration_to_millis(ttl)
}

fn finite(value: f32) -> Option<f32> {
    value.is_finite().then_some(value)
}

fn normalize_bearing(bearing: f32) -> Option<f32> {
    let bearing = finite(bearing)?;
    let wrapped = bearing.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    Some(if wrapped >= 360.0 { 0.0 } else { wrapped })
}
