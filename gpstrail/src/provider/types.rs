//! Provider payloads, request parameters and the provider trait.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::time::EpochMillis;

/// Default interval between location updates (2 seconds).
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_millis(2000);

/// Position sample as reported by the provider, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFix {
    /// Acquisition time, epoch milliseconds.
    pub time: EpochMillis,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Altitude in meters.
    pub altitude: f64,
    /// Bearing in degrees, if measured.
    pub bearing: Option<f32>,
    /// Speed in m/s, if measured.
    pub speed: Option<f32>,
    /// Horizontal accuracy in meters, if measured.
    pub accuracy: Option<f32>,
}

impl RawFix {
    /// Sample with coordinates only.
    pub fn new(time: EpochMillis, latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            time,
            latitude,
            longitude,
            altitude,
            bearing: None,
            speed: None,
            accuracy: None,
        }
    }
}

/// Event pushed by a provider.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    /// A batch of location results; the last entry is the most recent.
    Locations(Vec<RawFix>),
    /// Location availability changed.
    Availability {
        /// False when the provider cannot produce a location (radio off,
        /// permission revoked, no satellites).
        available: bool,
    },
}

/// Accuracy/power trade-off requested from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocationPriority {
    /// Most accurate location available (GPS).
    #[default]
    HighAccuracy,
    /// Block-level accuracy.
    BalancedPowerAccuracy,
    /// City-level accuracy.
    LowPower,
    /// Only piggy-back on locations requested by others.
    Passive,
}

impl std::fmt::Display for LocationPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HighAccuracy => write!(f, "high_accuracy"),
            Self::BalancedPowerAccuracy => write!(f, "balanced"),
            Self::LowPower => write!(f, "low_power"),
            Self::Passive => write!(f, "passive"),
        }
    }
}

impl std::str::FromStr for LocationPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high_accuracy" | "high" => Ok(Self::HighAccuracy),
            "balanced" => Ok(Self::BalancedPowerAccuracy),
            "low_power" | "low" => Ok(Self::LowPower),
            "passive" => Ok(Self::Passive),
            other => Err(format!("unknown location priority '{}'", other)),
        }
    }
}

/// Parameters of a location subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationRequest {
    /// Desired interval between updates.
    pub interval: Duration,
    /// Fastest interval the consumer can handle.
    pub fastest_interval: Duration,
    /// Accuracy/power trade-off.
    pub priority: LocationPriority,
    /// Maximum time the provider may hold updates to batch them.
    /// Zero asks for immediate delivery.
    pub max_wait: Duration,
}

impl LocationRequest {
    /// High-accuracy request at `interval` with batching disabled.
    pub fn high_accuracy(interval: Duration) -> Self {
        Self {
            interval,
            fastest_interval: interval,
            priority: LocationPriority::HighAccuracy,
            max_wait: Duration::ZERO,
        }
    }

    /// True when the provider is asked not to buffer updates.
    pub fn is_unbuffered(&self) -> bool {
        self.max_wait.is_zero()
    }
}

impl Default for LocationRequest {
    fn default() -> Self {
        Self::high_accuracy(DEFAULT_UPDATE_INTERVAL)
    }
}

/// Errors reported when subscribing to a provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The process lacks location permission.
    #[error("location permission not granted")]
    PermissionDenied,

    /// The provider cannot serve requests right now.
    #[error("location provider unavailable: {0}")]
    Unavailable(String),

    /// A subscription is already active on this provider.
    #[error("location updates already requested")]
    AlreadySubscribed,
}

/// External positioning provider.
///
/// Implementations push [`ProviderEvent`]s into the given channel at the
/// requested cadence until [`remove_location_updates`] is called.
///
/// [`remove_location_updates`]: LocationProvider::remove_location_updates
pub trait LocationProvider: Send + Sync {
    /// Start delivering events for `request` into `events`.
    fn request_location_updates(
        &self,
        request: &LocationRequest,
        events: mpsc::Sender<ProviderEvent>,
    ) -> Result<(), ProviderError>;

    /// Stop delivering events. Safe to call when not subscribed.
    fn remove_location_updates(&self);
}
