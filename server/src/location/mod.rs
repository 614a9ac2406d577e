//! Customer location
//! Single-shot, permission-gated position queries with a hard timeout.

#[macro_use]
pub mod macros;

use crate::tracking::Coordinate;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;

/// Default wait for a position fix
pub const DEFAULT_LOCATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Reasons the customer's location could not be acquired
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LocationError {
    /// No location capability available
    Unsupported,

    /// The customer refused to share their location
    PermissionDenied,

    /// The platform could not determine a position
    PositionUnavailable,

    /// No fix within the configured timeout
    Timeout,

    /// Anything else the platform reported
    Unknown,

    /// Location was already requested for this delivery
    AlreadyRequested,
}

impl std::fmt::Display for LocationError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            LocationError::Unsupported => {
                write!(f, "Location services are not available on this device.")
            }
            LocationError::PermissionDenied => write!(
                f,
                "Location access was denied. Please allow location access to track your delivery."
            ),
            LocationError::PositionUnavailable => {
                write!(f, "Your current position could not be determined.")
            }
            LocationError::Timeout => write!(f, "Finding your location took too long."),
            LocationError::Unknown => {
                write!(f, "An unknown error occurred while finding your location.")
            }
            LocationError::AlreadyRequested => {
                write!(f, "Your location was already requested for this delivery.")
            }
        }
    }
}

impl std::error::Error for LocationError {}

/// Options for a position query
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LocationRequest {
    /// Ask for the most accurate fix available
    pub high_accuracy: bool,

    /// Hard limit on the wait for a fix
    pub timeout: Duration,

    /// Oldest cached fix accepted, zero requires a fresh fix
    pub maximum_age: Duration,
}

impl Default for LocationRequest {
    fn default() -> Self {
        LocationRequest {
            high_accuracy: true,
            timeout: DEFAULT_LOCATION_TIMEOUT,
            maximum_age: Duration::ZERO,
        }
    }
}

/// A raw position reported by a provider
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Fix {
    /// Latitude in degrees
    pub latitude: f64,

    /// Longitude in degrees
    pub longitude: f64,

    /// Accuracy radius in meters, if known
    pub accuracy_meters: Option<f64>,
}

/// A platform location capability
pub trait LocationProvider: Send + Sync {
    /// Query the current position. Implementations handle their own
    /// permission prompt; the timeout is enforced by the caller.
    fn current_position<'a>(
        &'a self,
        request: &'a LocationRequest,
    ) -> BoxFuture<'a, Result<Fix, LocationError>>;
}

/// A position known ahead of time, e.g. a geocoded delivery address
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FixedLocation {
    fix: Fix,
}

impl FixedLocation {
    /// Provider that always reports `latitude`/`longitude`
    pub fn new(latitude: f64, longitude: f64) -> Self {
        FixedLocation {
            fix: Fix {
                latitude,
                longitude,
                accuracy_meters: None,
            },
        }
    }
}

impl LocationProvider for FixedLocation {
    fn current_position<'a>(
        &'a self,
        _request: &'a LocationRequest,
    ) -> BoxFuture<'a, Result<Fix, LocationError>> {
        Box::pin(async move { Ok(self.fix) })
    }
}

/// Turns provider fixes into validated destinations
#[derive(Clone)]
pub struct LocationAcquirer {
    provider: Option<Arc<dyn LocationProvider>>,
    request: LocationRequest,
}

impl std::fmt::Debug for LocationAcquirer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationAcquirer")
            .field("supported", &self.provider.is_some())
            .field("request", &self.request)
            .finish()
    }
}

impl LocationAcquirer {
    /// Acquirer backed by `provider`; `None` means the platform has no
    /// location capability.
    pub fn new(provider: Option<Arc<dyn LocationProvider>>, request: LocationRequest) -> Self {
        LocationAcquirer { provider, request }
    }

    /// Options used for every query
    pub fn request(&self) -> &LocationRequest {
        &self.request
    }

    /// Query the provider once.
    ///
    /// Fixes outside the valid coordinate ranges are reported as
    /// [`LocationError::PositionUnavailable`].
    pub async fn acquire(&self) -> Result<Coordinate, LocationError> {
        let Some(provider) = &self.provider else {
            location_warn!("(acquire) no location provider available.");
            return Err(LocationError::Unsupported);
        };

        location_debug!("(acquire) requesting position: {:?}", self.request);
        let fix = match tokio::time::timeout(
            self.request.timeout,
            provider.current_position(&self.request),
        )
        .await
        {
            Ok(Ok(fix)) => fix,
            Ok(Err(e)) => {
                location_warn!("(acquire) provider failed: {:?}", e);
                return Err(e);
            }
            Err(_) => {
                location_warn!(
                    "(acquire) no position within {:?}.",
                    self.request.timeout
                );
                return Err(LocationError::Timeout);
            }
        };

        Coordinate::new(fix.latitude, fix.longitude).map_err(|e| {
            location_error!("(acquire) provider returned an invalid fix {:?}: {}", fix, e);
            LocationError::PositionUnavailable
        })
    }
}
