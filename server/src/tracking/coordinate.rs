//! Struct definitions and implementations for [`Coordinate`].
//!
//! A [`Coordinate`] can only be obtained through validation, so any
//! value of this type is finite and within the latitude/longitude
//! ranges. Distance helpers live here as well so that path planning and
//! progress calculation share a single distance model.

use geo::Coord;
use ordered_float::OrderedFloat;
use serde::Serialize;

/// Meters per degree of longitude at the equator.
pub const METERS_PER_DEGREE_LONGITUDE: f64 = 111_320.0;

/// Meters per degree of latitude.
pub const METERS_PER_DEGREE_LATITUDE: f64 = 110_540.0;

/// Reasons a pair of values can not be used as a [`Coordinate`]
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum CoordinateError {
    /// Latitude or longitude is NaN or infinite
    NonFinite,

    /// Latitude outside of [-90, 90]
    LatitudeOutOfRange,

    /// Longitude outside of [-180, 180]
    LongitudeOutOfRange,
}

impl std::fmt::Display for CoordinateError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            CoordinateError::NonFinite => write!(f, "Coordinate is not a finite number"),
            CoordinateError::LatitudeOutOfRange => {
                write!(f, "Latitude must be between -90 and 90 degrees")
            }
            CoordinateError::LongitudeOutOfRange => {
                write!(f, "Longitude must be between -180 and 180 degrees")
            }
        }
    }
}

/// A geographic position in degrees.
///
/// Float values are wrapped in [`OrderedFloat`] so coordinates can be
/// compared exactly and used as map keys.
#[derive(Debug, PartialEq, Hash, Eq, Copy, Clone, Serialize)]
pub struct Coordinate {
    latitude: OrderedFloat<f64>,
    longitude: OrderedFloat<f64>,
}

impl Coordinate {
    /// Validate and build a coordinate.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoordinateError> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(CoordinateError::NonFinite);
        }

        if !(-90.0..=90.0).contains(&latitude) {
            return Err(CoordinateError::LatitudeOutOfRange);
        }

        if !(-180.0..=180.0).contains(&longitude) {
            return Err(CoordinateError::LongitudeOutOfRange);
        }

        Ok(Coordinate {
            latitude: OrderedFloat(latitude),
            longitude: OrderedFloat(longitude),
        })
    }

    /// Latitude in degrees
    pub fn latitude(&self) -> f64 {
        self.latitude.into_inner()
    }

    /// Longitude in degrees
    pub fn longitude(&self) -> f64 {
        self.longitude.into_inner()
    }

    /// Linear interpolation towards `other`, `t` is clamped to [0, 1].
    ///
    /// `t == 1` returns `other` exactly.
    pub fn lerp(&self, other: &Coordinate, t: f64) -> Result<Coordinate, CoordinateError> {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        if t >= 1.0 {
            return Ok(*other);
        }

        let start: Coord<f64> = (*self).into();
        let end: Coord<f64> = (*other).into();
        Coordinate::try_from(start + (end - start) * t)
    }
}

impl From<Coordinate> for Coord<f64> {
    fn from(coordinate: Coordinate) -> Self {
        Coord {
            x: coordinate.longitude(),
            y: coordinate.latitude(),
        }
    }
}

impl TryFrom<Coord<f64>> for Coordinate {
    type Error = CoordinateError;

    fn try_from(coord: Coord<f64>) -> Result<Self, Self::Error> {
        Coordinate::new(coord.y, coord.x)
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude(), self.longitude())
    }
}

/// Straight-line distance in meters between two coordinates.
///
/// Equirectangular approximation, suitable for intra-city distances.
/// Longitude degrees are scaled by the cosine of the mean latitude so
/// the result is symmetric in its arguments.
pub fn distance(start: &Coordinate, end: &Coordinate) -> f64 {
    let mean_latitude = ((start.latitude() + end.latitude()) / 2.0).to_radians();
    let dx = (end.longitude() - start.longitude()) * METERS_PER_DEGREE_LONGITUDE * mean_latitude.cos();
    let dy = (end.latitude() - start.latitude()) * METERS_PER_DEGREE_LATITUDE;

    (dx * dx + dy * dy).sqrt()
}
