//! Path planning between the dispatch point and the customer.
//!
//! The curved mode samples a quadratic Bézier curve whose control point
//! is pushed sideways from the segment midpoint. The straight mode keeps
//! only the two endpoints and interpolates linearly.

use super::coordinate::{distance, Coordinate};
use geo::Coord;
use serde::{Deserialize, Serialize};

/// Default sideways offset of the Bézier control point, as a fraction of
/// the coordinate deltas.
pub const DEFAULT_CURVE_OFFSET: f64 = 0.12;

/// Shape of the planned path
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathMode {
    /// Quadratic Bézier curve sampled into waypoints
    Curved,

    /// Two point segment, positions are interpolated linearly
    Straight,
}

/// Reasons a path could not be planned
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum PathError {
    /// Fewer than two steps requested
    InvalidSteps,

    /// An endpoint is not a usable coordinate
    InvalidEndpoint,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            PathError::InvalidSteps => write!(f, "A delivery path needs at least two steps"),
            PathError::InvalidEndpoint => {
                write!(f, "The delivery route could not be drawn from the given locations")
            }
        }
    }
}

/// An ordered list of waypoints from origin to destination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Path {
    mode: PathMode,
    points: Vec<Coordinate>,
    distance_meters: f64,
}

impl Path {
    /// The two point segment between `origin` and `destination`.
    pub fn straight(origin: Coordinate, destination: Coordinate) -> Self {
        Path {
            mode: PathMode::Straight,
            points: vec![origin, destination],
            distance_meters: distance(&origin, &destination),
        }
    }

    /// How the path was built
    pub fn mode(&self) -> PathMode {
        self.mode
    }

    /// All waypoints, origin first
    pub fn points(&self) -> &[Coordinate] {
        &self.points
    }

    /// Number of waypoints, never less than 2
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// A path always holds both endpoints
    pub fn is_empty(&self) -> bool {
        false
    }

    /// First waypoint
    pub fn origin(&self) -> Coordinate {
        self.points[0]
    }

    /// Last waypoint
    pub fn destination(&self) -> Coordinate {
        self.points[self.points.len() - 1]
    }

    /// Straight-line distance between the endpoints in meters
    pub fn distance_meters(&self) -> f64 {
        self.distance_meters
    }

    /// Position after completing `fraction` of the path.
    ///
    /// Waypoints are treated as evenly spaced in time, positions between
    /// two waypoints are interpolated linearly. For a straight path this
    /// is `lerp(origin, destination, fraction)`.
    pub fn position_at(&self, fraction: f64) -> Result<Coordinate, super::CoordinateError> {
        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };

        let last = self.points.len() - 1;
        if fraction >= 1.0 {
            return Ok(self.points[last]);
        }

        let scaled = fraction * last as f64;
        let index = (scaled.floor() as usize).min(last - 1);
        self.points[index].lerp(&self.points[index + 1], scaled - index as f64)
    }
}

/// Builds [`Path`]s for a fixed mode and curvature
#[derive(Debug, Copy, Clone)]
pub struct PathPlanner {
    mode: PathMode,
    curve_offset: f64,
}

impl Default for PathPlanner {
    fn default() -> Self {
        PathPlanner::new(PathMode::Curved, DEFAULT_CURVE_OFFSET)
    }
}

impl PathPlanner {
    /// Create a planner
    pub fn new(mode: PathMode, curve_offset: f64) -> Self {
        PathPlanner { mode, curve_offset }
    }

    /// Plan a path from `origin` to `destination`.
    ///
    /// In curved mode the curve is sampled at `steps + 1` evenly spaced
    /// parameter values. Samples that are not valid coordinates are
    /// skipped, the destination is appended if the last sample does not
    /// land on it exactly, and the planner falls back to the straight
    /// segment if fewer than two points survive.
    pub fn plan(
        &self,
        origin: &Coordinate,
        destination: &Coordinate,
        steps: usize,
    ) -> Result<Path, PathError> {
        if steps < 2 {
            tracking_error!("(plan) invalid step count: {}", steps);
            return Err(PathError::InvalidSteps);
        }

        if self.mode == PathMode::Straight {
            return Ok(Path::straight(*origin, *destination));
        }

        if !self.curve_offset.is_finite() {
            tracking_error!("(plan) invalid curve offset: {}", self.curve_offset);
            return Err(PathError::InvalidEndpoint);
        }

        let p0: Coord<f64> = (*origin).into();
        let p1: Coord<f64> = (*destination).into();
        let delta = p1 - p0;
        let midpoint = (p0 + p1) / 2.0;
        let control = Coord {
            x: midpoint.x - delta.y * self.curve_offset,
            y: midpoint.y + delta.x * self.curve_offset,
        };

        let mut points: Vec<Coordinate> = Vec::with_capacity(steps + 2);
        for i in 0..=steps {
            let t = i as f64 / steps as f64;
            let u = 1.0 - t;
            let sample = p0 * (u * u) + control * (2.0 * u * t) + p1 * (t * t);

            match Coordinate::try_from(sample) {
                Ok(point) => points.push(point),
                Err(e) => {
                    tracking_warn!("(plan) skipping path sample {} at t={}: {}", i, t, e);
                }
            }
        }

        if points.last() != Some(destination) {
            points.push(*destination);
        }

        if points.len() < 2 {
            tracking_warn!("(plan) curve produced too few points, using straight segment.");
            return Ok(Path::straight(*origin, *destination));
        }

        tracking_debug!(
            "(plan) planned {} points from {} to {}.",
            points.len(),
            origin,
            destination
        );

        Ok(Path {
            mode: PathMode::Curved,
            points,
            distance_meters: distance(origin, destination),
        })
    }
}
