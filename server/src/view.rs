//! Screen models bound to a delivery session snapshot.
//!
//! Rendering is left to the front end; this module only decides what is
//! shown: a loading screen, an error screen or the tracking map.

use crate::tracking::{Coordinate, SessionState, SessionStatus};
use serde::Serialize;
use std::time::Duration;

/// Closest zoom level used when fitting the map
pub const MAX_ZOOM: u8 = 16;

/// Widest zoom level used when fitting the map
pub const MIN_ZOOM: u8 = 2;

/// Margin around the fitted points, as a factor of their span
const VIEWPORT_PADDING: f64 = 1.5;

/// What a map marker stands for
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerKind {
    /// Store or drone launch point
    Origin,

    /// Customer
    Destination,

    /// Current drone position
    Drone,
}

/// A point drawn on the map
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct Marker {
    /// Marker role
    pub kind: MarkerKind,

    /// Marker position
    pub position: Coordinate,
}

/// Visible map region
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct Viewport {
    /// Map center
    pub center: Coordinate,

    /// Web map zoom level
    pub zoom: u8,
}

/// The tracking map
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapView {
    /// Region to display
    pub viewport: Viewport,

    /// Origin, destination and drone markers, whichever are known
    pub markers: Vec<Marker>,

    /// Planned route polyline
    pub path: Vec<Coordinate>,

    /// Progress bar value in [0, 100]
    pub progress: f64,

    /// Status line under the map
    pub status_text: String,

    /// Countdown, simulated deliveries only
    pub remaining: Option<Duration>,

    /// Drone altitude above its launch point, telemetry deliveries only
    pub altitude_m: Option<f64>,
}

/// What the customer sees
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "screen", content = "view", rename_all = "snake_case")]
pub enum Screen {
    /// Spinner with a message
    Loading(String),

    /// Error message, the map is not shown
    Error(String),

    /// Live tracking map
    Map(MapView),
}

impl Screen {
    /// Pick the screen for a session snapshot.
    pub fn from_state(state: &SessionState) -> Self {
        match state.status {
            SessionStatus::LocationError | SessionStatus::Error => {
                return Screen::Error(state.status_text())
            }
            SessionStatus::Locating => return Screen::Loading(state.status_text()),
            _ => (),
        }

        let (Some(origin), Some(destination)) = (state.origin, state.destination) else {
            return Screen::Loading(state.status_text());
        };

        let mut markers = vec![
            Marker {
                kind: MarkerKind::Origin,
                position: origin,
            },
            Marker {
                kind: MarkerKind::Destination,
                position: destination,
            },
        ];
        if let Some(position) = state.position {
            markers.push(Marker {
                kind: MarkerKind::Drone,
                position,
            });
        }

        Screen::Map(MapView {
            viewport: fit_viewport(&origin, &destination),
            markers,
            path: state
                .path
                .as_ref()
                .map(|path| path.points().to_vec())
                .unwrap_or_default(),
            progress: state.progress,
            status_text: state.status_text(),
            remaining: state.remaining,
            altitude_m: state.altitude_m,
        })
    }

    /// True for screens that end the delivery flow
    pub fn is_error(&self) -> bool {
        matches!(self, Screen::Error(_))
    }
}

impl std::fmt::Display for Screen {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Screen::Loading(text) => write!(f, "[loading] {}", text),
            Screen::Error(text) => write!(f, "[error] {}", text),
            Screen::Map(map) => {
                let drone = map
                    .markers
                    .iter()
                    .find(|marker| marker.kind == MarkerKind::Drone)
                    .map(|marker| marker.position.to_string())
                    .unwrap_or_else(|| String::from("-"));
                write!(
                    f,
                    "[map z{}] {} | drone {} | {:.0}%",
                    map.viewport.zoom, map.status_text, drone, map.progress
                )?;
                if let Some(altitude) = map.altitude_m {
                    write!(f, " | {:.1} m", altitude)?;
                }
                Ok(())
            }
        }
    }
}

/// Center on the midpoint of `a` and `b` with a zoom that shows both.
pub fn fit_viewport(a: &Coordinate, b: &Coordinate) -> Viewport {
    // midpoint of two valid coordinates is valid
    let center = a.lerp(b, 0.5).unwrap_or(*a);

    let span = (a.latitude() - b.latitude())
        .abs()
        .max((a.longitude() - b.longitude()).abs());

    let zoom = if span <= f64::EPSILON {
        MAX_ZOOM
    } else {
        let zoom = (360.0 / (span * VIEWPORT_PADDING)).log2().floor();
        zoom.clamp(MIN_ZOOM as f64, MAX_ZOOM as f64) as u8
    };

    Viewport { center, zoom }
}
