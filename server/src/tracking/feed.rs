//! Telemetry feed transport and frame decoding.
//!
//! The drone server pushes JSON text frames over a WebSocket:
//! `{ "lat": .., "lon": .., "rtl_status": { "is_rtl_active": .. } }` for
//! position updates, or `{ "error": ".." }` when it can not read the
//! drone.

use super::coordinate::{Coordinate, CoordinateError};
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Deserialize;
use tokio_tungstenite::tungstenite::Message;

/// Something that happened on a feed connection
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// A text frame
    Frame(String),

    /// Remote side closed the connection
    Closed,

    /// Transport failure, the connection is gone
    Error(String),
}

/// Stream of events for one connection. The connection is released when
/// the stream is dropped.
pub type FeedStream = BoxStream<'static, FeedEvent>;

/// Reasons a feed connection could not be opened
#[derive(Debug, Clone, PartialEq)]
pub enum FeedError {
    /// Connection attempt failed
    Connect(String),
}

impl std::fmt::Display for FeedError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            FeedError::Connect(e) => write!(f, "Could not connect to drone telemetry: {}", e),
        }
    }
}

/// Opens telemetry connections
pub trait FeedConnector: Send + Sync {
    /// Human readable description of the endpoint, for logging
    fn endpoint(&self) -> String;

    /// Open a new connection
    fn connect(&self) -> BoxFuture<'_, Result<FeedStream, FeedError>>;
}

/// Telemetry over a WebSocket
#[derive(Debug, Clone)]
pub struct WebSocketFeed {
    url: String,
}

impl WebSocketFeed {
    /// Feed reading from `url` (`ws://` or `wss://`)
    pub fn new(url: impl Into<String>) -> Self {
        WebSocketFeed { url: url.into() }
    }
}

impl FeedConnector for WebSocketFeed {
    fn endpoint(&self) -> String {
        self.url.clone()
    }

    fn connect(&self) -> BoxFuture<'_, Result<FeedStream, FeedError>> {
        Box::pin(async move {
            let (socket, response) = tokio_tungstenite::connect_async(self.url.as_str())
                .await
                .map_err(|e| FeedError::Connect(e.to_string()))?;
            tracking_debug!(
                "(connect) connected to {} with status {}.",
                self.url,
                response.status()
            );

            let events = socket.filter_map(|message| async move {
                match message {
                    Ok(Message::Text(text)) => Some(FeedEvent::Frame(text)),
                    Ok(Message::Binary(bytes)) => Some(FeedEvent::Frame(
                        String::from_utf8_lossy(&bytes).into_owned(),
                    )),
                    Ok(Message::Close(_)) => Some(FeedEvent::Closed),
                    Ok(_) => None,
                    Err(e) => Some(FeedEvent::Error(e.to_string())),
                }
            });

            Ok(events.boxed())
        })
    }
}

/// A decoded position report
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySample {
    /// Reported drone position
    pub position: Coordinate,

    /// Altitude above mean sea level in meters
    pub absolute_altitude_m: Option<f64>,

    /// Altitude above the launch point in meters
    pub relative_altitude_m: Option<f64>,

    /// The drone has finished its outbound leg and is returning home
    pub rtl_active: bool,

    /// The drone is back at its launch point
    pub rtl_completed: bool,

    /// Payload servo state as reported, e.g. "closed" or "open"
    pub servo_status: Option<String>,

    /// The payload was released over the destination
    pub package_dropped: bool,
}

/// Reasons a frame was dropped
#[derive(Debug, Clone, PartialEq)]
pub enum FrameError {
    /// Not valid JSON, or fields of the wrong type
    Json(String),

    /// The server reported an error instead of a position
    Reported(String),

    /// `lat` or `lon` missing
    MissingCoordinates,

    /// Coordinates present but unusable
    InvalidCoordinate(CoordinateError),
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            FrameError::Json(e) => write!(f, "Unreadable telemetry frame: {}", e),
            FrameError::Reported(e) => write!(f, "Drone server reported an error: {}", e),
            FrameError::MissingCoordinates => write!(f, "Telemetry frame has no position"),
            FrameError::InvalidCoordinate(e) => {
                write!(f, "Telemetry frame has an invalid position: {}", e)
            }
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RtlStatus {
    #[serde(default)]
    is_rtl_active: bool,

    #[serde(default)]
    rtl_completed: bool,
}

#[derive(Debug, Default, Deserialize)]
struct ServoStatus {
    #[serde(default)]
    status: Option<String>,

    #[serde(default)]
    package_dropped: bool,
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    lat: Option<f64>,
    lon: Option<f64>,
    abs_alt_m: Option<f64>,
    rel_alt_m: Option<f64>,
    rtl_status: Option<RtlStatus>,
    servo_status: Option<ServoStatus>,
    error: Option<String>,
}

/// Decode one text frame.
pub fn parse_frame(text: &str) -> Result<TelemetrySample, FrameError> {
    let frame: RawFrame = serde_json::from_str(text).map_err(|e| FrameError::Json(e.to_string()))?;

    if let Some(error) = frame.error {
        return Err(FrameError::Reported(error));
    }

    let (Some(latitude), Some(longitude)) = (frame.lat, frame.lon) else {
        return Err(FrameError::MissingCoordinates);
    };

    let position = Coordinate::new(latitude, longitude).map_err(FrameError::InvalidCoordinate)?;

    let rtl = frame.rtl_status.unwrap_or_default();
    let servo = frame.servo_status.unwrap_or_default();

    Ok(TelemetrySample {
        position,
        absolute_altitude_m: frame.abs_alt_m,
        relative_altitude_m: frame.rel_alt_m,
        rtl_active: rtl.is_rtl_active,
        rtl_completed: rtl.rtl_completed,
        servo_status: servo.status,
        package_dropped: servo.package_dropped,
    })
}
