//! Delivery session state and its lifecycle.
//!
//! A [`DeliverySession`] owns exactly one [`SessionState`]. Position
//! sources mutate it through a [`SessionPublisher`]; everyone else gets
//! read-only snapshots from a [`tokio::sync::watch`] channel.

use super::coordinate::Coordinate;
use super::path::Path;
use super::PositionSource;
use crate::location::{LocationAcquirer, LocationError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Progress at which the telemetry status text switches to "arriving"
pub const ARRIVING_PROGRESS: f64 = 95.0;

/// Lifecycle of a delivery session
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Waiting for the customer's location
    Locating,

    /// Location could not be acquired (terminal)
    LocationError,

    /// Destination known, no origin or path yet
    AwaitingSource,

    /// Moving along the path
    InTransit,

    /// Delivery completed (terminal)
    Arrived,

    /// Data broke the session (terminal)
    Error,
}

impl SessionStatus {
    /// No further transitions happen from a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::LocationError | SessionStatus::Arrived | SessionStatus::Error
        )
    }
}

/// Connection state of a telemetry feed
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedStatus {
    /// Subscription requested
    Connecting,

    /// Connected, no valid sample yet
    AwaitingData,

    /// Samples are flowing
    Live,

    /// Transport closed or failed
    Disconnected,
}

/// Everything the presentation needs to know about one delivery
#[derive(Debug, Clone, Serialize)]
pub struct SessionState {
    /// Identifier of the session
    pub session_id: Uuid,

    /// Current lifecycle status
    pub status: SessionStatus,

    /// Telemetry connection state, `None` for simulated deliveries
    pub feed: Option<FeedStatus>,

    /// Dispatch point
    pub origin: Option<Coordinate>,

    /// Customer location
    pub destination: Option<Coordinate>,

    /// Planned path, origin to destination
    pub path: Option<Arc<Path>>,

    /// Displayed drone position
    pub position: Option<Coordinate>,

    /// Completion percentage in [0, 100]
    pub progress: f64,

    /// Time left, simulated deliveries only
    pub remaining: Option<Duration>,

    /// Drone altitude above its launch point, telemetry deliveries only
    pub altitude_m: Option<f64>,

    /// The drone released the package
    pub package_dropped: bool,

    /// User-facing message of the last error
    pub error: Option<String>,

    /// Time of the last change
    pub updated_at: DateTime<Utc>,
}

impl SessionState {
    /// A fresh session waiting for the customer's location
    pub fn new(session_id: Uuid) -> Self {
        SessionState {
            session_id,
            status: SessionStatus::Locating,
            feed: None,
            origin: None,
            destination: None,
            path: None,
            position: None,
            progress: 0.0,
            remaining: None,
            altitude_m: None,
            package_dropped: false,
            error: None,
            updated_at: Utc::now(),
        }
    }

    /// Human readable status line
    pub fn status_text(&self) -> String {
        match self.status {
            SessionStatus::Locating => String::from("Finding your location..."),
            SessionStatus::LocationError | SessionStatus::Error => self
                .error
                .clone()
                .unwrap_or_else(|| String::from("Delivery tracking stopped unexpectedly.")),
            SessionStatus::AwaitingSource => match self.feed {
                Some(FeedStatus::Connecting) => String::from("Connecting to the drone..."),
                Some(FeedStatus::Disconnected) => {
                    String::from("Drone telemetry disconnected, waiting for the drone...")
                }
                _ => String::from("Waiting for the drone to take off..."),
            },
            SessionStatus::InTransit => {
                let mut text = if self.package_dropped {
                    String::from("Package dropped at your location")
                } else if self.feed.is_some() && self.progress >= ARRIVING_PROGRESS {
                    String::from("Drone arriving")
                } else {
                    format!("Drone in transit ({:.0}%)", self.progress)
                };

                if let Some(remaining) = self.remaining {
                    text.push_str(&format!(", {}s remaining", remaining.as_secs_f64().ceil()));
                }

                if self.feed == Some(FeedStatus::Disconnected) {
                    text.push_str(" (telemetry disconnected)");
                }

                text
            }
            SessionStatus::Arrived => String::from("Your drone has arrived!"),
        }
    }
}

/// Clamp a percentage to [0, 100]; NaN counts as no progress.
pub fn clamp_progress(progress: f64) -> f64 {
    if progress.is_nan() {
        return 0.0;
    }

    progress.clamp(0.0, 100.0)
}

/// Write access to a session's state, handed to one position source.
///
/// Once the session's cancellation token fires every update is dropped,
/// so a torn down source can not touch the displayed state.
#[derive(Debug, Clone)]
pub struct SessionPublisher {
    sender: Arc<watch::Sender<SessionState>>,
    cancel: CancellationToken,
}

impl SessionPublisher {
    /// Apply `update` to the state and notify observers.
    ///
    /// Returns false if the session was cancelled and nothing changed.
    pub fn update<F>(&self, update: F) -> bool
    where
        F: FnOnce(&mut SessionState),
    {
        if self.cancel.is_cancelled() {
            return false;
        }

        self.sender.send_modify(|state| {
            update(state);
            state.progress = clamp_progress(state.progress);
            state.updated_at = Utc::now();
        });

        true
    }

    /// Token that fires when the session stops
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Reasons a session rejected a request
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum SessionError {
    /// No destination yet, a source can not start
    NoDestination,

    /// Session already reached a terminal status or was stopped
    Finished,
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            SessionError::NoDestination => {
                write!(f, "Tracking can not start before your location is known")
            }
            SessionError::Finished => write!(f, "This delivery session has already ended"),
        }
    }
}

/// One delivery, from locating the customer to arrival.
#[derive(Debug)]
pub struct DeliverySession {
    id: Uuid,
    publisher: SessionPublisher,
    receiver: watch::Receiver<SessionState>,
    located: bool,
    task: Option<JoinHandle<()>>,
}

impl Default for DeliverySession {
    fn default() -> Self {
        Self::new()
    }
}

impl DeliverySession {
    /// Create a session in the `locating` status
    pub fn new() -> Self {
        let id = Uuid::new_v4();
        let (sender, receiver) = watch::channel(SessionState::new(id));
        tracking_info!("(new) delivery session {} created.", id);

        DeliverySession {
            id,
            publisher: SessionPublisher {
                sender: Arc::new(sender),
                cancel: CancellationToken::new(),
            },
            receiver,
            located: false,
            task: None,
        }
    }

    /// Session identifier
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Read-only view of the session state
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.receiver.clone()
    }

    /// Copy of the current state
    pub fn state(&self) -> SessionState {
        self.receiver.borrow().clone()
    }

    /// Acquire the destination. Allowed once per session.
    ///
    /// A failure moves the session to `location_error` for good.
    pub async fn locate(
        &mut self,
        acquirer: &LocationAcquirer,
    ) -> Result<Coordinate, LocationError> {
        if self.located {
            tracking_warn!("(locate) session {} already located.", self.id);
            return Err(LocationError::AlreadyRequested);
        }
        self.located = true;

        match acquirer.acquire().await {
            Ok(destination) => {
                tracking_info!("(locate) session {} destination: {}", self.id, destination);
                self.publisher.update(|state| {
                    state.destination = Some(destination);
                    state.status = SessionStatus::AwaitingSource;
                });
                Ok(destination)
            }
            Err(e) => {
                tracking_warn!("(locate) session {} location failed: {}", self.id, e);
                self.publisher.update(|state| {
                    state.status = SessionStatus::LocationError;
                    state.error = Some(e.to_string());
                });
                Err(e)
            }
        }
    }

    /// Start a position source for this session.
    ///
    /// Returns `Ok(false)` without doing anything if a source is already
    /// running, so at most one tick source or subscription exists.
    pub fn start(&mut self, source: Box<dyn PositionSource>) -> Result<bool, SessionError> {
        if self.is_running() {
            tracking_debug!(
                "(start) session {} already has a running source, ignoring.",
                self.id
            );
            return Ok(false);
        }

        if self.publisher.cancel.is_cancelled() || self.state().status.is_terminal() {
            return Err(SessionError::Finished);
        }

        let Some(destination) = self.state().destination else {
            tracking_error!("(start) session {} has no destination.", self.id);
            return Err(SessionError::NoDestination);
        };

        tracking_info!(
            "(start) session {} starting {} source towards {}.",
            self.id,
            source.name(),
            destination
        );
        let run = source.run(self.publisher.clone(), destination);
        self.task = Some(tokio::spawn(run));
        Ok(true)
    }

    /// True while a position source task is alive
    pub fn is_running(&self) -> bool {
        self.task
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }

    /// Stop the session and wait for its position source to exit.
    ///
    /// After this returns no further state updates are published.
    pub async fn stop(&mut self) {
        self.publisher.cancel.cancel();

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracking_error!("(stop) session {} source task failed: {}", self.id, e);
            }
        }

        tracking_info!("(stop) delivery session {} stopped.", self.id);
    }
}

impl Drop for DeliverySession {
    fn drop(&mut self) {
        // a source task outliving its session must not publish
        if !self.publisher.cancel.is_cancelled() {
            tracking_debug!("(drop) session {} dropped without stop.", self.id);
            self.publisher.cancel.cancel();
        }
    }
}
