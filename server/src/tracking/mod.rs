//! Delivery tracking
//! Path planning, position sources and the per-delivery session state.

#[macro_use]
pub mod macros;
pub mod coordinate;
pub mod feed;
pub mod manager;
pub mod path;
pub mod session;
pub mod telemetry;
pub mod timer;

pub use coordinate::{distance, Coordinate, CoordinateError};
pub use manager::DeliveryManager;
pub use path::{Path, PathError, PathMode, PathPlanner};
pub use session::{DeliverySession, FeedStatus, SessionError, SessionState, SessionStatus};

use crate::config::Config;
use futures::future::BoxFuture;
use serde::Deserialize;
use session::SessionPublisher;
use std::sync::Arc;

/// Where the displayed drone position comes from
#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingMode {
    /// Local clock moves a simulated drone from the store
    Simulated,

    /// Live drone telemetry
    Telemetry,
}

/// A strategy that moves the drone of one session.
///
/// The session spawns the returned future as a single task and cancels
/// it through the publisher's token.
pub trait PositionSource: Send {
    /// Short name for logging
    fn name(&self) -> &'static str;

    /// Drive the session towards `destination` until arrival, failure or
    /// cancellation.
    fn run(
        self: Box<Self>,
        publisher: SessionPublisher,
        destination: Coordinate,
    ) -> BoxFuture<'static, ()>;
}

/// Build the position source selected by the configuration
pub fn position_source(config: &Config) -> Result<Box<dyn PositionSource>, CoordinateError> {
    match config.tracking_mode {
        TrackingMode::Simulated => {
            let origin = config.store_origin()?;
            tracking_debug!("(position_source) simulated delivery from {}.", origin);
            Ok(Box::new(timer::TimerSource::new(
                origin,
                config.path_planner(),
                config.path_steps,
                config.timer_settings(),
            )))
        }
        TrackingMode::Telemetry => {
            tracking_debug!(
                "(position_source) telemetry delivery from {}.",
                config.telemetry_url
            );
            let feed = Arc::new(feed::WebSocketFeed::new(config.telemetry_url.clone()));
            Ok(Box::new(telemetry::TelemetrySource::new(
                feed,
                config.reconnect_policy(),
            )))
        }
    }
}
