//! Delivery tracking driven by live drone telemetry.
//!
//! The first valid sample fixes the origin (the drone's launch point).
//! Progress is the straight-line distance travelled from that origin,
//! relative to the planned origin-to-destination distance.

use super::coordinate::{distance, Coordinate};
use super::feed::{parse_frame, FeedConnector, FeedEvent, FeedStream, TelemetrySample};
use super::path::Path;
use super::session::{clamp_progress, FeedStatus, SessionPublisher, SessionState, SessionStatus};
use super::PositionSource;
use futures::future::BoxFuture;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;

/// Smallest planned distance used as the progress denominator, in meters
const MIN_PLANNED_DISTANCE_METERS: f64 = 1.0;

/// What to do when the feed connection is lost
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Reconnect attempts after a failure, 0 disables reconnecting
    pub max_attempts: u32,

    /// Wait before each attempt
    pub delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy {
            max_attempts: 0,
            delay: Duration::from_secs(2),
        }
    }
}

enum Outcome {
    Arrived,
    Cancelled,
    Disconnected,
}

/// Follows the drone through a telemetry feed
#[derive(Clone)]
pub struct TelemetrySource {
    connector: Arc<dyn FeedConnector>,
    reconnect: ReconnectPolicy,
}

impl std::fmt::Debug for TelemetrySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetrySource")
            .field("endpoint", &self.connector.endpoint())
            .field("reconnect", &self.reconnect)
            .finish()
    }
}

impl TelemetrySource {
    /// Create a telemetry source
    pub fn new(connector: Arc<dyn FeedConnector>, reconnect: ReconnectPolicy) -> Self {
        TelemetrySource {
            connector,
            reconnect,
        }
    }

    async fn track(self, publisher: SessionPublisher) {
        let cancel = publisher.cancel_token().clone();
        let endpoint = self.connector.endpoint();
        let mut failures: u32 = 0;

        loop {
            publisher.update(|state| state.feed = Some(FeedStatus::Connecting));
            tracking_info!("(track) subscribing to {}.", endpoint);

            let connection = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                connection = self.connector.connect() => connection,
            };

            match connection {
                Ok(stream) => {
                    failures = 0;
                    publisher.update(|state| state.feed = Some(FeedStatus::AwaitingData));
                    match consume(stream, &publisher).await {
                        Outcome::Arrived => {
                            tracking_info!("(track) delivery complete, closing {}.", endpoint);
                            return;
                        }
                        Outcome::Cancelled => {
                            tracking_debug!("(track) subscription to {} cancelled.", endpoint);
                            return;
                        }
                        Outcome::Disconnected => {
                            tracking_warn!("(track) telemetry from {} disconnected.", endpoint);
                        }
                    }
                }
                Err(e) => {
                    tracking_warn!("(track) {}", e);
                }
            }

            publisher.update(|state| state.feed = Some(FeedStatus::Disconnected));

            if failures >= self.reconnect.max_attempts {
                tracking_info!("(track) not reconnecting to {}.", endpoint);
                return;
            }
            failures += 1;

            tracking_info!(
                "(track) reconnect attempt {} of {} in {:?}.",
                failures,
                self.reconnect.max_attempts,
                self.reconnect.delay
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(self.reconnect.delay) => {}
            }
        }
    }
}

async fn consume(mut stream: FeedStream, publisher: &SessionPublisher) -> Outcome {
    let cancel = publisher.cancel_token().clone();

    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Outcome::Cancelled,
            event = stream.next() => event,
        };

        let text = match event {
            Some(FeedEvent::Frame(text)) => text,
            Some(FeedEvent::Error(e)) => {
                tracking_warn!("(consume) transport error: {}", e);
                return Outcome::Disconnected;
            }
            Some(FeedEvent::Closed) | None => return Outcome::Disconnected,
        };

        let sample = match parse_frame(&text) {
            Ok(sample) => sample,
            Err(e) => {
                tracking_warn!("(consume) dropping frame: {}", e);
                continue;
            }
        };

        let mut arrived = false;
        publisher.update(|state| {
            apply_sample(state, &sample);
            arrived = state.status == SessionStatus::Arrived;
        });

        if arrived {
            return Outcome::Arrived;
        }
    }
}

/// Fold one telemetry sample into the session state.
///
/// Samples are ignored until the destination is known and once the
/// session is terminal.
pub fn apply_sample(state: &mut SessionState, sample: &TelemetrySample) {
    let Some(destination) = state.destination else {
        tracking_debug!("(apply_sample) no destination yet, ignoring sample.");
        return;
    };

    if state.status.is_terminal() {
        return;
    }

    state.feed = Some(FeedStatus::Live);
    state.position = Some(sample.position);
    if sample.relative_altitude_m.is_some() {
        state.altitude_m = sample.relative_altitude_m;
    }
    if sample.package_dropped && !state.package_dropped {
        tracking_info!("(apply_sample) package dropped ({:?}).", sample.servo_status);
        state.package_dropped = true;
    }

    match state.origin {
        None => start_from(state, sample.position, destination),
        Some(origin) => {
            let planned = state
                .path
                .as_ref()
                .map(|path| path.distance_meters())
                .unwrap_or_else(|| distance(&origin, &destination));
            state.progress = progress(&origin, &sample.position, planned);
        }
    }

    if sample.rtl_active || sample.rtl_completed || state.progress >= 100.0 {
        tracking_info!(
            "(apply_sample) drone arrived (rtl active: {}, rtl completed: {}, progress: {:.1}%).",
            sample.rtl_active,
            sample.rtl_completed,
            state.progress
        );
        state.progress = 100.0;
        state.status = SessionStatus::Arrived;
    }
}

fn start_from(state: &mut SessionState, origin: Coordinate, destination: Coordinate) {
    let path = Path::straight(origin, destination);
    tracking_info!(
        "(start_from) drone origin {}, planned distance {:.1} m.",
        origin,
        path.distance_meters()
    );

    state.origin = Some(origin);
    state.path = Some(Arc::new(path));
    state.progress = 0.0;
    state.status = SessionStatus::InTransit;
}

/// Percentage of `planned` meters covered between `origin` and `current`
pub fn progress(origin: &Coordinate, current: &Coordinate, planned: f64) -> f64 {
    let traveled = distance(origin, current);
    clamp_progress(traveled / planned.max(MIN_PLANNED_DISTANCE_METERS) * 100.0)
}

impl PositionSource for TelemetrySource {
    fn name(&self) -> &'static str {
        "telemetry"
    }

    fn run(
        self: Box<Self>,
        publisher: SessionPublisher,
        _destination: Coordinate,
    ) -> BoxFuture<'static, ()> {
        Box::pin((*self).track(publisher))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{located_session, wait_for, ChannelFeed};
    use uuid::Uuid;

    fn origin() -> Coordinate {
        Coordinate::new(0.0, 0.0).unwrap()
    }

    fn destination() -> Coordinate {
        Coordinate::new(0.0, 0.01).unwrap()
    }

    fn located_state() -> SessionState {
        let mut state = SessionState::new(Uuid::new_v4());
        state.destination = Some(destination());
        state.status = SessionStatus::AwaitingSource;
        state
    }

    fn sample(latitude: f64, longitude: f64, rtl_active: bool) -> TelemetrySample {
        TelemetrySample {
            position: Coordinate::new(latitude, longitude).unwrap(),
            absolute_altitude_m: None,
            relative_altitude_m: None,
            rtl_active,
            rtl_completed: false,
            servo_status: None,
            package_dropped: false,
        }
    }

    #[test]
    fn test_first_sample_sets_origin() {
        let mut state = located_state();
        apply_sample(&mut state, &sample(0.0, 0.0, false));

        assert_eq!(state.origin, Some(origin()));
        assert_eq!(state.position, Some(origin()));
        assert_eq!(state.status, SessionStatus::InTransit);
        assert_eq!(state.progress, 0.0);

        let path = state.path.as_ref().unwrap();
        assert_eq!(path.points(), &[origin(), destination()]);
        assert!((path.distance_meters() - 1113.2).abs() < 1.0);

        // the origin never moves afterwards
        apply_sample(&mut state, &sample(0.0, 0.002, false));
        assert_eq!(state.origin, Some(origin()));
    }

    #[test]
    fn test_halfway_progress() {
        let mut state = located_state();
        apply_sample(&mut state, &sample(0.0, 0.0, false));
        apply_sample(&mut state, &sample(0.0, 0.005, false));

        assert!((state.progress - 50.0).abs() < 2.0);
        assert_eq!(state.position, Some(Coordinate::new(0.0, 0.005).unwrap()));
        assert_eq!(state.status, SessionStatus::InTransit);
        assert_eq!(state.status_text(), "Drone in transit (50%)");
    }

    #[test]
    fn test_arriving_text() {
        let mut state = located_state();
        apply_sample(&mut state, &sample(0.0, 0.0, false));
        apply_sample(&mut state, &sample(0.0, 0.0096, false));

        assert!(state.progress >= 95.0);
        assert_eq!(state.status, SessionStatus::InTransit);
        assert_eq!(state.status_text(), "Drone arriving");
    }

    #[test]
    fn test_rtl_forces_arrival() {
        let mut state = located_state();
        apply_sample(&mut state, &sample(0.0, 0.0, false));
        apply_sample(&mut state, &sample(0.0, 0.001, true));

        assert_eq!(state.status, SessionStatus::Arrived);
        assert_eq!(state.progress, 100.0);
    }

    #[test]
    fn test_rtl_completed_forces_arrival() {
        let mut state = located_state();
        apply_sample(&mut state, &sample(0.0, 0.0, false));
        apply_sample(
            &mut state,
            &TelemetrySample {
                rtl_completed: true,
                ..sample(0.0, 0.003, false)
            },
        );

        assert_eq!(state.status, SessionStatus::Arrived);
        assert_eq!(state.progress, 100.0);
    }

    #[test]
    fn test_altitude_is_carried() {
        let mut state = located_state();
        apply_sample(
            &mut state,
            &TelemetrySample {
                absolute_altitude_m: Some(920.1),
                relative_altitude_m: Some(20.0),
                ..sample(0.0, 0.0, false)
            },
        );
        assert_eq!(state.altitude_m, Some(20.0));

        // frames without altitude keep the last known value
        apply_sample(&mut state, &sample(0.0, 0.002, false));
        assert_eq!(state.altitude_m, Some(20.0));

        apply_sample(
            &mut state,
            &TelemetrySample {
                relative_altitude_m: Some(12.5),
                ..sample(0.0, 0.004, false)
            },
        );
        assert_eq!(state.altitude_m, Some(12.5));
    }

    #[test]
    fn test_package_dropped_is_sticky() {
        let mut state = located_state();
        apply_sample(&mut state, &sample(0.0, 0.0, false));
        apply_sample(
            &mut state,
            &TelemetrySample {
                servo_status: Some(String::from("open")),
                package_dropped: true,
                ..sample(0.0, 0.005, false)
            },
        );

        assert!(state.package_dropped);
        assert_eq!(state.status, SessionStatus::InTransit);
        assert_eq!(state.status_text(), "Package dropped at your location");

        // the servo closing again does not undo the drop
        apply_sample(
            &mut state,
            &TelemetrySample {
                servo_status: Some(String::from("closing")),
                ..sample(0.0, 0.006, false)
            },
        );
        assert!(state.package_dropped);
        assert_eq!(state.status_text(), "Package dropped at your location");
    }

    #[test]
    fn test_overshoot_is_clamped() {
        let mut state = located_state();
        apply_sample(&mut state, &sample(0.0, 0.0, false));
        apply_sample(&mut state, &sample(0.0, 0.02, false));

        assert_eq!(state.progress, 100.0);
        assert_eq!(state.status, SessionStatus::Arrived);
    }

    #[test]
    fn test_progress_with_zero_planned_distance() {
        assert_eq!(progress(&origin(), &origin(), 0.0), 0.0);
        assert_eq!(progress(&origin(), &destination(), 0.0), 100.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_feed_lifecycle() {
        crate::get_log_handle().await;
        ut_info!("(test_feed_lifecycle) Start.");

        let feed = ChannelFeed::new();
        let frames = feed.push_connection();
        let mut session = located_session(destination()).await;
        let mut receiver = session.subscribe();
        let source = TelemetrySource::new(feed.clone(), ReconnectPolicy::default());
        session.start(Box::new(source)).unwrap();

        wait_for(&mut receiver, |s| s.feed == Some(FeedStatus::AwaitingData)).await;
        assert_eq!(receiver.borrow().status, SessionStatus::AwaitingSource);

        frames
            .unbounded_send(FeedEvent::Frame(String::from(r#"{"lat": 0.0, "lon": 0.0}"#)))
            .unwrap();
        wait_for(&mut receiver, |s| s.status == SessionStatus::InTransit).await;
        assert_eq!(receiver.borrow().feed, Some(FeedStatus::Live));

        frames
            .unbounded_send(FeedEvent::Frame(String::from(r#"{"lat": 0.0, "lon": 0.005}"#)))
            .unwrap();
        wait_for(&mut receiver, |s| s.progress > 0.0).await;
        assert!((receiver.borrow().progress - 50.0).abs() < 2.0);

        frames
            .unbounded_send(FeedEvent::Frame(String::from(
                r#"{"lat": 0.0, "lon": 0.006, "rtl_status": {"is_rtl_active": true}}"#,
            )))
            .unwrap();
        wait_for(&mut receiver, |s| s.status == SessionStatus::Arrived).await;

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!session.is_running());
        assert_eq!(feed.connections(), 1);

        ut_info!("(test_feed_lifecycle) Success.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_frames_are_dropped() {
        crate::get_log_handle().await;
        ut_info!("(test_malformed_frames_are_dropped) Start.");

        let feed = ChannelFeed::new();
        let frames = feed.push_connection();
        let mut session = located_session(destination()).await;
        let mut receiver = session.subscribe();
        session
            .start(Box::new(TelemetrySource::new(
                feed.clone(),
                ReconnectPolicy::default(),
            )))
            .unwrap();

        frames
            .unbounded_send(FeedEvent::Frame(String::from(r#"{"lat": 0.0, "lon": 0.0}"#)))
            .unwrap();
        wait_for(&mut receiver, |s| s.status == SessionStatus::InTransit).await;
        let before = receiver.borrow_and_update().clone();

        for frame in [r#"{"noise": true}"#, "not json", r#"{"error": "gps lost"}"#] {
            frames
                .unbounded_send(FeedEvent::Frame(String::from(frame)))
                .unwrap();
        }
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(!receiver.has_changed().unwrap_or(true));
        let after = receiver.borrow().clone();
        assert_eq!(after.progress, before.progress);
        assert_eq!(after.position, before.position);
        assert_eq!(after.status, before.status);
        assert!(session.is_running());

        session.stop().await;
        ut_info!("(test_malformed_frames_are_dropped) Success.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_without_reconnect() {
        crate::get_log_handle().await;
        ut_info!("(test_disconnect_without_reconnect) Start.");

        let feed = ChannelFeed::new();
        let frames = feed.push_connection();
        let mut session = located_session(destination()).await;
        let mut receiver = session.subscribe();
        session
            .start(Box::new(TelemetrySource::new(
                feed.clone(),
                ReconnectPolicy::default(),
            )))
            .unwrap();

        frames
            .unbounded_send(FeedEvent::Frame(String::from(r#"{"lat": 0.0, "lon": 0.0}"#)))
            .unwrap();
        wait_for(&mut receiver, |s| s.status == SessionStatus::InTransit).await;

        frames
            .unbounded_send(FeedEvent::Error(String::from("connection reset")))
            .unwrap();
        wait_for(&mut receiver, |s| s.feed == Some(FeedStatus::Disconnected)).await;

        let state = receiver.borrow().clone();
        assert_eq!(state.status, SessionStatus::InTransit);
        assert!(state.status_text().ends_with("(telemetry disconnected)"));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!session.is_running());
        assert_eq!(feed.connections(), 1);

        ut_info!("(test_disconnect_without_reconnect) Success.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_policy() {
        crate::get_log_handle().await;
        ut_info!("(test_reconnect_policy) Start.");

        let feed = ChannelFeed::new();
        let first = feed.push_connection();
        let second = feed.push_connection();
        let mut session = located_session(destination()).await;
        let mut receiver = session.subscribe();
        let policy = ReconnectPolicy {
            max_attempts: 1,
            delay: Duration::from_millis(500),
        };
        session
            .start(Box::new(TelemetrySource::new(feed.clone(), policy)))
            .unwrap();

        first
            .unbounded_send(FeedEvent::Frame(String::from(r#"{"lat": 0.0, "lon": 0.0}"#)))
            .unwrap();
        wait_for(&mut receiver, |s| s.status == SessionStatus::InTransit).await;
        first.unbounded_send(FeedEvent::Closed).unwrap();
        wait_for(&mut receiver, |s| s.feed == Some(FeedStatus::Disconnected)).await;

        wait_for(&mut receiver, |s| s.feed == Some(FeedStatus::AwaitingData)).await;
        assert_eq!(feed.connections(), 2);

        second
            .unbounded_send(FeedEvent::Frame(String::from(r#"{"lat": 0.0, "lon": 0.005}"#)))
            .unwrap();
        wait_for(&mut receiver, |s| s.progress > 0.0).await;
        // origin survives the reconnect
        assert_eq!(receiver.borrow().origin, Some(origin()));

        session.stop().await;
        assert!(!session.is_running());

        ut_info!("(test_reconnect_policy) Success.");
    }
}
