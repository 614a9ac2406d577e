//! Simulated delivery driven by a local clock.

use super::coordinate::{Coordinate, CoordinateError};
use super::path::{Path, PathPlanner};
use super::session::{SessionPublisher, SessionStatus};
use super::PositionSource;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Default length of a simulated delivery
pub const DEFAULT_DELIVERY_DURATION: Duration = Duration::from_secs(25);

/// How the clock advances the drone
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TickMode {
    /// One tick per path point, the interval is derived from the duration
    PerPoint,

    /// Fixed wall-clock interval, positions are sampled along the path
    Fixed(Duration),
}

/// Timing of a simulated delivery
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TimerSettings {
    /// Total time from origin to destination
    pub duration: Duration,

    /// Tick behavior
    pub tick: TickMode,
}

impl Default for TimerSettings {
    fn default() -> Self {
        TimerSettings {
            duration: DEFAULT_DELIVERY_DURATION,
            tick: TickMode::PerPoint,
        }
    }
}

impl TimerSettings {
    /// Interval between ticks and the number of ticks to reach the
    /// destination, for a path of `path_len` points.
    pub fn schedule(&self, path_len: usize) -> (Duration, usize) {
        match self.tick {
            TickMode::PerPoint => {
                let ticks = path_len.saturating_sub(1).max(1);
                (self.duration / ticks as u32, ticks)
            }
            TickMode::Fixed(interval) => {
                if interval.is_zero() {
                    return (interval, 1);
                }

                let ticks = (self.duration.as_secs_f64() / interval.as_secs_f64()).ceil();
                (interval, (ticks as usize).max(1))
            }
        }
    }
}

/// Picks the drone position for one tick: `(path, tick mode, tick, fraction)`
pub type PositionSampler = fn(&Path, TickMode, usize, f64) -> Result<Coordinate, CoordinateError>;

/// Path point `tick` in per-point mode, the path sampled at `fraction`
/// otherwise
pub fn sample_path(
    path: &Path,
    tick_mode: TickMode,
    tick: usize,
    fraction: f64,
) -> Result<Coordinate, CoordinateError> {
    match tick_mode {
        TickMode::PerPoint => match path.points().get(tick) {
            Some(point) => Ok(*point),
            None => path.position_at(fraction),
        },
        TickMode::Fixed(_) => path.position_at(fraction),
    }
}

/// Moves the drone from a fixed origin to the destination over a set
/// duration.
#[derive(Clone)]
pub struct TimerSource {
    origin: Coordinate,
    planner: PathPlanner,
    steps: usize,
    settings: TimerSettings,
    sampler: PositionSampler,
}

impl std::fmt::Debug for TimerSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerSource")
            .field("origin", &self.origin)
            .field("planner", &self.planner)
            .field("steps", &self.steps)
            .field("settings", &self.settings)
            .finish()
    }
}

impl TimerSource {
    /// Create a simulated source departing from `origin`
    pub fn new(
        origin: Coordinate,
        planner: PathPlanner,
        steps: usize,
        settings: TimerSettings,
    ) -> Self {
        TimerSource {
            origin,
            planner,
            steps,
            settings,
            sampler: sample_path,
        }
    }

    /// Replace the per-tick position sampler
    pub fn with_sampler(mut self, sampler: PositionSampler) -> Self {
        self.sampler = sampler;
        self
    }

    async fn simulate(self, publisher: SessionPublisher, destination: Coordinate) {
        let path = match self.planner.plan(&self.origin, &destination, self.steps) {
            Ok(path) => Arc::new(path),
            Err(e) => {
                tracking_error!("(simulate) could not plan path: {}", e);
                publisher.update(|state| {
                    state.status = SessionStatus::Error;
                    state.error = Some(e.to_string());
                });
                return;
            }
        };

        let duration = self.settings.duration;
        let (period, total_ticks) = self.settings.schedule(path.len());
        tracking_info!(
            "(simulate) {} points over {:?}, {} ticks every {:?}.",
            path.len(),
            duration,
            total_ticks,
            period
        );

        publisher.update(|state| {
            state.origin = Some(path.origin());
            state.path = Some(path.clone());
            state.position = Some(path.origin());
            state.progress = 0.0;
            state.remaining = Some(duration);
            state.error = None;
            state.status = SessionStatus::InTransit;
        });

        if period.is_zero() {
            arrive(&publisher, destination);
            return;
        }

        let cancel = publisher.cancel_token().clone();
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut ticks: usize = 0;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracking_debug!("(simulate) cancelled after {} ticks.", ticks);
                    return;
                }
                _ = interval.tick() => {}
            }

            ticks += 1;
            if ticks >= total_ticks {
                arrive(&publisher, destination);
                return;
            }

            let fraction = ticks as f64 / total_ticks as f64;
            let position = match (self.sampler)(&path, self.settings.tick, ticks, fraction) {
                Ok(position) => position,
                Err(e) => {
                    tracking_error!("(simulate) invalid position at tick {}: {}", ticks, e);
                    publisher.update(|state| {
                        state.position = Some(destination);
                        state.status = SessionStatus::Error;
                        state.error = Some(String::from(
                            "The drone position could not be computed, tracking stopped.",
                        ));
                    });
                    return;
                }
            };

            publisher.update(|state| {
                state.position = Some(position);
                state.progress = fraction * 100.0;
                state.remaining = Some(duration.mul_f64((1.0 - fraction).max(0.0)));
            });
        }
    }
}

fn arrive(publisher: &SessionPublisher, destination: Coordinate) {
    tracking_info!("(arrive) simulated drone reached {}.", destination);
    publisher.update(|state| {
        state.position = Some(destination);
        state.progress = 100.0;
        state.remaining = Some(Duration::ZERO);
        state.status = SessionStatus::Arrived;
    });
}

impl PositionSource for TimerSource {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn run(
        self: Box<Self>,
        publisher: SessionPublisher,
        destination: Coordinate,
    ) -> BoxFuture<'static, ()> {
        Box::pin((*self).simulate(publisher, destination))
    }
}
