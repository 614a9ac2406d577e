//! # Config
//!
//! Define and implement config options for module

use crate::location::{FixedLocation, LocationAcquirer, LocationRequest};
use crate::tracking::path::{PathMode, PathPlanner, DEFAULT_CURVE_OFFSET};
use crate::tracking::telemetry::ReconnectPolicy;
use crate::tracking::timer::{TickMode, TimerSettings, DEFAULT_DELIVERY_DURATION};
use crate::tracking::{Coordinate, CoordinateError, TrackingMode};
use anyhow::Result;
use config::{ConfigError, Environment};
use dotenv::dotenv;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// struct holding configuration options
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// path to log configuration YAML file
    pub log_config: String,

    /// base URL of the mission server's trigger endpoint
    pub trigger_url: String,

    /// WebSocket URL of the drone telemetry feed
    pub telemetry_url: String,

    /// position source used for deliveries
    pub tracking_mode: TrackingMode,

    /// latitude of the store, origin of simulated deliveries
    pub store_latitude: f64,

    /// longitude of the store, origin of simulated deliveries
    pub store_longitude: f64,

    /// fixed customer latitude, used with `customer_longitude`
    #[serde(default)]
    pub customer_latitude: Option<f64>,

    /// fixed customer longitude, used with `customer_latitude`
    #[serde(default)]
    pub customer_longitude: Option<f64>,

    /// cruise altitude sent to the mission server
    #[serde(default)]
    pub altitude_m: Option<f64>,

    /// simulated flight time in seconds
    pub delivery_duration_secs: f64,

    /// shape of planned paths
    pub path_mode: PathMode,

    /// number of segments in a planned path
    pub path_steps: usize,

    /// sideways bend of curved paths as a fraction of their length
    pub curve_offset: f64,

    /// fixed tick interval, one tick per path point if absent
    #[serde(default)]
    pub tick_interval_ms: Option<u64>,

    /// how long to wait for the customer's location
    pub location_timeout_ms: u64,

    /// reconnect attempts after the telemetry feed drops, 0 disables
    pub telemetry_reconnect_attempts: u32,

    /// wait before each telemetry reconnect
    pub telemetry_reconnect_delay_ms: u64,

    /// JSON product catalog, built-in catalog if absent
    #[serde(default)]
    pub catalog_path: Option<String>,

    /// comma separated product ids ordered by the binary
    pub order_items: String,
}

impl Default for Config {
    fn default() -> Self {
        log::warn!("(default) Creating Config object with default values.");
        Self::new()
    }
}

impl Config {
    /// Default values for Config
    pub fn new() -> Self {
        Config {
            log_config: String::from("log4rs.yaml"),
            trigger_url: String::from("http://localhost:8000"),
            telemetry_url: String::from("ws://localhost:8000/ws/telemetry"),
            tracking_mode: TrackingMode::Simulated,
            store_latitude: 13.0698,
            store_longitude: 77.5414,
            customer_latitude: None,
            customer_longitude: None,
            altitude_m: None,
            delivery_duration_secs: DEFAULT_DELIVERY_DURATION.as_secs_f64(),
            path_mode: PathMode::Curved,
            path_steps: 50,
            curve_offset: DEFAULT_CURVE_OFFSET,
            tick_interval_ms: None,
            location_timeout_ms: 10_000,
            telemetry_reconnect_attempts: 0,
            telemetry_reconnect_delay_ms: 2_000,
            catalog_path: None,
            order_items: String::from("1"),
        }
    }

    /// Create a new `Config` object using environment variables
    pub fn try_from_env() -> Result<Self, ConfigError> {
        // read .env file if present
        dotenv().ok();
        let default_config = Config::default();

        config::Config::builder()
            .set_default("log_config", default_config.log_config)?
            .set_default("trigger_url", default_config.trigger_url)?
            .set_default("telemetry_url", default_config.telemetry_url)?
            .set_default("tracking_mode", "simulated")?
            .set_default("store_latitude", default_config.store_latitude)?
            .set_default("store_longitude", default_config.store_longitude)?
            .set_default(
                "delivery_duration_secs",
                default_config.delivery_duration_secs,
            )?
            .set_default("path_mode", "curved")?
            .set_default("path_steps", default_config.path_steps as u64)?
            .set_default("curve_offset", default_config.curve_offset)?
            .set_default("location_timeout_ms", default_config.location_timeout_ms)?
            .set_default(
                "telemetry_reconnect_attempts",
                default_config.telemetry_reconnect_attempts,
            )?
            .set_default(
                "telemetry_reconnect_delay_ms",
                default_config.telemetry_reconnect_delay_ms,
            )?
            .set_default("order_items", default_config.order_items)?
            .add_source(Environment::default().separator("__"))
            .build()?
            .try_deserialize()
    }

    /// The store as a coordinate
    pub fn store_origin(&self) -> Result<Coordinate, CoordinateError> {
        Coordinate::new(self.store_latitude, self.store_longitude)
    }

    /// Planner for the configured path shape
    pub fn path_planner(&self) -> PathPlanner {
        PathPlanner::new(self.path_mode, self.curve_offset)
    }

    /// Simulated flight timing
    pub fn timer_settings(&self) -> TimerSettings {
        let duration = Duration::try_from_secs_f64(self.delivery_duration_secs)
            .unwrap_or_else(|e| {
                log::warn!(
                    "(timer_settings) invalid delivery duration {}: {}, using {:?}.",
                    self.delivery_duration_secs,
                    e,
                    DEFAULT_DELIVERY_DURATION
                );
                DEFAULT_DELIVERY_DURATION
            });

        let tick = match self.tick_interval_ms {
            Some(ms) if ms > 0 => TickMode::Fixed(Duration::from_millis(ms)),
            _ => TickMode::PerPoint,
        };

        TimerSettings { duration, tick }
    }

    /// Options for the customer location query
    pub fn location_request(&self) -> LocationRequest {
        LocationRequest {
            timeout: Duration::from_millis(self.location_timeout_ms),
            ..LocationRequest::default()
        }
    }

    /// Location capability of this deployment.
    ///
    /// A configured customer position acts as the provider; without one
    /// the service has no way to locate the customer.
    pub fn location_acquirer(&self) -> LocationAcquirer {
        let provider = match (self.customer_latitude, self.customer_longitude) {
            (Some(latitude), Some(longitude)) => Some(Arc::new(FixedLocation::new(
                latitude, longitude,
            )) as Arc<dyn crate::location::LocationProvider>),
            _ => None,
        };

        LocationAcquirer::new(provider, self.location_request())
    }

    /// Telemetry reconnect behavior
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts: self.telemetry_reconnect_attempts,
            delay: Duration::from_millis(self.telemetry_reconnect_delay_ms),
        }
    }

    /// Product ids listed in `order_items`, blanks skipped
    pub fn order_item_ids(&self) -> Result<Vec<u32>, std::num::ParseIntError> {
        self.order_items
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::parse)
            .collect()
    }
}
