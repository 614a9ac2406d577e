//! Client for the drone mission server's trigger endpoint.

use crate::tracking::Coordinate;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How long to wait for the mission server to accept a delivery
const TRIGGER_TIMEOUT: Duration = Duration::from_secs(15);

/// Body of `POST /trigger`
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct TriggerRequest {
    /// Delivery latitude in degrees
    pub target_lat: f64,

    /// Delivery longitude in degrees
    pub target_lon: f64,

    /// Cruise altitude above the launch point, server default if absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude_m: Option<f64>,
}

/// Acknowledgment returned by the mission server
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TriggerAck {
    /// e.g. "accepted"
    #[serde(default)]
    pub status: Option<String>,

    /// Target echoed back as `[lat, lon]`
    #[serde(default)]
    pub target: Option<[f64; 2]>,
}

/// Reasons a delivery mission could not be started
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerError {
    /// The mission server answered with a non-2xx status
    Http {
        /// HTTP status code
        status: u16,

        /// Response body, as text
        body: String,
    },

    /// The mission server could not be reached
    Network(String),
}

impl std::fmt::Display for TriggerError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            TriggerError::Http { status, body } => write!(
                f,
                "The delivery service rejected the order (HTTP {}): {}",
                status, body
            ),
            TriggerError::Network(e) => write!(f, "Failed to trigger mission: {}", e),
        }
    }
}

impl std::error::Error for TriggerError {}

/// Talks to the mission server
#[derive(Debug, Clone)]
pub struct MissionClient {
    client: reqwest::Client,
    trigger_url: String,
}

impl MissionClient {
    /// Client for the mission server at `base_url`
    pub fn new(base_url: &str) -> Result<Self, TriggerError> {
        let client = reqwest::Client::builder()
            .timeout(TRIGGER_TIMEOUT)
            .build()
            .map_err(|e| TriggerError::Network(e.to_string()))?;

        Ok(MissionClient {
            client,
            trigger_url: format!("{}/trigger", base_url.trim_end_matches('/')),
        })
    }

    /// Full URL of the trigger endpoint
    pub fn trigger_url(&self) -> &str {
        &self.trigger_url
    }

    /// Ask the mission server to fly to `target`.
    ///
    /// A 2xx answer is success; its body is parsed as a [`TriggerAck`]
    /// when possible.
    pub async fn trigger(
        &self,
        target: &Coordinate,
        altitude_m: Option<f64>,
    ) -> Result<Option<TriggerAck>, TriggerError> {
        let request = TriggerRequest {
            target_lat: target.latitude(),
            target_lon: target.longitude(),
            altitude_m,
        };
        storefront_info!("(trigger) POST {} {:?}", self.trigger_url, request);

        let response = self
            .client
            .post(&self.trigger_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                storefront_error!("(trigger) request failed: {}", e);
                TriggerError::Network(e.to_string())
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            storefront_error!("(trigger) could not read response: {}", e);
            TriggerError::Network(e.to_string())
        })?;

        if !status.is_success() {
            storefront_warn!("(trigger) mission rejected with {}: {}", status, body);
            return Err(TriggerError::Http {
                status: status.as_u16(),
                body,
            });
        }

        match serde_json::from_str::<TriggerAck>(&body) {
            Ok(ack) => {
                storefront_info!("(trigger) mission accepted: {:?}", ack);
                Ok(Some(ack))
            }
            Err(e) => {
                storefront_debug!("(trigger) accepted without acknowledgment body: {}", e);
                Ok(None)
            }
        }
    }
}
