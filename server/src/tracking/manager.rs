//! Keeps at most one delivery session alive.

use super::session::DeliverySession;

/// Owner of the active [`DeliverySession`].
///
/// Beginning a new delivery tears the previous one down completely
/// (cancelled and its source task joined) before the new state exists.
#[derive(Debug, Default)]
pub struct DeliveryManager {
    current: Option<DeliverySession>,
}

impl DeliveryManager {
    /// Create a manager without an active session
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop the current session, if any, and start a fresh one.
    pub async fn begin(&mut self) -> &mut DeliverySession {
        self.end().await;

        let session = self.current.insert(DeliverySession::new());
        tracking_info!("(begin) session {} is now active.", session.id());
        session
    }

    /// Stop and drop the current session
    pub async fn end(&mut self) {
        if let Some(mut previous) = self.current.take() {
            tracking_info!("(end) tearing down session {}.", previous.id());
            previous.stop().await;
        }
    }

    /// The active session
    pub fn current(&self) -> Option<&DeliverySession> {
        self.current.as_ref()
    }

    /// Number of position sources currently running, 0 or 1
    pub fn live_sources(&self) -> usize {
        self.current
            .as_ref()
            .map(|session| usize::from(session.is_running()))
            .unwrap_or(0)
    }
}
