//! Checkout: locate the customer, dispatch the drone, start tracking.

use super::cart::{Cart, CartLine};
use super::catalog::Catalog;
use super::mission::{MissionClient, TriggerAck, TriggerError};
use crate::config::Config;
use crate::location::{LocationAcquirer, LocationError};
use crate::tracking::{self, CoordinateError, DeliveryManager, SessionError, SessionState};
use tokio::sync::watch;
use uuid::Uuid;

/// Reasons an order could not be placed
#[derive(Debug, Clone, PartialEq)]
pub enum CheckoutError {
    /// Nothing to deliver
    EmptyCart,

    /// The customer's location could not be acquired
    Location(LocationError),

    /// The mission server did not accept the delivery
    Trigger(TriggerError),

    /// The configured store position is not a valid coordinate
    Origin(CoordinateError),

    /// Tracking could not be started
    Session(SessionError),
}

impl std::fmt::Display for CheckoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            CheckoutError::EmptyCart => write!(f, "Your cart is empty."),
            CheckoutError::Location(e) => write!(f, "{}", e),
            CheckoutError::Trigger(e) => write!(f, "{}", e),
            CheckoutError::Origin(e) => write!(f, "The store location is misconfigured: {}", e),
            CheckoutError::Session(e) => write!(f, "Delivery tracking failed: {}", e),
        }
    }
}

impl std::error::Error for CheckoutError {}

impl From<LocationError> for CheckoutError {
    fn from(e: LocationError) -> Self {
        CheckoutError::Location(e)
    }
}

impl From<TriggerError> for CheckoutError {
    fn from(e: TriggerError) -> Self {
        CheckoutError::Trigger(e)
    }
}

/// A placed order and the handle to follow its delivery
#[derive(Debug, Clone)]
pub struct Order {
    /// Session tracking this order
    pub session_id: Uuid,

    /// Ordered lines
    pub items: Vec<CartLine>,

    /// Price of the order
    pub total: f64,

    /// What the mission server answered, if anything parseable
    pub ack: Option<TriggerAck>,

    /// Live view of the delivery
    pub updates: watch::Receiver<SessionState>,
}

/// The shop: catalog, mission server and the active delivery
#[derive(Debug)]
pub struct Storefront {
    config: Config,
    catalog: Catalog,
    acquirer: LocationAcquirer,
    mission: MissionClient,
    deliveries: DeliveryManager,
}

impl Storefront {
    /// Storefront using the configured location provider and mission server
    pub fn new(config: Config, catalog: Catalog) -> Result<Self, CheckoutError> {
        let acquirer = config.location_acquirer();
        Self::with_acquirer(config, catalog, acquirer)
    }

    /// Storefront with an explicit location capability
    pub fn with_acquirer(
        config: Config,
        catalog: Catalog,
        acquirer: LocationAcquirer,
    ) -> Result<Self, CheckoutError> {
        let mission = MissionClient::new(&config.trigger_url)?;
        Ok(Storefront {
            config,
            catalog,
            acquirer,
            mission,
            deliveries: DeliveryManager::new(),
        })
    }

    /// Products on sale
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Active delivery, if any
    pub fn deliveries(&self) -> &DeliveryManager {
        &self.deliveries
    }

    /// Place an order for everything in `cart`.
    ///
    /// Any previous delivery is torn down first. The position source is
    /// built before the mission server is called and only started once the
    /// flight was accepted; if any step fails the new session is stopped
    /// again.
    pub async fn checkout(&mut self, cart: &Cart) -> Result<Order, CheckoutError> {
        if cart.is_empty() {
            storefront_warn!("(checkout) rejected empty cart.");
            return Err(CheckoutError::EmptyCart);
        }

        let result = self.place(cart).await;
        if let Err(e) = &result {
            storefront_error!("(checkout) order failed: {}", e);
            self.deliveries.end().await;
        }

        result
    }

    /// Stop tracking the active delivery
    pub async fn cancel(&mut self) {
        self.deliveries.end().await;
    }

    async fn place(&mut self, cart: &Cart) -> Result<Order, CheckoutError> {
        let total = cart.total(&self.catalog);
        let session = self.deliveries.begin().await;
        storefront_info!(
            "(place) order of {} items ({:.2}) in session {}.",
            cart.item_count(),
            total,
            session.id()
        );

        let destination = session.locate(&self.acquirer).await?;

        // no drone leaves before tracking is known to work
        let source = tracking::position_source(&self.config).map_err(CheckoutError::Origin)?;
        let ack = self
            .mission
            .trigger(&destination, self.config.altitude_m)
            .await?;

        session.start(source).map_err(CheckoutError::Session)?;

        Ok(Order {
            session_id: session.id(),
            items: cart.lines().to_vec(),
            total,
            ack,
            updates: session.subscribe(),
        })
    }
}
