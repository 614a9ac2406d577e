//! Storefront
//! Catalog, cart, mission trigger and checkout.

#[macro_use]
pub mod macros;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod mission;

pub use cart::{Cart, CartAction, CartError, CartLine};
pub use catalog::{Catalog, CatalogError, Product};
pub use checkout::{CheckoutError, Order, Storefront};
pub use mission::{MissionClient, TriggerAck, TriggerError, TriggerRequest};
