//! Shopping cart reducer.

use super::catalog::Catalog;
use serde::Serialize;

/// Changes a customer can make to their cart
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CartAction {
    /// Add one unit of a product
    Add(u32),

    /// Remove a product entirely
    Remove(u32),

    /// Set the quantity of a product already in the cart, 0 removes it
    SetQuantity(u32, u32),

    /// Empty the cart
    Clear,
}

/// Reasons a cart action was rejected
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CartError {
    /// Product id not in the catalog
    UnknownProduct(u32),

    /// Product is not in the cart
    NotInCart(u32),
}

impl std::fmt::Display for CartError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            CartError::UnknownProduct(id) => write!(f, "Product {} is not sold here", id),
            CartError::NotInCart(id) => write!(f, "Product {} is not in your cart", id),
        }
    }
}

impl std::error::Error for CartError {}

/// One product and how many of it
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct CartLine {
    /// Catalog identifier
    pub product_id: u32,

    /// Units ordered, at least 1
    pub quantity: u32,
}

/// The customer's cart, lines kept in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// An empty cart
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one action
    pub fn apply(&mut self, action: CartAction, catalog: &Catalog) -> Result<(), CartError> {
        match action {
            CartAction::Add(id) => {
                if catalog.get(id).is_none() {
                    return Err(CartError::UnknownProduct(id));
                }

                match self.lines.iter_mut().find(|line| line.product_id == id) {
                    Some(line) => line.quantity = line.quantity.saturating_add(1),
                    None => self.lines.push(CartLine {
                        product_id: id,
                        quantity: 1,
                    }),
                }
            }
            CartAction::Remove(id) => {
                let before = self.lines.len();
                self.lines.retain(|line| line.product_id != id);
                if self.lines.len() == before {
                    return Err(CartError::NotInCart(id));
                }
            }
            CartAction::SetQuantity(id, 0) => return self.apply(CartAction::Remove(id), catalog),
            CartAction::SetQuantity(id, quantity) => {
                let Some(line) = self.lines.iter_mut().find(|line| line.product_id == id) else {
                    return Err(CartError::NotInCart(id));
                };
                line.quantity = quantity;
            }
            CartAction::Clear => self.lines.clear(),
        }

        storefront_debug!("(apply) {:?} -> {} lines.", action, self.lines.len());
        Ok(())
    }

    /// Lines in the cart
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// True if nothing was added
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total number of units
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|line| line.quantity).sum()
    }

    /// Total price, products missing from `catalog` count as free
    pub fn total(&self, catalog: &Catalog) -> f64 {
        self.lines
            .iter()
            .filter_map(|line| {
                catalog
                    .get(line.product_id)
                    .map(|product| product.price * line.quantity as f64)
            })
            .sum()
    }
}
