//! Read-only product catalog.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A product that can be delivered by drone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Catalog identifier
    pub id: u32,

    /// Display name
    pub name: String,

    /// Unit price
    pub price: f64,

    /// Image URL or asset path
    pub image: String,

    /// Short description
    pub description: String,
}

lazy_static! {
    static ref BUILTIN_PRODUCTS: Vec<Product> = vec![
        Product {
            id: 1,
            name: String::from("First Aid Kit"),
            price: 24.99,
            image: String::from("/images/first-aid-kit.png"),
            description: String::from("Compact kit with bandages, antiseptic wipes and gauze."),
        },
        Product {
            id: 2,
            name: String::from("Cold Brew Coffee"),
            price: 4.5,
            image: String::from("/images/cold-brew.png"),
            description: String::from("Chilled 330 ml bottle, ready to drink."),
        },
        Product {
            id: 3,
            name: String::from("Phone Charger"),
            price: 15.0,
            image: String::from("/images/usb-c-charger.png"),
            description: String::from("20 W USB-C fast charger with a 1 m cable."),
        },
        Product {
            id: 4,
            name: String::from("Sandwich"),
            price: 6.75,
            image: String::from("/images/sandwich.png"),
            description: String::from("Freshly made grilled vegetable sandwich."),
        },
        Product {
            id: 5,
            name: String::from("AA Batteries (4 pack)"),
            price: 5.25,
            image: String::from("/images/aa-batteries.png"),
            description: String::from("Long lasting alkaline batteries."),
        },
    ];
}

/// Reasons a catalog could not be loaded
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogError {
    /// Catalog file could not be read
    Io(String),

    /// Catalog file is not a JSON list of products
    Parse(String),

    /// Two products share an id
    DuplicateId(u32),

    /// Price is negative or not a number
    InvalidPrice(u32),
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            CatalogError::Io(e) => write!(f, "Could not read the product catalog: {}", e),
            CatalogError::Parse(e) => write!(f, "The product catalog is malformed: {}", e),
            CatalogError::DuplicateId(id) => {
                write!(f, "The product catalog lists product {} more than once", id)
            }
            CatalogError::InvalidPrice(id) => {
                write!(f, "Product {} in the catalog has an invalid price", id)
            }
        }
    }
}

impl std::error::Error for CatalogError {}

/// The list of products on sale
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    products: Vec<Product>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Catalog {
    /// The catalog shipped with the service
    pub fn builtin() -> Self {
        Catalog {
            products: BUILTIN_PRODUCTS.clone(),
        }
    }

    /// Build a catalog from a list of products
    pub fn new(products: Vec<Product>) -> Result<Self, CatalogError> {
        let mut ids = HashSet::new();
        for product in &products {
            if !ids.insert(product.id) {
                return Err(CatalogError::DuplicateId(product.id));
            }

            if !product.price.is_finite() || product.price < 0.0 {
                return Err(CatalogError::InvalidPrice(product.id));
            }
        }

        Ok(Catalog { products })
    }

    /// Parse a JSON array of products
    pub fn from_json(text: &str) -> Result<Self, CatalogError> {
        let products: Vec<Product> =
            serde_json::from_str(text).map_err(|e| CatalogError::Parse(e.to_string()))?;
        Self::new(products)
    }

    /// Read a JSON catalog file
    pub async fn load(path: &str) -> Result<Self, CatalogError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CatalogError::Io(format!("{}: {}", path, e)))?;

        let catalog = Self::from_json(&text)?;
        storefront_info!(
            "(load) loaded {} products from {}.",
            catalog.products.len(),
            path
        );
        Ok(catalog)
    }

    /// All products, in catalog order
    pub fn products(&self) -> &[Product] {
        &self.products
    }

    /// Look up a product by id
    pub fn get(&self, id: u32) -> Option<&Product> {
        self.products.iter().find(|product| product.id == id)
    }
}
