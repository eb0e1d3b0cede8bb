//! Cart line items.

use serde::{Deserialize, Serialize};

use super::{Price, ProductId, Quantity};

/// A product as offered to the cart, before it has a quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCartEntry {
    /// Catalog product ID.
    pub id: ProductId,
    /// Display title.
    pub title: String,
    /// Product image URL.
    pub image_url: String,
    /// Unit price.
    pub price: Price,
}

/// One distinct product in the cart.
///
/// Serialized with the field names `id`, `title`, `image_url`, `price` and
/// `quantity`; that layout is the persisted snapshot format and must not
/// change without a migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartEntry {
    /// Catalog product ID. Unique within a cart.
    pub id: ProductId,
    /// Display title.
    pub title: String,
    /// Product image URL.
    pub image_url: String,
    /// Unit price.
    pub price: Price,
    /// Units of this product in the cart.
    pub quantity: Quantity,
}

impl CartEntry {
    /// Create a line holding a single unit of `product`.
    #[must_use]
    pub fn from_new(product: NewCartEntry) -> Self {
        let NewCartEntry {
            id,
            title,
            image_url,
            price,
        } = product;

        Self {
            id,
            title,
            image_url,
            price,
            quantity: Quantity::ONE,
        }
    }
}

impl From<NewCartEntry> for CartEntry {
    fn from(product: NewCartEntry) -> Self {
        Self::from_new(product)
    }
}
