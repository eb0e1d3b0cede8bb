//! Integration tests for the marketplace cart.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p marketplace-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `cart_persistence` - Carts surviving restarts on the file store
//! - `cart_provider` - Scoped lookup from nested code

#![cfg_attr(not(test), forbid(unsafe_code))]

use marketplace_core::{NewCartEntry, Price, ProductId};

/// Build a catalog product for tests.
#[must_use]
pub fn product(id: &str, title: &str, cents: i64) -> NewCartEntry {
    NewCartEntry {
        id: ProductId::new(id),
        title: title.to_string(),
        image_url: format!("https://cdn.example.com/products/{id}.png"),
        price: Price::from_cents(cents),
    }
}
