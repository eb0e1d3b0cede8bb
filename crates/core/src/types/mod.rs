//! Core types for the marketplace.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod entry;
pub mod id;
pub mod price;
pub mod quantity;

pub use entry::{CartEntry, NewCartEntry};
pub use id::*;
pub use price::Price;
pub use quantity::{Quantity, QuantityError};
