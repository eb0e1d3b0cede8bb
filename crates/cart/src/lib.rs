//! Marketplace cart - client-side shopping cart state container.
//!
//! Tracks the products a shopper has picked, exposes add/increment/decrement
//! operations, and writes the whole cart to a local key-value slot after every
//! change so it survives restarts.
//!
//! # Architecture
//!
//! - [`CartStore`] owns the current snapshot and a background worker that
//!   hydrates from storage once, then persists snapshots in mutation order
//! - [`KeyValueStore`] is the storage port; [`MemoryStore`] and [`FileStore`]
//!   are the bundled adapters
//! - [`CartProvider`] installs a store for a task scope so deeply nested code
//!   can look it up with [`use_cart`]

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod provider;
pub mod state;
pub mod storage;
pub mod store;

pub use config::{CartConfig, ConfigError};
pub use error::{CartError, Result};
pub use provider::{CartProvider, use_cart};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
pub use store::{CartStore, PersistFailureHook};

pub use marketplace_core::{CartEntry, NewCartEntry, Price, ProductId, Quantity};
