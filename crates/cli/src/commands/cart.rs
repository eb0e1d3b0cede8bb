//! Cart commands backed by the local file store.
//!
//! # Environment Variables
//!
//! - `CART_STORAGE_DIR` - Directory holding the cart snapshot
//! - `CART_STORAGE_KEY` - Key the snapshot is stored under

use std::fmt::Write as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use marketplace_cart::{CartConfig, CartError, CartStore, FileStore, state};
use marketplace_core::CartEntry;
use thiserror::Error;

/// Errors that can occur while running a cart command.
#[derive(Debug, Error)]
pub enum CartCommandError {
    /// The cart rejected the operation.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// One or more snapshot writes failed.
    #[error("Failed to save cart ({0} write(s) failed)")]
    SaveFailed(usize),
}

/// A hydrated cart plus a tally of failed writes.
pub struct CartSession {
    cart: CartStore,
    failed_writes: Arc<AtomicUsize>,
}

impl CartSession {
    /// Open the file-backed cart and wait for it to load.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart worker stops before hydration finishes.
    pub async fn open(config: &CartConfig) -> Result<Self, CartCommandError> {
        let backend = Arc::new(FileStore::new(&config.storage_dir));
        let failed_writes = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&failed_writes);
        let cart = CartStore::with_failure_hook(
            backend,
            config,
            Arc::new(move |error: &CartError| {
                tracing::error!(error = %error, "Failed to persist cart");
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        tracing::debug!(dir = %config.storage_dir.display(), "Loading cart");
        cart.hydrated().await?;

        Ok(Self {
            cart,
            failed_writes,
        })
    }

    /// The cart being edited.
    #[must_use]
    pub const fn cart(&self) -> &CartStore {
        &self.cart
    }

    /// Wait for pending writes and return the final cart.
    ///
    /// # Errors
    ///
    /// Returns [`CartCommandError::SaveFailed`] if any write failed.
    pub async fn close(self) -> Result<Arc<[CartEntry]>, CartCommandError> {
        self.cart.flush().await?;

        match self.failed_writes.load(Ordering::SeqCst) {
            0 => Ok(self.cart.products()),
            failed => Err(CartCommandError::SaveFailed(failed)),
        }
    }
}

/// Format the cart for the terminal.
#[must_use]
pub fn render(products: &[CartEntry]) -> String {
    if products.is_empty() {
        return "Cart is empty".to_string();
    }

    let items = state::item_count(products);
    let noun = if items == 1 { "item" } else { "items" };
    let mut out = format!("Cart ({items} {noun})");
    for entry in products {
        let _ = write!(
            out,
            "\n  {} x {} [{}] @ {}",
            entry.quantity, entry.title, entry.id, entry.price
        );
    }
    out
}
