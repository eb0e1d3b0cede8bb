//! Task-scoped cart lookup.
//!
//! Passing a [`CartStore`] handle explicitly is the normal way to share a
//! cart. For code that sits several layers below whatever built the cart,
//! [`CartProvider::scope`] installs the store for the duration of a future
//! and [`use_cart`] fetches it back.

use std::future::Future;

use crate::error::{CartError, Result};
use crate::store::CartStore;

tokio::task_local! {
    static CURRENT_CART: CartStore;
}

/// Makes a cart available to everything running inside [`CartProvider::scope`].
#[derive(Debug, Clone)]
pub struct CartProvider {
    store: CartStore,
}

impl CartProvider {
    /// Wrap `store`.
    #[must_use]
    pub const fn new(store: CartStore) -> Self {
        Self { store }
    }

    /// The provided store.
    #[must_use]
    pub const fn store(&self) -> &CartStore {
        &self.store
    }

    /// Run `fut` with this cart installed for [`use_cart`].
    ///
    /// Scopes nest; the innermost provider wins.
    pub async fn scope<F: Future>(&self, fut: F) -> F::Output {
        CURRENT_CART.scope(self.store.clone(), fut).await
    }
}

/// Look up the cart installed by the nearest enclosing [`CartProvider::scope`].
///
/// # Errors
///
/// Returns [`CartError::OutsideProvider`] when called outside any scope.
pub fn use_cart() -> Result<CartStore> {
    CURRENT_CART
        .try_with(CartStore::clone)
        .map_err(|_| CartError::OutsideProvider)
}
