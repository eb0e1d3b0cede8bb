//! Cart error types.

use marketplace_core::ProductId;
use thiserror::Error;

use crate::storage::StorageError;

/// Errors raised by the cart store and its persistence worker.
#[derive(Debug, Error)]
pub enum CartError {
    /// The storage backend failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// A snapshot could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A snapshot decoded but violates cart invariants.
    #[error("Corrupt cart snapshot: {0}")]
    CorruptSnapshot(String),

    /// The product is not in the cart.
    #[error("Product not in cart: {0}")]
    NotInCart(ProductId),

    /// `use_cart` was called outside a `CartProvider` scope.
    #[error("use_cart must be used within a CartProvider")]
    OutsideProvider,

    /// The background worker is gone (runtime shut down).
    #[error("Cart worker stopped")]
    WorkerStopped,
}

/// Result type alias for `CartError`.
pub type Result<T> = std::result::Result<T, CartError>;
