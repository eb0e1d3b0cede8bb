//! Cart state container.
//!
//! [`CartStore`] holds the current cart as an immutable snapshot behind a
//! `watch` channel and owns one background worker task. The worker reads the
//! saved snapshot once (hydration), then writes every new snapshot in the
//! order mutations happened. Mutations never wait on storage.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use marketplace_core::{CartEntry, NewCartEntry, ProductId};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, instrument, warn};

use crate::config::CartConfig;
use crate::error::{CartError, Result};
use crate::state::{self, Outcome};
use crate::storage::KeyValueStore;

/// Callback invoked when writing a snapshot fails.
///
/// Failures are never returned to the code that mutated the cart; this hook
/// is the only place they surface.
pub type PersistFailureHook = Arc<dyn Fn(&CartError) + Send + Sync>;

/// Shared shopping cart.
///
/// Cheaply cloneable; every clone observes and mutates the same cart.
///
/// # Examples
///
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> marketplace_cart::Result<()> {
/// use std::sync::Arc;
///
/// use marketplace_cart::{CartConfig, CartStore, MemoryStore, NewCartEntry, Price, ProductId};
///
/// let cart = CartStore::new(Arc::new(MemoryStore::new()), &CartConfig::default());
/// cart.hydrated().await?;
///
/// cart.add_to_cart(NewCartEntry {
///     id: ProductId::new("a"),
///     title: "Shoe".to_string(),
///     image_url: "https://cdn.example.com/shoe.png".to_string(),
///     price: Price::from_cents(1000),
/// });
/// cart.increment(&ProductId::new("a"))?;
///
/// assert_eq!(cart.item_count(), 2);
/// cart.flush().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct CartStore {
    inner: Arc<CartStoreInner>,
}

struct CartStoreInner {
    state: Arc<SharedState>,
    /// Only the worker holds the sender, so a dead worker closes this channel.
    hydrated: watch::Receiver<bool>,
    commands: mpsc::UnboundedSender<Command>,
}

/// State shared between the handle and the worker.
struct SharedState {
    products: watch::Sender<Arc<[CartEntry]>>,
    /// Set by the first mutation; a later hydration must not clobber it.
    mutated: AtomicBool,
}

enum Command {
    Persist(Arc<[CartEntry]>),
    Flush(oneshot::Sender<()>),
}

impl CartStore {
    /// Create a cart and start hydrating it from `backend`.
    ///
    /// Returns immediately with an empty cart; the saved snapshot (if any)
    /// replaces it once the worker has read it. Persist failures are logged.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn new(backend: Arc<dyn KeyValueStore>, config: &CartConfig) -> Self {
        Self::with_failure_hook(backend, config, Arc::new(log_persist_failure))
    }

    /// Create a cart that reports persist failures to `on_failure`.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn with_failure_hook(
        backend: Arc<dyn KeyValueStore>,
        config: &CartConfig,
        on_failure: PersistFailureHook,
    ) -> Self {
        let state = Arc::new(SharedState {
            products: watch::Sender::new(Arc::from(Vec::new())),
            mutated: AtomicBool::new(false),
        });
        let (commands, rx) = mpsc::unbounded_channel();
        let (hydrated_tx, hydrated) = watch::channel(false);

        tokio::spawn(run_worker(
            backend,
            config.storage_key.clone(),
            Arc::clone(&state),
            hydrated_tx,
            rx,
            on_failure,
        ));

        Self {
            inner: Arc::new(CartStoreInner {
                state,
                hydrated,
                commands,
            }),
        }
    }

    /// Current cart lines, newest product first.
    #[must_use]
    pub fn products(&self) -> Arc<[CartEntry]> {
        self.inner.state.products.borrow().clone()
    }

    /// Subscribe to cart changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<[CartEntry]>> {
        self.inner.state.products.subscribe()
    }

    /// Total units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        state::item_count(&self.inner.state.products.borrow())
    }

    /// Whether the saved snapshot has been loaded (or found absent).
    #[must_use]
    pub fn is_hydrated(&self) -> bool {
        *self.inner.hydrated.borrow()
    }

    /// Wait until hydration has finished.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::WorkerStopped`] if the worker went away first.
    pub async fn hydrated(&self) -> Result<()> {
        let mut rx = self.inner.hydrated.clone();
        rx.wait_for(|hydrated| *hydrated)
            .await
            .map_err(|_| CartError::WorkerStopped)?;
        Ok(())
    }

    /// Add one unit of `product`.
    ///
    /// A product already in the cart gains a unit and keeps its position;
    /// a new product goes to the front with a quantity of one.
    pub fn add_to_cart(&self, product: NewCartEntry) {
        let id = product.id.clone();
        self.apply(|entries| Outcome::Changed(state::with_added(entries, product)));
        debug!(product_id = %id, "Added to cart");
    }

    /// Add one unit to the line for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NotInCart`] if no line matches; the cart is left
    /// unchanged and nothing is persisted.
    pub fn increment(&self, id: &ProductId) -> Result<()> {
        if !self.apply(|entries| state::with_incremented(entries, id)) {
            return Err(CartError::NotInCart(id.clone()));
        }
        debug!(product_id = %id, "Incremented cart line");
        Ok(())
    }

    /// Remove one unit from the line for `id`; the line goes away at zero.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NotInCart`] if no line matches; the cart is left
    /// unchanged and nothing is persisted.
    pub fn decrement(&self, id: &ProductId) -> Result<()> {
        if !self.apply(|entries| state::with_decremented(entries, id)) {
            return Err(CartError::NotInCart(id.clone()));
        }
        debug!(product_id = %id, "Decremented cart line");
        Ok(())
    }

    /// Wait until every persist queued so far has been attempted.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::WorkerStopped`] if the worker is gone.
    pub async fn flush(&self) -> Result<()> {
        let (done, rx) = oneshot::channel();
        self.inner
            .commands
            .send(Command::Flush(done))
            .map_err(|_| CartError::WorkerStopped)?;
        rx.await.map_err(|_| CartError::WorkerStopped)
    }

    /// Swap in the next snapshot and queue it for persistence.
    ///
    /// The queue send happens under the channel's write lock so persists are
    /// ordered exactly like the mutations that produced them.
    fn apply(&self, op: impl FnOnce(&[CartEntry]) -> Outcome) -> bool {
        let state = &self.inner.state;
        let commands = &self.inner.commands;

        state.products.send_if_modified(|current| match op(current) {
            Outcome::Changed(next) => {
                let next: Arc<[CartEntry]> = Arc::from(next);
                state.mutated.store(true, Ordering::SeqCst);
                if commands.send(Command::Persist(Arc::clone(&next))).is_err() {
                    warn!("Cart worker stopped; change will not be persisted");
                }
                *current = next;
                true
            }
            Outcome::Missing => false,
        })
    }
}

impl fmt::Debug for CartStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CartStore")
            .field("lines", &self.products().len())
            .field("hydrated", &self.is_hydrated())
            .finish_non_exhaustive()
    }
}

/// Default persist failure hook.
fn log_persist_failure(error: &CartError) {
    error!(error = %error, "Failed to persist cart");
}

// =============================================================================
// Worker
// =============================================================================

/// Background task: hydrate once, then persist snapshots in order.
///
/// Exits when every `CartStore` handle has been dropped and the queue drained.
async fn run_worker(
    backend: Arc<dyn KeyValueStore>,
    key: String,
    state: Arc<SharedState>,
    hydrated: watch::Sender<bool>,
    mut rx: mpsc::UnboundedReceiver<Command>,
    on_failure: PersistFailureHook,
) {
    hydrate(backend.as_ref(), &key, &state).await;
    hydrated.send_replace(true);

    while let Some(command) = rx.recv().await {
        match command {
            Command::Persist(snapshot) => {
                if let Err(e) = persist(backend.as_ref(), &key, &snapshot).await {
                    on_failure(&e);
                }
            }
            Command::Flush(done) => {
                let _ = done.send(());
            }
        }
    }

    debug!("Cart worker finished");
}

#[instrument(skip_all, fields(key = %key))]
async fn hydrate(backend: &dyn KeyValueStore, key: &str, state: &SharedState) {
    match load_snapshot(backend, key).await {
        Ok(Some(entries)) => {
            let lines = entries.len();
            let applied = state.products.send_if_modified(|current| {
                if state.mutated.load(Ordering::SeqCst) {
                    return false;
                }
                *current = Arc::from(entries);
                true
            });

            if applied {
                info!(lines, "Cart restored from storage");
            } else {
                warn!(lines, "Cart changed before hydration finished; saved cart discarded");
            }
        }
        Ok(None) => info!("No saved cart, starting empty"),
        Err(e) => warn!(error = %e, "Could not load saved cart, starting empty"),
    }
}

async fn load_snapshot(backend: &dyn KeyValueStore, key: &str) -> Result<Option<Vec<CartEntry>>> {
    let Some(raw) = backend.get(key).await? else {
        return Ok(None);
    };

    let entries: Vec<CartEntry> = serde_json::from_str(&raw)?;
    state::validate_snapshot(&entries)?;
    Ok(Some(entries))
}

#[instrument(skip_all, fields(key = %key, lines = snapshot.len()))]
async fn persist(backend: &dyn KeyValueStore, key: &str, snapshot: &[CartEntry]) -> Result<()> {
    let json = serde_json::to_string(snapshot)?;
    backend.set(key, json).await?;
    debug!("Cart persisted");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use marketplace_core::{Price, Quantity};

    use super::*;
    use crate::storage::{MemoryStore, StorageError};

    const KEY: &str = "@GoMarketplace:products";

    fn config() -> CartConfig {
        CartConfig::default().with_storage_key(KEY)
    }

    fn product(id: &str) -> NewCartEntry {
        NewCartEntry {
            id: ProductId::new(id),
            title: "Shoe".to_string(),
            image_url: format!("https://cdn.example.com/{id}.png"),
            price: Price::from_cents(1000),
        }
    }

    fn saved(backend: &MemoryStore) -> Vec<CartEntry> {
        serde_json::from_str(&backend.peek(KEY).unwrap()).unwrap()
    }

    async fn hydrated_cart(backend: &Arc<MemoryStore>) -> CartStore {
        let cart = CartStore::new(backend.clone(), &config());
        cart.hydrated().await.unwrap();
        cart
    }

    #[tokio::test]
    async fn test_scenario_add_add_decrement_decrement() {
        let backend = Arc::new(MemoryStore::new());
        let cart = hydrated_cart(&backend).await;
        let a = ProductId::new("a");

        cart.add_to_cart(product("a"));
        assert_eq!(cart.products().len(), 1);
        assert_eq!(cart.products()[0].quantity.get(), 1);

        cart.add_to_cart(product("a"));
        assert_eq!(cart.products()[0].quantity.get(), 2);

        cart.decrement(&a).unwrap();
        assert_eq!(cart.products()[0].quantity.get(), 1);

        cart.decrement(&a).unwrap();
        assert!(cart.products().is_empty());

        cart.flush().await.unwrap();
        assert_eq!(backend.writes().len(), 4);
        assert!(saved(&backend).is_empty());
    }

    #[tokio::test]
    async fn test_every_mutation_persists_full_snapshot() {
        let backend = Arc::new(MemoryStore::new());
        let cart = hydrated_cart(&backend).await;

        cart.add_to_cart(product("a"));
        cart.add_to_cart(product("b"));
        cart.increment(&ProductId::new("a")).unwrap();
        cart.flush().await.unwrap();

        let writes = backend.writes();
        assert_eq!(writes.len(), 3);
        assert!(writes.iter().all(|(key, _)| key == KEY));

        let last: Vec<CartEntry> = serde_json::from_str(&writes[2].1).unwrap();
        assert_eq!(last, cart.products().to_vec());
    }

    #[tokio::test]
    async fn test_persists_in_mutation_order() {
        let backend = Arc::new(MemoryStore::new());
        let cart = hydrated_cart(&backend).await;

        for _ in 0..20 {
            cart.add_to_cart(product("a"));
        }
        cart.flush().await.unwrap();

        let counts: Vec<u32> = backend
            .writes()
            .iter()
            .map(|(_, json)| {
                let entries: Vec<CartEntry> = serde_json::from_str(json).unwrap();
                entries[0].quantity.get()
            })
            .collect();
        assert_eq!(counts, (1..=20).collect::<Vec<_>>());
        assert_eq!(saved(&backend)[0].quantity.get(), 20);
    }

    #[tokio::test]
    async fn test_reload_round_trip() {
        let backend = Arc::new(MemoryStore::new());
        let cart = hydrated_cart(&backend).await;
        cart.add_to_cart(product("a"));
        cart.add_to_cart(product("b"));
        cart.add_to_cart(product("a"));
        cart.flush().await.unwrap();
        let before = cart.products();
        drop(cart);

        let reopened = hydrated_cart(&backend).await;
        assert_eq!(reopened.products(), before);
    }

    #[tokio::test]
    async fn test_starts_empty_then_hydrates() {
        let entries = vec![CartEntry {
            quantity: Quantity::new(3).unwrap(),
            ..CartEntry::from_new(product("a"))
        }];
        let backend = Arc::new(MemoryStore::with_value(
            KEY,
            serde_json::to_string(&entries).unwrap(),
        ));

        let cart = CartStore::new(backend.clone(), &config());
        assert!(!cart.is_hydrated());
        assert!(cart.products().is_empty());

        cart.hydrated().await.unwrap();
        assert!(cart.is_hydrated());
        assert_eq!(cart.products().to_vec(), entries);
        assert_eq!(cart.item_count(), 3);

        cart.flush().await.unwrap();
        assert!(backend.writes().is_empty(), "hydration must not write");
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_starts_empty() {
        let backend = Arc::new(MemoryStore::with_value(KEY, "{not json"));
        let cart = hydrated_cart(&backend).await;
        assert!(cart.products().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_ids_snapshot_starts_empty() {
        let entry = CartEntry::from_new(product("a"));
        let json = serde_json::to_string(&[entry.clone(), entry]).unwrap();
        let backend = Arc::new(MemoryStore::with_value(KEY, json));

        let cart = hydrated_cart(&backend).await;
        assert!(cart.products().is_empty());
    }

    #[tokio::test]
    async fn test_read_failure_starts_empty() {
        let backend = Arc::new(MemoryStore::with_value(KEY, "[]"));
        backend.fail_reads(true);

        let cart = hydrated_cart(&backend).await;
        assert!(cart.is_hydrated());
        assert!(cart.products().is_empty());
    }

    #[tokio::test]
    async fn test_write_failure_reaches_hook_not_caller() {
        let backend = Arc::new(MemoryStore::new());
        backend.fail_writes(true);

        let failures = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&failures);
        let cart = CartStore::with_failure_hook(
            backend.clone(),
            &config(),
            Arc::new(move |error: &CartError| {
                assert!(matches!(error, CartError::Storage(_)));
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        cart.add_to_cart(product("a"));
        cart.add_to_cart(product("a"));
        cart.flush().await.unwrap();

        assert_eq!(failures.load(Ordering::SeqCst), 2);
        assert_eq!(cart.products()[0].quantity.get(), 2);
    }

    #[tokio::test]
    async fn test_missing_id_is_error_and_not_persisted() {
        let backend = Arc::new(MemoryStore::new());
        let cart = hydrated_cart(&backend).await;
        cart.add_to_cart(product("a"));

        let ghost = ProductId::new("ghost");
        assert!(matches!(cart.increment(&ghost), Err(CartError::NotInCart(id)) if id == ghost));
        assert!(matches!(cart.decrement(&ghost), Err(CartError::NotInCart(_))));

        cart.flush().await.unwrap();
        assert_eq!(backend.writes().len(), 1);
        assert_eq!(cart.products().len(), 1);
    }

    #[tokio::test]
    async fn test_mutation_before_hydration_wins() {
        let stale = vec![CartEntry::from_new(product("old"))];
        let backend = Arc::new(MemoryStore::with_value(
            KEY,
            serde_json::to_string(&stale).unwrap(),
        ));

        // The worker has not been polled yet on the current-thread runtime.
        let cart = CartStore::new(backend.clone(), &config());
        cart.add_to_cart(product("new"));

        cart.hydrated().await.unwrap();
        cart.flush().await.unwrap();

        let ids: Vec<_> = cart.products().iter().map(|e| e.id.to_string()).collect();
        assert_eq!(ids, ["new"]);
        assert_eq!(saved(&backend)[0].id.as_str(), "new");
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let backend = Arc::new(MemoryStore::new());
        let cart = hydrated_cart(&backend).await;
        let mut rx = cart.subscribe();

        cart.add_to_cart(product("a"));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().len(), 1);

        assert!(cart.increment(&ProductId::new("zzz")).is_err());
        assert!(!rx.has_changed().unwrap());
    }

    /// Backend whose reads blow up, taking the worker task down with them.
    struct CrashingStore;

    #[async_trait::async_trait]
    impl KeyValueStore for CrashingStore {
        async fn get(&self, _key: &str) -> std::result::Result<Option<String>, StorageError> {
            panic!("storage driver crashed");
        }

        async fn set(&self, _key: &str, _value: String) -> std::result::Result<(), StorageError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_dead_worker_fails_waiters() {
        let cart = CartStore::new(Arc::new(CrashingStore), &config());

        let hydrated = tokio::time::timeout(Duration::from_secs(2), cart.hydrated())
            .await
            .expect("hydrated() must resolve once the worker is gone");
        assert!(matches!(hydrated, Err(CartError::WorkerStopped)));
        assert!(!cart.is_hydrated());

        let flushed = tokio::time::timeout(Duration::from_secs(2), cart.flush())
            .await
            .expect("flush() must resolve once the worker is gone");
        assert!(matches!(flushed, Err(CartError::WorkerStopped)));
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let backend = Arc::new(MemoryStore::new());
        let cart = hydrated_cart(&backend).await;
        let other = cart.clone();

        other.add_to_cart(product("a"));
        assert_eq!(cart.item_count(), 1);
    }
}
