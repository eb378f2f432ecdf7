//! ShoppingCart: the façade UI code holds.
//!
//! Wires the store, persister, mutator, scheduler and reconciler together
//! from one [`CartOptions`] value. Must be constructed inside a tokio runtime
//! (the persister and debounce timers are tasks).

use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::storage::{load_cart, CartPersister, PersistenceAdapter};
use crate::store::{CartEvent, LocalCartStore, Unsubscribe};
use crate::sync::{
    DebounceScope, MutationErrorCallback, OptimisticMutator, ProductLookup, Reconciler,
    RemoteCartService, DEFAULT_DEBOUNCE_MS,
};
use crate::types::{CartLine, MutationOutcome, NewCartItem, ReconcileReport};

/// Storage key used when `CartOptions::storage_key` is `None`.
pub const DEFAULT_STORAGE_KEY: &str = "cart";

/// Configuration for [`ShoppingCart`].
pub struct CartOptions {
    pub remote: Arc<dyn RemoteCartService>,
    pub products: Arc<dyn ProductLookup>,
    pub storage: Arc<dyn PersistenceAdapter>,
    /// Key the cart snapshot is stored under (default: `"cart"`)
    pub storage_key: Option<String>,
    /// Debounce quiescence window in milliseconds (default: 1000)
    pub debounce_ms: Option<u64>,
    /// Debounce keying (default: `DebounceScope::PerLine`)
    pub debounce_scope: Option<DebounceScope>,
    /// Called whenever a mutation is rolled back
    pub on_error: Option<Arc<MutationErrorCallback>>,
}

impl CartOptions {
    pub fn new(
        remote: Arc<dyn RemoteCartService>,
        products: Arc<dyn ProductLookup>,
        storage: Arc<dyn PersistenceAdapter>,
    ) -> Self {
        Self {
            remote,
            products,
            storage,
            storage_key: None,
            debounce_ms: None,
            debounce_scope: None,
            on_error: None,
        }
    }
}

pub struct ShoppingCart {
    store: Arc<LocalCartStore>,
    mutator: OptimisticMutator,
    reconciler: Reconciler,
    persister: CartPersister,
    unsubscribe_persister: Option<Unsubscribe>,
}

impl ShoppingCart {
    /// Hydrate from storage and start the persister.
    ///
    /// A missing snapshot gives an empty cart; an unreadable one is logged
    /// and also gives an empty cart.
    pub fn new(options: CartOptions) -> Self {
        let storage_key = options
            .storage_key
            .unwrap_or_else(|| DEFAULT_STORAGE_KEY.to_string());

        let lines = load_cart(options.storage.as_ref(), &storage_key).unwrap_or_else(|e| {
            tracing::warn!(key = %storage_key, error = %e, "could not restore persisted cart; starting empty");
            Vec::new()
        });
        let store = Arc::new(LocalCartStore::from_lines(lines));

        let persister = CartPersister::spawn(
            Arc::clone(&options.storage),
            storage_key,
            Arc::downgrade(&store),
        );
        let unsubscribe_persister = {
            let persister = persister.clone();
            store.subscribe(move |_| persister.mark_dirty())
        };

        let debounce = Duration::from_millis(options.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS));
        let mutator = OptimisticMutator::new(
            Arc::clone(&store),
            Arc::clone(&options.remote),
            debounce,
            options.debounce_scope.unwrap_or_default(),
            options.on_error,
        );
        let reconciler = Reconciler::new(
            Arc::clone(&store),
            options.remote,
            options.products,
            Arc::clone(mutator.scheduler()),
        );

        Self {
            store,
            mutator,
            reconciler,
            persister,
            unsubscribe_persister: Some(unsubscribe_persister),
        }
    }

    /// The underlying store, for read access and subscriptions.
    pub fn store(&self) -> &Arc<LocalCartStore> {
        &self.store
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    pub async fn add_item(&self, item: NewCartItem) -> Result<MutationOutcome> {
        self.mutator.add_item(item).await
    }

    pub async fn remove_item(&self, product_id: &str) -> MutationOutcome {
        self.mutator.remove_item(product_id).await
    }

    pub async fn update_quantity(&self, product_id: &str, quantity: i64) -> MutationOutcome {
        self.mutator.update_quantity(product_id, quantity).await
    }

    pub async fn clear_cart(&self) -> MutationOutcome {
        self.mutator.clear_cart().await
    }

    pub fn clear_local(&self) {
        self.mutator.clear_local();
    }

    pub async fn sync_with_backend(&self) -> Result<ReconcileReport> {
        self.reconciler.sync_with_backend().await
    }

    /// Send debounced writes now instead of waiting out their windows.
    pub async fn flush_pending_writes(&self) -> usize {
        self.mutator.scheduler().flush().await
    }

    pub fn pending_writes(&self) -> usize {
        self.mutator.scheduler().pending_count()
    }

    /// Wait for every queued snapshot to reach storage.
    pub async fn flush_persistence(&self) {
        self.persister.flush().await;
    }

    pub fn last_error(&self) -> Option<String> {
        self.mutator.last_error()
    }

    pub fn clear_error(&self) {
        self.mutator.clear_error();
    }

    /// Cancel pending writes and stop accepting new ones.
    pub fn dispose(&self) {
        self.mutator.scheduler().dispose();
    }

    // -----------------------------------------------------------------------
    // Reads and selection
    // -----------------------------------------------------------------------

    pub fn lines(&self) -> Vec<CartLine> {
        self.store.lines()
    }

    pub fn line(&self, product_id: &str) -> Option<CartLine> {
        self.store.line(product_id)
    }

    pub fn total_price(&self) -> f64 {
        self.store.total_price()
    }

    pub fn total_items(&self) -> u64 {
        self.store.total_items()
    }

    pub fn selected_total_price(&self) -> f64 {
        self.store.selected_total_price()
    }

    pub fn selected_items_count(&self) -> u64 {
        self.store.selected_items_count()
    }

    pub fn toggle_item_selection(&self, product_id: &str) -> bool {
        self.store.toggle_item_selection(product_id)
    }

    pub fn select_all_items(&self) {
        self.store.select_all_items();
    }

    pub fn unselect_all_items(&self) {
        self.store.unselect_all_items();
    }

    pub fn subscribe(&self, listener: impl Fn(&CartEvent) + Send + Sync + 'static) -> Unsubscribe {
        self.store.subscribe(listener)
    }
}

impl Drop for ShoppingCart {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe_persister.take() {
            unsubscribe();
        }
    }
}
