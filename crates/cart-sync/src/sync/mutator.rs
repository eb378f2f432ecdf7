//! OptimisticMutator: local-first cart mutations with compensating rollback.
//!
//! Each operation changes the [`LocalCartStore`] synchronously, before any
//! network call is issued, then talks to the remote service. A remote failure
//! reverts the local change through the store's version-checked
//! compensations and is recorded in the shared [`LastError`] slot. Remote
//! failures never reach the caller as `Err`.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{CartError, RemoteOperation, Result};
use crate::store::LocalCartStore;
use crate::types::{MutationFailure, MutationKind, MutationOutcome, NewCartItem, RemoteLine};

use super::remote::RemoteCartService;
use super::scheduler::{DebounceScheduler, DebounceScope, PendingWrite, WriteFn, WriteFuture};

/// Callback type for rollback notifications.
pub type MutationErrorCallback = dyn Fn(&MutationFailure) + Send + Sync;

// ============================================================================
// LastError
// ============================================================================

/// The single, shared, recoverable error flag the UI reads.
pub struct LastError {
    message: Mutex<Option<String>>,
    on_error: Option<Arc<MutationErrorCallback>>,
}

impl LastError {
    pub fn new(on_error: Option<Arc<MutationErrorCallback>>) -> Self {
        Self {
            message: Mutex::new(None),
            on_error,
        }
    }

    pub fn get(&self) -> Option<String> {
        self.message.lock().clone()
    }

    pub fn clear(&self) {
        *self.message.lock() = None;
    }

    /// Turn a remote failure into an outcome.
    ///
    /// `reverted` says whether the compensation applied. If it did not, a
    /// newer mutation owns the line and the failure is stale: nothing is
    /// recorded.
    fn settle(
        &self,
        reverted: bool,
        kind: MutationKind,
        product_id: Option<&str>,
        error: CartError,
    ) -> MutationOutcome {
        if !reverted {
            tracing::debug!(?kind, ?product_id, error = %error, "discarding failure for superseded mutation");
            return MutationOutcome::Superseded;
        }

        tracing::warn!(?kind, ?product_id, error = %error, "remote write failed; local change rolled back");
        let failure = MutationFailure {
            kind,
            product_id: product_id.map(str::to_string),
            error: error.to_string(),
        };
        *self.message.lock() = Some(failure.error.clone());
        if let Some(cb) = &self.on_error {
            cb(&failure);
        }
        MutationOutcome::RolledBack
    }
}

// ============================================================================
// OptimisticMutator
// ============================================================================

pub struct OptimisticMutator {
    store: Arc<LocalCartStore>,
    remote: Arc<dyn RemoteCartService>,
    scheduler: Arc<DebounceScheduler>,
    errors: Arc<LastError>,
}

impl OptimisticMutator {
    pub fn new(
        store: Arc<LocalCartStore>,
        remote: Arc<dyn RemoteCartService>,
        debounce: Duration,
        scope: DebounceScope,
        on_error: Option<Arc<MutationErrorCallback>>,
    ) -> Self {
        let errors = Arc::new(LastError::new(on_error));
        let send = debounced_sender(Arc::clone(&store), Arc::clone(&remote), Arc::clone(&errors));
        Self {
            store,
            remote,
            scheduler: Arc::new(DebounceScheduler::new(debounce, scope, send)),
            errors,
        }
    }

    pub fn scheduler(&self) -> &Arc<DebounceScheduler> {
        &self.scheduler
    }

    pub fn last_error(&self) -> Option<String> {
        self.errors.get()
    }

    pub fn clear_error(&self) {
        self.errors.clear();
    }

    /// Add `item.quantity` units, creating the line if needed, then upsert the
    /// new total remotely.
    ///
    /// A zero quantity is rejected with [`CartError::InvalidQuantity`] and
    /// leaves the cart untouched.
    pub async fn add_item(&self, item: NewCartItem) -> Result<MutationOutcome> {
        if item.quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }

        let product_id = item.product_id.clone();
        // The immediate upsert below carries the newer total.
        self.scheduler.cancel(&product_id);
        let applied = self.store.add_quantity(item);

        let line = RemoteLine {
            product_id: product_id.clone(),
            merchant_id: applied.merchant_id.clone(),
            quantity: applied.quantity,
        };
        match self.remote.upsert_line(&line).await {
            Ok(()) => Ok(MutationOutcome::Applied),
            Err(e) => {
                let reverted = match applied.previous {
                    Some(previous) => {
                        self.store
                            .restore_quantity_if(&product_id, applied.version, previous)
                    }
                    None => self.store.remove_if(&product_id, applied.version),
                };
                Ok(self.errors.settle(
                    reverted,
                    MutationKind::AddItem,
                    Some(&product_id),
                    CartError::remote(RemoteOperation::UpsertLine, e),
                ))
            }
        }
    }

    /// Remove a line locally, then delete it remotely. A remote "not found"
    /// counts as success.
    pub async fn remove_item(&self, product_id: &str) -> MutationOutcome {
        let Some(removed) = self.store.remove(product_id) else {
            return MutationOutcome::NotPresent;
        };
        self.scheduler.cancel(product_id);

        match self.remote.remove_line(product_id).await {
            Ok(()) => MutationOutcome::Applied,
            Err(e) if e.is_not_found() => {
                tracing::debug!(product_id, "line already absent remotely");
                MutationOutcome::Applied
            }
            Err(e) => {
                let reverted = self
                    .store
                    .reinsert_if(removed.index, removed.line, removed.version);
                self.errors.settle(
                    reverted,
                    MutationKind::RemoveItem,
                    Some(product_id),
                    CartError::remote(RemoteOperation::RemoveLine, e),
                )
            }
        }
    }

    /// Set a line's quantity now and schedule the remote upsert.
    ///
    /// `quantity <= 0` is a removal.
    pub async fn update_quantity(&self, product_id: &str, quantity: i64) -> MutationOutcome {
        if quantity <= 0 {
            return self.remove_item(product_id).await;
        }
        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);

        let Some(applied) = self.store.set_quantity(product_id, quantity) else {
            return MutationOutcome::NotPresent;
        };
        self.scheduler.schedule(PendingWrite {
            product_id: product_id.to_string(),
            merchant_id: applied.merchant_id,
            quantity,
            version: applied.version,
            rollback_to: applied.previous,
        });
        MutationOutcome::Scheduled
    }

    /// Empty the cart locally and remotely. On failure the previous lines come
    /// back, unless the cart was modified in the meantime.
    pub async fn clear_cart(&self) -> MutationOutcome {
        self.scheduler.cancel_all();
        let (previous, revision) = self.store.clear();

        match self.remote.empty_cart().await {
            Ok(()) => MutationOutcome::Applied,
            Err(e) => {
                let reverted = self.store.restore_all_if(previous, revision);
                self.errors.settle(
                    reverted,
                    MutationKind::ClearCart,
                    None,
                    CartError::remote(RemoteOperation::EmptyCart, e),
                )
            }
        }
    }

    /// Drop every local line without touching the remote service (after a
    /// checkout the server has already emptied its copy).
    pub fn clear_local(&self) {
        self.scheduler.cancel_all();
        self.store.clear();
    }
}

/// The send function handed to the scheduler: upsert, and on failure roll the
/// line back to its pre-burst quantity.
fn debounced_sender(
    store: Arc<LocalCartStore>,
    remote: Arc<dyn RemoteCartService>,
    errors: Arc<LastError>,
) -> Arc<WriteFn> {
    Arc::new(move |write: PendingWrite| -> WriteFuture {
        let store = Arc::clone(&store);
        let remote = Arc::clone(&remote);
        let errors = Arc::clone(&errors);
        Box::pin(async move {
            let line = RemoteLine {
                product_id: write.product_id.clone(),
                merchant_id: write.merchant_id.clone(),
                quantity: write.quantity,
            };
            if let Err(e) = remote.upsert_line(&line).await {
                let reverted =
                    store.restore_quantity_if(&write.product_id, write.version, write.rollback_to);
                errors.settle(
                    reverted,
                    MutationKind::UpdateQuantity,
                    Some(&write.product_id),
                    CartError::remote(RemoteOperation::UpsertLine, e),
                );
            }
        })
    })
}
