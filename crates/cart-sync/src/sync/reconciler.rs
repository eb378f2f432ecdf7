//! Reconciler: converges the local and remote carts on demand.
//!
//! Unlike the mutator, every failure is returned to the caller. A failed
//! reconcile may leave the remote cart emptied; calling it again is safe.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{CartError, RemoteOperation, Result};
use crate::store::LocalCartStore;
use crate::types::ReconcileReport;

use super::remote::{ProductLookup, RemoteCartService};
use super::scheduler::DebounceScheduler;

pub struct Reconciler {
    store: Arc<LocalCartStore>,
    remote: Arc<dyn RemoteCartService>,
    products: Arc<dyn ProductLookup>,
    scheduler: Arc<DebounceScheduler>,
}

impl Reconciler {
    pub fn new(
        store: Arc<LocalCartStore>,
        remote: Arc<dyn RemoteCartService>,
        products: Arc<dyn ProductLookup>,
        scheduler: Arc<DebounceScheduler>,
    ) -> Self {
        Self {
            store,
            remote,
            products,
            scheduler,
        }
    }

    /// Fetch, merge and republish.
    ///
    /// 1. Fetch the remote cart.
    /// 2. Look up metadata for remote-only products. This happens before the
    ///    remote cart is emptied so a lookup failure loses nothing.
    /// 3. Empty the remote cart.
    /// 4. Drop pending debounced writes; the republish covers them. Until
    ///    here a failure leaves them scheduled.
    /// 5. Merge: overlap takes the larger quantity, remote-only lines are
    ///    appended, local-only lines stay.
    /// 6. Upsert every local line, one at a time.
    pub async fn sync_with_backend(&self) -> Result<ReconcileReport> {
        let remote_cart = self
            .remote
            .fetch_cart()
            .await
            .map_err(|e| CartError::remote(RemoteOperation::FetchCart, e))?;

        let mut products = HashMap::new();
        for item in &remote_cart.items {
            if item.quantity == 0
                || products.contains_key(&item.product_id)
                || self.store.contains(&item.product_id)
            {
                continue;
            }
            let info = self
                .products
                .get_product(&item.product_id)
                .await
                .map_err(|source| CartError::Lookup {
                    product_id: item.product_id.clone(),
                    source,
                })?;
            products.insert(item.product_id.clone(), info);
        }

        self.remote
            .empty_cart()
            .await
            .map_err(|e| CartError::remote(RemoteOperation::EmptyCart, e))?;

        let dropped = self.scheduler.cancel_all();
        if dropped > 0 {
            tracing::debug!(dropped, "reconcile superseded pending quantity writes");
        }

        let stats = self.store.merge_remote(&remote_cart.items, &products);

        let mut republished = 0;
        for line in self.store.lines() {
            self.remote
                .upsert_line(&line.to_remote())
                .await
                .map_err(|e| CartError::remote(RemoteOperation::UpsertLine, e))?;
            republished += 1;
        }

        let report = ReconcileReport {
            fetched: remote_cart.items.len(),
            raised: stats.raised,
            hydrated: stats.hydrated,
            republished,
        };
        tracing::debug!(?report, "cart reconciled");
        Ok(report)
    }
}
