//! CartPersister: write-behind persistence of the local cart.
//!
//! Mutations only mark the cart dirty; a single writer task drains the queue,
//! reads the store's current lines and writes them to the
//! [`PersistenceAdapter`]. Dirty marks already waiting in the queue collapse
//! into one write. The snapshot is taken by the writer itself, so the last
//! write always reflects state at or after the last mark, whichever thread
//! produced it.
//!
//! Write failures are logged and dropped.

use std::sync::{Arc, Weak};

use tokio::sync::{mpsc, oneshot};

use crate::error::StorageError;
use crate::store::LocalCartStore;
use crate::types::CartLine;

use super::traits::PersistenceAdapter;

enum PersistOp {
    Dirty,
    Flush(oneshot::Sender<()>),
}

/// Handle to the writer task. Dropping every handle stops the writer once
/// the queue is drained.
#[derive(Clone)]
pub struct CartPersister {
    tx: mpsc::UnboundedSender<PersistOp>,
}

impl CartPersister {
    /// Start the writer task for `store` on the current tokio runtime.
    ///
    /// The writer holds only a weak reference; once the store is gone pending
    /// marks are acknowledged without writing.
    pub fn spawn(
        adapter: Arc<dyn PersistenceAdapter>,
        key: impl Into<String>,
        store: Weak<LocalCartStore>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(adapter, key.into(), store, rx));
        Self { tx }
    }

    /// Note that the cart changed and needs to be written.
    pub fn mark_dirty(&self) {
        if self.tx.send(PersistOp::Dirty).is_err() {
            tracing::warn!("cart persister has stopped; change not persisted");
        }
    }

    /// Wait until every change marked before this call has been written.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(PersistOp::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}

async fn run_writer(
    adapter: Arc<dyn PersistenceAdapter>,
    key: String,
    store: Weak<LocalCartStore>,
    mut rx: mpsc::UnboundedReceiver<PersistOp>,
) {
    while let Some(op) = rx.recv().await {
        match op {
            PersistOp::Dirty => {
                let mut waiter = None;
                // Swallow marks already queued behind this one; stop at a
                // flush marker so it is acknowledged right after this write.
                while let Ok(next) = rx.try_recv() {
                    if let PersistOp::Flush(done) = next {
                        waiter = Some(done);
                        break;
                    }
                }

                if let Some(store) = store.upgrade() {
                    let lines = store.lines();
                    if let Err(e) = write_snapshot(adapter.as_ref(), &key, &lines) {
                        tracing::warn!(key = %key, error = %e, "failed to persist cart snapshot");
                    }
                }
                if let Some(done) = waiter {
                    let _ = done.send(());
                }
            }
            PersistOp::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}

fn write_snapshot(
    adapter: &dyn PersistenceAdapter,
    key: &str,
    lines: &[CartLine],
) -> Result<(), StorageError> {
    if lines.is_empty() {
        return adapter.remove(key);
    }
    let json = serde_json::to_string(lines)?;
    adapter.set(key, &json)
}

/// Read the persisted cart under `key`. An absent key is an empty cart.
pub fn load_cart(adapter: &dyn PersistenceAdapter, key: &str) -> Result<Vec<CartLine>, StorageError> {
    match adapter.get(key)? {
        Some(json) => Ok(serde_json::from_str(&json)?),
        None => Ok(Vec::new()),
    }
}
