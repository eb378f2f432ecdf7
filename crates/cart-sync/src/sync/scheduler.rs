//! DebounceScheduler: coalesces bursts of quantity edits.
//!
//! Every `schedule` call replaces the pending write for its key and restarts
//! the quiescence timer. When a timer runs out undisturbed the write is
//! handed to the send function exactly once. Pending writes can be cancelled
//! or flushed early; a write that has already been handed off is in flight
//! and is no longer tracked here.
//!
//! The key is the product id under [`DebounceScope::PerLine`]. Under
//! [`DebounceScope::WholeCart`] every product shares one key, so an edit to
//! one product throws away a pending write for another. That mode is opt-in
//! and lossy for multi-line bursts.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::store::LineVersion;

/// Default quiescence window.
pub const DEFAULT_DEBOUNCE_MS: u64 = 1000;

const WHOLE_CART_KEY: &str = "__cart__";

/// How pending writes are keyed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DebounceScope {
    /// One timer per product id.
    #[default]
    PerLine,
    /// One timer for the whole cart (drops writes for other products).
    WholeCart,
}

/// A quantity write waiting for its debounce window to elapse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWrite {
    pub product_id: String,
    pub merchant_id: String,
    /// Latest requested quantity.
    pub quantity: u32,
    /// Version stamp of the local edit that produced `quantity`.
    pub version: LineVersion,
    /// Quantity before the first edit of the current burst.
    pub rollback_to: u32,
}

pub type WriteFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Function that performs a due write.
pub type WriteFn = dyn Fn(PendingWrite) -> WriteFuture + Send + Sync;

struct Slot {
    generation: u64,
    write: PendingWrite,
    timer: JoinHandle<()>,
}

type Slots = Arc<Mutex<HashMap<String, Slot>>>;

pub struct DebounceScheduler {
    delay: Duration,
    scope: DebounceScope,
    send: Arc<WriteFn>,
    slots: Slots,
    next_generation: AtomicU64,
    disposed: AtomicBool,
}

impl DebounceScheduler {
    pub fn new(delay: Duration, scope: DebounceScope, send: Arc<WriteFn>) -> Self {
        Self {
            delay,
            scope,
            send,
            slots: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(1),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn scope(&self) -> DebounceScope {
        self.scope
    }

    fn key_for(&self, product_id: &str) -> String {
        match self.scope {
            DebounceScope::PerLine => product_id.to_string(),
            DebounceScope::WholeCart => WHOLE_CART_KEY.to_string(),
        }
    }

    /// Replace the pending write for `write`'s key and restart its timer.
    ///
    /// If the replaced write was for the same product, its `rollback_to` is
    /// carried over so a failure restores the state from before the burst.
    pub fn schedule(&self, mut write: PendingWrite) {
        if self.disposed.load(Ordering::SeqCst) {
            tracing::warn!(product_id = %write.product_id, "scheduler disposed; dropping quantity write");
            return;
        }

        let key = self.key_for(&write.product_id);
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);

        let mut slots = self.slots.lock();
        if let Some(previous) = slots.remove(&key) {
            previous.timer.abort();
            if previous.write.product_id == write.product_id {
                write.rollback_to = previous.write.rollback_to;
            } else {
                tracing::warn!(
                    dropped = %previous.write.product_id,
                    replaced_by = %write.product_id,
                    "cart-wide debounce discarded a pending quantity write"
                );
            }
        }

        let timer = tokio::spawn(fire_after(
            Arc::clone(&self.slots),
            key.clone(),
            generation,
            self.delay,
            Arc::clone(&self.send),
        ));
        slots.insert(
            key,
            Slot {
                generation,
                write,
                timer,
            },
        );
    }

    /// Drop the pending write for `product_id`, if any.
    pub fn cancel(&self, product_id: &str) -> bool {
        let key = self.key_for(product_id);
        let mut slots = self.slots.lock();
        match slots.get(&key) {
            Some(slot) if slot.write.product_id == product_id => {
                if let Some(slot) = slots.remove(&key) {
                    slot.timer.abort();
                    tracing::debug!(product_id, "cancelled pending quantity write");
                }
                true
            }
            _ => false,
        }
    }

    /// Drop every pending write. Returns how many were dropped.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<Slot> = self.slots.lock().drain().map(|(_, s)| s).collect();
        for slot in &drained {
            slot.timer.abort();
        }
        drained.len()
    }

    /// Send every pending write now, without waiting for its window, and
    /// wait for the sends to finish. Returns how many were sent.
    pub async fn flush(&self) -> usize {
        let due: Vec<PendingWrite> = {
            let mut slots = self.slots.lock();
            slots
                .drain()
                .map(|(_, slot)| {
                    slot.timer.abort();
                    slot.write
                })
                .collect()
        };

        let count = due.len();
        for write in due {
            (self.send)(write).await;
        }
        count
    }

    pub fn pending_count(&self) -> usize {
        self.slots.lock().len()
    }

    /// The write waiting for `product_id`, if any.
    pub fn pending(&self, product_id: &str) -> Option<PendingWrite> {
        let key = self.key_for(product_id);
        self.slots
            .lock()
            .get(&key)
            .filter(|slot| slot.write.product_id == product_id)
            .map(|slot| slot.write.clone())
    }

    /// Cancel everything and refuse further writes.
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        self.cancel_all();
    }
}

impl Drop for DebounceScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

async fn fire_after(
    slots: Slots,
    key: String,
    generation: u64,
    delay: Duration,
    send: Arc<WriteFn>,
) {
    tokio::time::sleep(delay).await;

    // Claim the slot only if it still belongs to this timer; once removed the
    // write is in flight and can no longer be cancelled.
    let due = {
        let mut slots = slots.lock();
        match slots.get(&key) {
            Some(slot) if slot.generation == generation => slots.remove(&key).map(|s| s.write),
            _ => None,
        }
    };

    if let Some(write) = due {
        send(write).await;
    }
}
