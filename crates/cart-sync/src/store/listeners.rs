//! Listeners<T>: subscriber registry behind the cart store's change events.
//!
//! Emission works on a snapshot of the registry: a listener removed while an
//! event is being delivered still receives that event, and a listener added
//! during delivery only sees later ones. The registry lock is never held
//! while a listener runs, so listeners may subscribe, unsubscribe or read the
//! store from inside a callback.
//!
//! A panicking listener is isolated; the remaining listeners still run.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Closure type for change listeners.
pub type ListenerFn<T> = dyn Fn(&T) + Send + Sync;

/// An owned one-shot closure that removes a subscription when called.
pub type Unsubscribe = Box<dyn FnOnce() + Send + Sync>;

type Registry<T> = Arc<Mutex<Vec<(u64, Arc<ListenerFn<T>>)>>>;

pub struct Listeners<T> {
    registry: Registry<T>,
    next_id: AtomicU64,
}

impl<T: 'static> Listeners<T> {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register `listener`; the returned closure removes it again.
    pub fn subscribe(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> Unsubscribe {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry.lock().push((id, Arc::new(listener)));

        let registry = Arc::clone(&self.registry);
        Box::new(move || {
            registry.lock().retain(|(lid, _)| *lid != id);
        })
    }

    /// Deliver `event` to every listener registered at the time of the call.
    pub fn notify(&self, event: &T) {
        let snapshot: Vec<Arc<ListenerFn<T>>> = self
            .registry
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in snapshot {
            let delivered = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener(event);
            }));
            if delivered.is_err() {
                tracing::warn!("cart listener panicked; continuing with remaining listeners");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.registry.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: 'static> Default for Listeners<T> {
    fn default() -> Self {
        Self::new()
    }
}
