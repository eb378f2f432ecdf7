//! LocalCartStore: the in-memory, UI-facing cart.
//!
//! Mutation primitives are crate-private: outside code reads and subscribes,
//! and changes go through the mutator.
//!
//! # Threading model
//!
//! All state lives behind one `parking_lot::Mutex`. Every public method takes
//! the lock for a short synchronous critical section, releases it, and only
//! then notifies listeners. The lock is never held across an `.await`.
//!
//! # Version tokens
//!
//! The store keeps a revision counter. Each mutation that touches a product
//! stamps that product id with a fresh revision, and hands the stamp back to
//! the caller. Compensating writes (`restore_quantity_if`, `remove_if`,
//! `reinsert_if`, `restore_all_if`) only apply while the stamp is still
//! current, so a late failure for a superseded request cannot clobber newer
//! state. Stamps survive removal of the line.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

use crate::types::{CartLine, NewCartItem, ProductInfo, RemoteLine};

use super::event::CartEvent;
use super::listeners::{Listeners, Unsubscribe};

/// Revision stamped on a product id by its most recent mutation.
pub type LineVersion = u64;

/// Result of [`LocalCartStore::add_quantity`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AddApplied {
    /// Quantity before the add, `None` if the line was created.
    pub previous: Option<u32>,
    pub quantity: u32,
    pub merchant_id: String,
    pub version: LineVersion,
}

/// Result of [`LocalCartStore::set_quantity`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct QuantityApplied {
    pub previous: u32,
    pub merchant_id: String,
    pub version: LineVersion,
}

/// Result of [`LocalCartStore::remove`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RemovedLine {
    pub index: usize,
    pub line: CartLine,
    pub version: LineVersion,
}

/// Result of [`LocalCartStore::merge_remote`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct MergeStats {
    pub raised: usize,
    pub hydrated: usize,
}

struct CartState {
    lines: Vec<CartLine>,
    versions: HashMap<String, LineVersion>,
    revision: LineVersion,
}

impl CartState {
    fn position(&self, product_id: &str) -> Option<usize> {
        self.lines.iter().position(|l| l.product_id == product_id)
    }

    fn stamp(&mut self, product_id: &str) -> LineVersion {
        self.revision += 1;
        self.versions.insert(product_id.to_string(), self.revision);
        self.revision
    }

    fn is_current(&self, product_id: &str, version: LineVersion) -> bool {
        self.versions.get(product_id) == Some(&version)
    }
}

/// The local cart: read and subscribe from anywhere, mutate through the
/// mutator.
///
/// ```compile_fail
/// let store = cart_sync::LocalCartStore::new();
/// store.add_quantity(cart_sync::NewCartItem::new("p1", "m1", "Widget", 1.0, 1));
/// ```
pub struct LocalCartStore {
    state: Mutex<CartState>,
    listeners: Listeners<CartEvent>,
}

impl LocalCartStore {
    pub fn new() -> Self {
        Self::from_lines(Vec::new())
    }

    /// Build a store from previously persisted lines.
    ///
    /// Lines with a zero quantity and repeated product ids (after the first)
    /// are dropped.
    pub fn from_lines(lines: Vec<CartLine>) -> Self {
        let mut seen = HashSet::new();
        let mut kept = Vec::with_capacity(lines.len());
        for line in lines {
            if line.quantity == 0 {
                tracing::warn!(product_id = %line.product_id, "dropping persisted cart line with zero quantity");
                continue;
            }
            if !seen.insert(line.product_id.clone()) {
                tracing::warn!(product_id = %line.product_id, "dropping duplicate persisted cart line");
                continue;
            }
            kept.push(line);
        }

        Self {
            state: Mutex::new(CartState {
                lines: kept,
                versions: HashMap::new(),
                revision: 0,
            }),
            listeners: Listeners::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Subscriptions
    // -----------------------------------------------------------------------

    /// Register `listener` for every subsequent [`CartEvent`].
    pub fn subscribe(&self, listener: impl Fn(&CartEvent) + Send + Sync + 'static) -> Unsubscribe {
        self.listeners.subscribe(listener)
    }

    fn emit(&self, event: Option<CartEvent>) {
        if let Some(event) = event {
            self.listeners.notify(&event);
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Snapshot of all lines in cart order.
    pub fn lines(&self) -> Vec<CartLine> {
        self.state.lock().lines.clone()
    }

    pub fn line(&self, product_id: &str) -> Option<CartLine> {
        let st = self.state.lock();
        st.position(product_id).map(|i| st.lines[i].clone())
    }

    pub fn contains(&self, product_id: &str) -> bool {
        self.state.lock().position(product_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.state.lock().lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().lines.is_empty()
    }

    /// Current version stamp of `product_id`, if it was ever mutated.
    pub fn version(&self, product_id: &str) -> Option<LineVersion> {
        self.state.lock().versions.get(product_id).copied()
    }

    // -----------------------------------------------------------------------
    // Aggregates
    // -----------------------------------------------------------------------

    /// Σ(price × quantity) over every line, regardless of selection.
    pub fn total_price(&self) -> f64 {
        self.state.lock().lines.iter().map(CartLine::subtotal).sum()
    }

    /// Σ(quantity) over every line.
    pub fn total_items(&self) -> u64 {
        self.state
            .lock()
            .lines
            .iter()
            .map(|l| u64::from(l.quantity))
            .sum()
    }

    /// Σ(price × quantity) over selected lines.
    pub fn selected_total_price(&self) -> f64 {
        self.state
            .lock()
            .lines
            .iter()
            .filter(|l| l.selected)
            .map(CartLine::subtotal)
            .sum()
    }

    /// Σ(quantity) over selected lines.
    pub fn selected_items_count(&self) -> u64 {
        self.state
            .lock()
            .lines
            .iter()
            .filter(|l| l.selected)
            .map(|l| u64::from(l.quantity))
            .sum()
    }

    // -----------------------------------------------------------------------
    // Selection
    // -----------------------------------------------------------------------

    /// Flip the `selected` flag of one line. Returns `false` if absent.
    pub fn toggle_item_selection(&self, product_id: &str) -> bool {
        let event = {
            let mut st = self.state.lock();
            st.position(product_id).map(|i| {
                let line = &mut st.lines[i];
                line.selected = !line.selected;
                CartEvent::SelectionChanged {
                    product_ids: vec![line.product_id.clone()],
                }
            })
        };
        let found = event.is_some();
        self.emit(event);
        found
    }

    pub fn select_all_items(&self) {
        self.set_all_selected(true);
    }

    pub fn unselect_all_items(&self) {
        self.set_all_selected(false);
    }

    fn set_all_selected(&self, selected: bool) {
        let event = {
            let mut st = self.state.lock();
            let changed: Vec<String> = st
                .lines
                .iter_mut()
                .filter(|l| l.selected != selected)
                .map(|l| {
                    l.selected = selected;
                    l.product_id.clone()
                })
                .collect();
            (!changed.is_empty()).then_some(CartEvent::SelectionChanged {
                product_ids: changed,
            })
        };
        self.emit(event);
    }

    // -----------------------------------------------------------------------
    // Optimistic mutations
    // -----------------------------------------------------------------------

    /// Add `item.quantity` to an existing line, or append a new line.
    pub(crate) fn add_quantity(&self, item: NewCartItem) -> AddApplied {
        let (applied, event) = {
            let mut st = self.state.lock();
            let version = st.stamp(&item.product_id);
            match st.position(&item.product_id) {
                Some(i) => {
                    let line = &mut st.lines[i];
                    let previous = line.quantity;
                    line.quantity = previous.saturating_add(item.quantity);
                    let applied = AddApplied {
                        previous: Some(previous),
                        quantity: line.quantity,
                        merchant_id: line.merchant_id.clone(),
                        version,
                    };
                    let event = CartEvent::QuantityChanged {
                        product_id: line.product_id.clone(),
                        quantity: line.quantity,
                    };
                    (applied, event)
                }
                None => {
                    let line = item.into_line();
                    let applied = AddApplied {
                        previous: None,
                        quantity: line.quantity,
                        merchant_id: line.merchant_id.clone(),
                        version,
                    };
                    let event = CartEvent::Added {
                        product_id: line.product_id.clone(),
                    };
                    st.lines.push(line);
                    (applied, event)
                }
            }
        };
        self.emit(Some(event));
        applied
    }

    /// Overwrite the quantity of an existing line. `quantity` must be ≥ 1.
    pub(crate) fn set_quantity(&self, product_id: &str, quantity: u32) -> Option<QuantityApplied> {
        debug_assert!(quantity >= 1, "zero quantity is a removal");
        let (applied, event) = {
            let mut st = self.state.lock();
            let i = st.position(product_id)?;
            let version = st.stamp(product_id);
            let line = &mut st.lines[i];
            let previous = line.quantity;
            line.quantity = quantity;
            (
                QuantityApplied {
                    previous,
                    merchant_id: line.merchant_id.clone(),
                    version,
                },
                CartEvent::QuantityChanged {
                    product_id: product_id.to_string(),
                    quantity,
                },
            )
        };
        self.emit(Some(event));
        Some(applied)
    }

    /// Remove a line, remembering where it was.
    pub(crate) fn remove(&self, product_id: &str) -> Option<RemovedLine> {
        let removed = {
            let mut st = self.state.lock();
            let index = st.position(product_id)?;
            let version = st.stamp(product_id);
            let line = st.lines.remove(index);
            RemovedLine {
                index,
                line,
                version,
            }
        };
        self.emit(Some(CartEvent::Removed {
            product_id: product_id.to_string(),
        }));
        Some(removed)
    }

    /// Empty the cart. Returns the previous lines and the store revision the
    /// clear produced (for [`restore_all_if`](Self::restore_all_if)).
    pub(crate) fn clear(&self) -> (Vec<CartLine>, LineVersion) {
        let (previous, revision) = {
            let mut st = self.state.lock();
            let previous = std::mem::take(&mut st.lines);
            for line in &previous {
                st.stamp(&line.product_id);
            }
            st.revision += 1;
            (previous, st.revision)
        };
        self.emit(Some(CartEvent::Cleared));
        (previous, revision)
    }

    // -----------------------------------------------------------------------
    // Version-checked compensations
    // -----------------------------------------------------------------------

    /// Put `quantity` back on `product_id` if `expected` is still its stamp.
    pub(crate) fn restore_quantity_if(&self, product_id: &str, expected: LineVersion, quantity: u32) -> bool {
        let event = {
            let mut st = self.state.lock();
            if !st.is_current(product_id, expected) {
                return false;
            }
            let Some(i) = st.position(product_id) else {
                return false;
            };
            st.stamp(product_id);
            st.lines[i].quantity = quantity;
            CartEvent::QuantityChanged {
                product_id: product_id.to_string(),
                quantity,
            }
        };
        self.emit(Some(event));
        true
    }

    /// Drop `product_id` if `expected` is still its stamp.
    pub(crate) fn remove_if(&self, product_id: &str, expected: LineVersion) -> bool {
        {
            let mut st = self.state.lock();
            if !st.is_current(product_id, expected) {
                return false;
            }
            let Some(i) = st.position(product_id) else {
                return false;
            };
            st.stamp(product_id);
            st.lines.remove(i);
        }
        self.emit(Some(CartEvent::Removed {
            product_id: product_id.to_string(),
        }));
        true
    }

    /// Re-insert a removed line at `index` (clamped) if `expected` is still
    /// its stamp and the product has not been re-added.
    pub(crate) fn reinsert_if(&self, index: usize, line: CartLine, expected: LineVersion) -> bool {
        let product_id = line.product_id.clone();
        {
            let mut st = self.state.lock();
            if !st.is_current(&product_id, expected) || st.position(&product_id).is_some() {
                return false;
            }
            st.stamp(&product_id);
            let at = index.min(st.lines.len());
            st.lines.insert(at, line);
        }
        self.emit(Some(CartEvent::Restored { product_id }));
        true
    }

    /// Replace every line with `lines` if nothing mutated the store since the
    /// revision `expected` was observed.
    pub(crate) fn restore_all_if(&self, lines: Vec<CartLine>, expected: LineVersion) -> bool {
        {
            let mut st = self.state.lock();
            if st.revision != expected {
                return false;
            }
            for line in &lines {
                st.stamp(&line.product_id);
            }
            st.lines = lines;
        }
        self.emit(Some(CartEvent::Replaced));
        true
    }

    // -----------------------------------------------------------------------
    // Reconciliation
    // -----------------------------------------------------------------------

    /// Merge remote lines into the cart in one critical section.
    ///
    /// Overlapping products take `max(local, remote)`; remote-only products
    /// are appended using `products` for display metadata (entries missing
    /// from `products` are skipped); local-only lines are untouched.
    pub(crate) fn merge_remote(&self, remote: &[RemoteLine], products: &HashMap<String, ProductInfo>) -> MergeStats {
        let (stats, touched) = {
            let mut st = self.state.lock();
            let mut stats = MergeStats::default();
            let mut touched = Vec::new();

            for item in remote {
                if item.quantity == 0 {
                    continue;
                }
                match st.position(&item.product_id) {
                    Some(i) => {
                        if item.quantity > st.lines[i].quantity {
                            st.lines[i].quantity = item.quantity;
                            st.stamp(&item.product_id);
                            stats.raised += 1;
                            touched.push(item.product_id.clone());
                        }
                    }
                    None => {
                        let Some(info) = products.get(&item.product_id) else {
                            tracing::warn!(product_id = %item.product_id, "no product metadata for remote line; skipping");
                            continue;
                        };
                        st.lines.push(CartLine {
                            product_id: item.product_id.clone(),
                            merchant_id: item.merchant_id.clone(),
                            name: info.name.clone(),
                            price: info.price,
                            quantity: item.quantity,
                            selected: true,
                            description: info.description.clone(),
                            images: (!info.images.is_empty()).then(|| info.images.clone()),
                        });
                        st.stamp(&item.product_id);
                        stats.hydrated += 1;
                        touched.push(item.product_id.clone());
                    }
                }
            }
            (stats, touched)
        };

        if !touched.is_empty() {
            self.emit(Some(CartEvent::Merged {
                product_ids: touched,
            }));
        }
        stats
    }
}

impl Default for LocalCartStore {
    fn default() -> Self {
        Self::new()
    }
}
