//! Optimistic shopping-cart synchronization.
//!
//! The [`ShoppingCart`] façade keeps a UI-facing [`LocalCartStore`] in step
//! with a remote cart service: mutations apply locally first and roll back on
//! remote failure, quantity edits are debounced, and
//! [`sync_with_backend`](ShoppingCart::sync_with_backend) merges divergent
//! carts before checkout.

pub mod error;
pub mod types;

pub mod cart;
pub mod storage;
pub mod store;
pub mod sync;

pub use cart::{CartOptions, ShoppingCart, DEFAULT_STORAGE_KEY};
pub use error::{CartError, RemoteError, Result, StorageError};
pub use store::{CartEvent, LocalCartStore};
pub use types::{CartLine, MutationOutcome, NewCartItem, ProductInfo, ReconcileReport};
