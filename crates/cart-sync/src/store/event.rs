//! CartEvent: what changed in the local cart.
//!
//! Emitted by `LocalCartStore` after every mutation, once the state lock has
//! been released.

/// A change notification from the local cart store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartEvent {
    /// A new line was appended.
    Added { product_id: String },
    /// An existing line's quantity changed (optimistic edit or rollback).
    QuantityChanged { product_id: String, quantity: u32 },
    /// A line was removed.
    Removed { product_id: String },
    /// A previously removed line was put back at its old position.
    Restored { product_id: String },
    /// Selection flags changed for the listed lines.
    SelectionChanged { product_ids: Vec<String> },
    /// Remote lines were merged in by the reconciler.
    Merged { product_ids: Vec<String> },
    /// All lines were replaced wholesale (hydration or clear rollback).
    Replaced,
    /// The cart was emptied.
    Cleared,
}

impl CartEvent {
    /// Product ids this event touches. Wholesale events return an empty list.
    pub fn product_ids(&self) -> Vec<&str> {
        match self {
            Self::Added { product_id }
            | Self::QuantityChanged { product_id, .. }
            | Self::Removed { product_id }
            | Self::Restored { product_id } => vec![product_id.as_str()],
            Self::SelectionChanged { product_ids } | Self::Merged { product_ids } => {
                product_ids.iter().map(String::as_str).collect()
            }
            Self::Replaced | Self::Cleared => Vec::new(),
        }
    }
}
