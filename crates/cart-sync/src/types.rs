//! Shared data types: cart lines, remote wire shapes, product metadata and
//! mutation outcomes.

use serde::{Deserialize, Serialize};

// ============================================================================
// Local cart line
// ============================================================================

/// One product entry in the local cart.
///
/// `price` is the snapshot taken when the line was created and is never
/// re-validated against the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: String,
    pub merchant_id: String,
    pub name: String,
    pub price: f64,
    pub quantity: u32,
    pub selected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
}

impl CartLine {
    /// `price * quantity` for this line.
    pub fn subtotal(&self) -> f64 {
        self.price * f64::from(self.quantity)
    }

    pub(crate) fn to_remote(&self) -> RemoteLine {
        RemoteLine {
            product_id: self.product_id.clone(),
            merchant_id: self.merchant_id.clone(),
            quantity: self.quantity,
        }
    }
}

/// Input to [`add_item`](crate::sync::mutator::OptimisticMutator::add_item).
#[derive(Debug, Clone, PartialEq)]
pub struct NewCartItem {
    pub product_id: String,
    pub merchant_id: String,
    pub name: String,
    pub price: f64,
    pub quantity: u32,
    pub description: Option<String>,
    pub images: Option<Vec<String>>,
}

impl NewCartItem {
    pub fn new(
        product_id: impl Into<String>,
        merchant_id: impl Into<String>,
        name: impl Into<String>,
        price: f64,
        quantity: u32,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            merchant_id: merchant_id.into(),
            name: name.into(),
            price,
            quantity,
            description: None,
            images: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = Some(images);
        self
    }

    pub(crate) fn into_line(self) -> CartLine {
        CartLine {
            product_id: self.product_id,
            merchant_id: self.merchant_id,
            name: self.name,
            price: self.price,
            quantity: self.quantity,
            selected: true,
            description: self.description,
            images: self.images,
        }
    }
}

// ============================================================================
// Remote wire types
// ============================================================================

/// A line as the remote cart service knows it (`POST /cart/items` body and
/// `GET /cart` item shape).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteLine {
    pub product_id: String,
    pub merchant_id: String,
    pub quantity: u32,
}

/// Response body of `GET /cart`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCart {
    #[serde(default)]
    pub items: Vec<RemoteLine>,
}

/// Display metadata resolved through product lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
}

// ============================================================================
// Mutation results
// ============================================================================

/// How an optimistic mutation ended, from the caller's point of view.
///
/// Remote failures never surface as `Err`; they end as `RolledBack` and are
/// recorded in the shared last-error slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// Local change applied and acknowledged by the remote service.
    Applied,
    /// Local change applied; the remote write is waiting on the debounce window.
    Scheduled,
    /// Remote call failed and the local change was reverted.
    RolledBack,
    /// Remote call failed, but the line changed again in the meantime so the
    /// stale failure was discarded.
    Superseded,
    /// The target product is not in the cart; nothing happened.
    NotPresent,
}

/// Which optimistic operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    AddItem,
    RemoveItem,
    UpdateQuantity,
    ClearCart,
}

/// Payload handed to the `on_error` callback when a mutation rolls back.
#[derive(Debug, Clone)]
pub struct MutationFailure {
    pub kind: MutationKind,
    pub product_id: Option<String>,
    pub error: String,
}

/// Counts produced by a reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Lines returned by the remote fetch.
    pub fetched: usize,
    /// Overlapping lines whose local quantity was raised to the remote one.
    pub raised: usize,
    /// Remote-only lines appended to the local cart.
    pub hydrated: usize,
    /// Lines written back to the remote service.
    pub republished: usize,
}
