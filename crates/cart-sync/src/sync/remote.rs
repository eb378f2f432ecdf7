//! Host-provided network collaborators.

use async_trait::async_trait;

use crate::error::RemoteError;
use crate::types::{ProductInfo, RemoteCart, RemoteLine};

/// Client for the remote cart service.
///
/// Maps onto the HTTP endpoints:
/// - `fetch_cart`  → `GET /cart`
/// - `upsert_line` → `POST /cart/items`
/// - `remove_line` → `DELETE /cart/items/{productId}`
/// - `empty_cart`  → `DELETE /cart`
///
/// `remove_line` should report a missing line as [`RemoteError::NotFound`];
/// callers treat that as success.
#[async_trait]
pub trait RemoteCartService: Send + Sync {
    async fn fetch_cart(&self) -> Result<RemoteCart, RemoteError>;

    async fn upsert_line(&self, line: &RemoteLine) -> Result<(), RemoteError>;

    async fn remove_line(&self, product_id: &str) -> Result<(), RemoteError>;

    async fn empty_cart(&self) -> Result<(), RemoteError>;
}

/// Catalog lookup used to fill in display data for lines only the remote
/// cart knows about.
#[async_trait]
pub trait ProductLookup: Send + Sync {
    async fn get_product(&self, product_id: &str) -> Result<ProductInfo, RemoteError>;
}
