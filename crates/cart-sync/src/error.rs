use thiserror::Error;

// ---------------------------------------------------------------------------
// RemoteError
// ---------------------------------------------------------------------------

/// Failure reported by a [`RemoteCartService`](crate::sync::remote::RemoteCartService)
/// or [`ProductLookup`](crate::sync::remote::ProductLookup) implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// Transport-level failure: the request never produced a response.
    #[error("network failure: {0}")]
    Network(String),

    /// The service answered with a non-success response.
    #[error("remote rejected request{}: {message}", status_suffix(.status))]
    Rejected {
        status: Option<u16>,
        message: String,
    },

    /// The target resource does not exist on the remote side.
    #[error("not found: {0}")]
    NotFound(String),
}

impl RemoteError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    pub fn rejected(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// StorageError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to (de)serialize cart snapshot: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("persistence backend error: {0}")]
    Backend(String),
}

// ---------------------------------------------------------------------------
// CartError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CartError {
    #[error("quantity must be a positive integer")]
    InvalidQuantity,

    #[error("{operation} failed: {source}")]
    Remote {
        operation: RemoteOperation,
        #[source]
        source: RemoteError,
    },

    #[error("product lookup failed for \"{product_id}\": {source}")]
    Lookup {
        product_id: String,
        #[source]
        source: RemoteError,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl CartError {
    pub(crate) fn remote(operation: RemoteOperation, source: RemoteError) -> Self {
        Self::Remote { operation, source }
    }
}

/// The remote call an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOperation {
    FetchCart,
    UpsertLine,
    RemoveLine,
    EmptyCart,
}

impl std::fmt::Display for RemoteOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::FetchCart => "fetch cart",
            Self::UpsertLine => "upsert line",
            Self::RemoveLine => "remove line",
            Self::EmptyCart => "empty cart",
        };
        f.write_str(name)
    }
}

pub type Result<T> = std::result::Result<T, CartError>;
