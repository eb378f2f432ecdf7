use crate::error::StorageError;

/// Durable key/value storage used to persist the local cart.
///
/// Calls are synchronous. Implementations backed by slow media should expect
/// to be called from the persister's writer task, never from a UI turn.
pub trait PersistenceAdapter: Send + Sync {
    /// Read the value stored under `key`, or `None` if absent.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Insert or replace the value under `key`.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete `key`. Deleting an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}
