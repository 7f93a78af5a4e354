//! Per-user conversation state storage.
//!
//! The store maps a transport-prefixed user key to the single latest state
//! label. No history, no transactions: concurrent writes for the same user
//! race on last-writer-wins, which is acceptable because one human drives
//! one conversation serially.

mod memory;
mod redis;

pub use memory::InMemoryStateStore;
pub use redis::RedisStateStore;

use async_trait::async_trait;
use thiserror::Error;

/// Errors from the state store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state store error: {0}")]
    Backend(#[from] ::redis::RedisError),
}

impl StoreError {
    /// Store failures are connectivity problems; the same dispatch is safe
    /// to retry.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        true
    }
}

/// Get/set of the latest state label per user key.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// The stored label, or `None` if the user has no state yet.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Overwrite the stored label unconditionally.
    async fn set(&self, key: &str, label: &str) -> Result<(), StoreError>;
}
