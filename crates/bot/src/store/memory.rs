//! In-memory state store for tests and local development.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{StateStore, StoreError};

/// HashMap-backed store; clones share the map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStateStore {
    states: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryStateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a stored label, for assertions.
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<String> {
        self.states
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Preload a label, e.g. to simulate a stale or corrupted state.
    pub fn preload(&self, key: &str, label: &str) {
        self.states
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(key.to_owned(), label.to_owned());
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.peek(key))
    }

    async fn set(&self, key: &str, label: &str) -> Result<(), StoreError> {
        self.preload(key, label);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_set_round_trip() {
        let store = InMemoryStateStore::new();
        assert_eq!(store.get("telegram:1").await.expect("get"), None);

        store.set("telegram:1", "MENU").await.expect("set");
        assert_eq!(
            store.get("telegram:1").await.expect("get"),
            Some("MENU".to_owned())
        );

        store.set("telegram:1", "CART").await.expect("set");
        assert_eq!(store.peek("telegram:1"), Some("CART".to_owned()));
    }
}
