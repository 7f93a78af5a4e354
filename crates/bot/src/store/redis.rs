//! Redis-backed state store.

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::instrument;

use super::{StateStore, StoreError};

/// State store on a Redis connection manager.
///
/// The manager multiplexes one connection and reconnects on failure;
/// clones share it.
#[derive(Clone)]
pub struct RedisStateStore {
    connection: ConnectionManager,
}

impl RedisStateStore {
    /// Connect to Redis.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the initial connection
    /// fails.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;
        Ok(Self { connection })
    }
}

#[async_trait]
impl StateStore for RedisStateStore {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut connection = self.connection.clone();
        Ok(connection.get(key).await?)
    }

    #[instrument(skip(self))]
    async fn set(&self, key: &str, label: &str) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        connection.set::<_, _, ()>(key, label).await?;
        Ok(())
    }
}
