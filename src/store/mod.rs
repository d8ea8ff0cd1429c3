//! Backing key-value store capability.
//!
//! The core only ever talks to a [`Store`]: point reads, point writes,
//! prefix dumps and prefix-scoped change subscriptions. Durability,
//! clustering and write ordering belong to the implementation.

mod error;
mod memory;
#[cfg(feature = "redis")]
mod redis_store;

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::mpsc;

pub use error::StoreError;
pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use redis_store::RedisStore;

/// Capacity of the per-subscription event channel unless a store is told otherwise.
pub const DEFAULT_WATCH_CAPACITY: usize = 100;

/// Redis stream every write is mirrored into unless told otherwise.
pub const DEFAULT_CHANGE_STREAM: &str = "schemakv:changes";

/// Approximate number of records the change stream is trimmed to on each write.
pub const DEFAULT_STREAM_MAXLEN: usize = 10_000;

/// A change reported by [`Store::watch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub key: String,
    pub value: String,
}

impl WatchEvent {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[async_trait]
pub trait Store: Send + Sync + std::fmt::Debug {
    /// Reads one key. A missing key is `Ok(None)`, never an error.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Creates or overwrites one key.
    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Returns every key starting with `prefix` together with its value.
    async fn get_prefix(&self, prefix: &str) -> Result<BTreeMap<String, String>, StoreError>;

    /// Subscribes to changes of keys under `prefix` made after this call.
    ///
    /// Events arrive in the order the store emits them. Dropping the
    /// receiver ends the subscription.
    async fn watch(&self, prefix: &str) -> Result<mpsc::Receiver<WatchEvent>, StoreError>;
}
