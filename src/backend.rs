// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Key-value backend integration trait.
//!
//! The replicator only needs point reads and point writes keyed by collection
//! name and key. Anything offering that capability (a table store, an object
//! store, a test double) can implement [`KvBackend`].
//!
//! # Example
//!
//! ```rust,no_run
//! use change_replicator::backend::{BackendResult, BoxFuture, KvBackend};
//! use change_replicator::record::Item;
//!
//! struct MyBackend { /* ... */ }
//!
//! impl KvBackend for MyBackend {
//!     fn get(&self, _collection: &str, _key: &Item) -> BoxFuture<'_, Option<Item>> {
//!         Box::pin(async move { Ok(None) })
//!     }
//!
//!     fn put(&self, _collection: &str, _key: &Item, _payload: Item) -> BoxFuture<'_, ()> {
//!         Box::pin(async move { Ok(()) })
//!     }
//!
//!     fn delete(&self, _collection: &str, _key: &Item) -> BoxFuture<'_, bool> {
//!         Box::pin(async move { Ok(false) })
//!     }
//! }
//! ```

use crate::error::ReplicationError;
use crate::record::{key_fingerprint, Item};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use tokio::sync::RwLock;

/// Result type for backend operations.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Type alias for boxed async futures (reduces trait signature complexity).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = BackendResult<T>> + Send + 'a>>;

/// Errors a backend can report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// Transient failure: timeout, throttling, dropped connection.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// The collection does not exist.
    #[error("no such collection: {0}")]
    NoSuchCollection(String),

    /// The write was refused (size limit, validation).
    #[error("rejected: {0}")]
    Rejected(String),
}

impl BackendError {
    /// Convert into a [`ReplicationError`] with operation/collection context.
    pub fn into_replication(self, operation: &str, collection: &str) -> ReplicationError {
        match self {
            Self::Unavailable(message) => ReplicationError::unavailable(operation, message),
            Self::NoSuchCollection(message) => {
                ReplicationError::invalid_collection(collection, message)
            }
            Self::Rejected(message) => ReplicationError::rejected(collection, message),
        }
    }
}

impl From<BackendError> for ReplicationError {
    fn from(e: BackendError) -> Self {
        e.into_replication("unknown", "unknown")
    }
}

/// Trait defining what we need from a key-value store.
///
/// All operations are point operations; `put` is a full overwrite so repeated
/// writes of the same key/payload pair leave the same end state.
pub trait KvBackend: Send + Sync + 'static {
    /// Read the current value stored under `key`, or `None` if absent.
    fn get(&self, collection: &str, key: &Item) -> BoxFuture<'_, Option<Item>>;

    /// Overwrite the value stored under `key`.
    fn put(&self, collection: &str, key: &Item, payload: Item) -> BoxFuture<'_, ()>;

    /// Remove `key`. Returns whether something was removed.
    fn delete(&self, collection: &str, key: &Item) -> BoxFuture<'_, bool>;
}

/// In-process backend keyed by collection name.
///
/// Collections must be created up front; touching an unknown collection
/// yields [`BackendError::NoSuchCollection`]. An optional item size limit
/// mimics the write limits real stores enforce.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    collections: RwLock<HashMap<String, HashMap<String, Item>>>,
    max_item_bytes: Option<usize>,
}

impl InMemoryBackend {
    /// Create an empty backend with no collections.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend that rejects items larger than `max_item_bytes` (JSON-encoded).
    pub fn with_item_limit(max_item_bytes: usize) -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            max_item_bytes: Some(max_item_bytes),
        }
    }

    /// Create a collection if it does not exist yet.
    pub async fn create_collection(&self, name: &str) {
        self.collections
            .write()
            .await
            .entry(name.to_string())
            .or_default();
    }

    /// Number of items in a collection (`None` if it does not exist).
    pub async fn len(&self, collection: &str) -> Option<usize> {
        self.collections.read().await.get(collection).map(|c| c.len())
    }

    /// Snapshot of a collection's items, keyed by key fingerprint.
    pub async fn snapshot(&self, collection: &str) -> Option<HashMap<String, Item>> {
        self.collections.read().await.get(collection).cloned()
    }
}

impl KvBackend for InMemoryBackend {
    fn get(&self, collection: &str, key: &Item) -> BoxFuture<'_, Option<Item>> {
        let collection = collection.to_string();
        let fingerprint = key_fingerprint(key);
        Box::pin(async move {
            let guard = self.collections.read().await;
            let items = guard
                .get(&collection)
                .ok_or(BackendError::NoSuchCollection(collection.clone()))?;
            Ok(items.get(&fingerprint).cloned())
        })
    }

    fn put(&self, collection: &str, key: &Item, payload: Item) -> BoxFuture<'_, ()> {
        let collection = collection.to_string();
        let fingerprint = key_fingerprint(key);
        Box::pin(async move {
            if let Some(limit) = self.max_item_bytes {
                let size = serde_json::to_vec(&payload)
                    .map(|bytes| bytes.len())
                    .unwrap_or(usize::MAX);
                if size > limit {
                    return Err(BackendError::Rejected(format!(
                        "item size {} exceeds limit {}",
                        size, limit
                    )));
                }
            }
            let mut guard = self.collections.write().await;
            let items = guard
                .get_mut(&collection)
                .ok_or(BackendError::NoSuchCollection(collection.clone()))?;
            items.insert(fingerprint, payload);
            Ok(())
        })
    }

    fn delete(&self, collection: &str, key: &Item) -> BoxFuture<'_, bool> {
        let collection = collection.to_string();
        let fingerprint = key_fingerprint(key);
        Box::pin(async move {
            let mut guard = self.collections.write().await;
            let items = guard
                .get_mut(&collection)
                .ok_or(BackendError::NoSuchCollection(collection.clone()))?;
            Ok(items.remove(&fingerprint).is_some())
        })
    }
}
