// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Record fetcher: point lookup of the current source value.

use crate::backend::KvBackend;
use crate::error::{ReplicationError, Result};
use crate::record::{FetchedValue, Item};
use std::sync::Arc;
use tracing::debug;

/// Reads the current value of a changed record from its source collection.
pub struct RecordFetcher<B: KvBackend> {
    backend: Arc<B>,
}

impl<B: KvBackend> Clone for RecordFetcher<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<B: KvBackend> RecordFetcher<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Fetch the current value of `key` in `collection`.
    ///
    /// A missing key is not an error: deletions are a normal steady state and
    /// come back as `payload: None`.
    pub async fn fetch(&self, collection: &str, key: &Item) -> Result<FetchedValue> {
        if collection.is_empty() {
            return Err(ReplicationError::invalid_collection(
                collection,
                "empty collection name",
            ));
        }

        let payload = self
            .backend
            .get(collection, key)
            .await
            .map_err(|e| e.into_replication("get", collection))?;

        if payload.is_none() {
            debug!(collection, "Source record absent");
        }

        Ok(FetchedValue {
            key: key.clone(),
            payload,
        })
    }
}
