// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Record replicator: writes a fetched value into the destination collection.
//!
//! # Write Semantics
//!
//! Writes are full overwrites keyed by the source key, so delivering the same
//! value twice leaves the destination exactly as delivering it once. This is
//! what makes at-least-once delivery with retries safe.
//!
//! # Vanished Records
//!
//! When the source record is gone by the time it is fetched, the
//! [`DeletePolicy`] decides: `Skip` leaves the destination alone, `Propagate`
//! deletes the key there. The put path is never called without a payload.

use crate::backend::KvBackend;
use crate::config::{DeletePolicy, DestinationNaming, ReplicatorConfig, SourceSegment};
use crate::error::{ReplicationError, Result};
use crate::record::{FetchedValue, Item};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// What the replicator did with a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplicationAction {
    /// Payload written to the destination.
    Written,
    /// Source gone, destination key deleted.
    Deleted,
    /// Source gone, destination left untouched.
    Skipped,
}

impl ReplicationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Written => "written",
            Self::Deleted => "deleted",
            Self::Skipped => "skipped",
        }
    }
}

impl DestinationNaming {
    /// Derive the destination collection name for `source`.
    pub fn destination_for(&self, source: &str) -> Result<String> {
        let segment = match &self.source {
            SourceSegment::Whole => source,
            SourceSegment::InstanceSuffix { separator } => source
                .rsplit_once(*separator)
                .map(|(_, suffix)| suffix)
                .unwrap_or(source),
            SourceSegment::AfterPrefix { prefix } => {
                source.strip_prefix(prefix.as_str()).ok_or_else(|| {
                    ReplicationError::invalid_collection(
                        source,
                        format!("does not start with '{}'", prefix),
                    )
                })?
            }
        };

        if segment.is_empty() {
            return Err(ReplicationError::invalid_collection(
                source,
                "no name segment to carry into destination",
            ));
        }

        Ok(format!("{}{}{}", self.prefix, segment, self.suffix))
    }
}

/// Writes fetched values to destination collections.
pub struct RecordReplicator<B: KvBackend> {
    backend: Arc<B>,
    naming: DestinationNaming,
    delete_policy: DeletePolicy,
    projection: Option<Vec<String>>,
    max_payload_bytes: Option<usize>,
}

impl<B: KvBackend> RecordReplicator<B> {
    pub fn new(backend: Arc<B>, config: &ReplicatorConfig) -> Self {
        Self {
            backend,
            naming: config.naming.clone(),
            delete_policy: config.delete_policy,
            projection: config.projection.clone(),
            max_payload_bytes: config.max_payload_bytes,
        }
    }

    /// Derive the destination collection for a source collection.
    pub fn destination_for(&self, source: &str) -> Result<String> {
        self.naming.destination_for(source)
    }

    /// Write `value` to `destination`.
    pub async fn replicate(&self, destination: &str, value: &FetchedValue) -> Result<ReplicationAction> {
        let Some(payload) = &value.payload else {
            return self.replicate_absent(destination, &value.key).await;
        };

        let payload = self.project(&value.key, payload);
        self.check_size(destination, &payload)?;

        self.backend
            .put(destination, &value.key, payload)
            .await
            .map_err(|e| e.into_replication("put", destination))?;

        debug!(destination, "Replicated record");
        Ok(ReplicationAction::Written)
    }

    async fn replicate_absent(&self, destination: &str, key: &Item) -> Result<ReplicationAction> {
        match self.delete_policy {
            DeletePolicy::Skip => {
                debug!(destination, "Source absent, skipping");
                Ok(ReplicationAction::Skipped)
            }
            DeletePolicy::Propagate => {
                let removed = self
                    .backend
                    .delete(destination, key)
                    .await
                    .map_err(|e| e.into_replication("delete", destination))?;
                debug!(destination, removed, "Source absent, propagated delete");
                Ok(ReplicationAction::Deleted)
            }
        }
    }

    /// Keep only projected attributes plus the key attributes.
    fn project(&self, key: &Item, payload: &Item) -> Item {
        match &self.projection {
            None => payload.clone(),
            Some(attributes) => payload
                .iter()
                .filter(|(name, _)| key.contains_key(*name) || attributes.contains(*name))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        }
    }

    fn check_size(&self, destination: &str, payload: &Item) -> Result<()> {
        let Some(limit) = self.max_payload_bytes else {
            return Ok(());
        };
        let size = serde_json::to_vec(payload)
            .map_err(|e| ReplicationError::rejected(destination, e.to_string()))?
            .len();
        if size > limit {
            return Err(ReplicationError::rejected(
                destination,
                format!("payload size {} exceeds limit {}", size, limit),
            ));
        }
        Ok(())
    }
}
