// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Record types shared by the decoder, fetcher, replicator and coordinator.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Opaque attribute map used for both keys and payloads.
///
/// Attribute values are passed through untouched, so typed attribute
/// encodings (`{"S": "jane"}`, `{"N": "1"}`) survive replication as-is.
pub type Item = BTreeMap<String, Value>;

/// Kind of change a notification describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationKind {
    Put,
    Delete,
    Unknown,
}

impl OperationKind {
    /// Map a change-stream `eventName` (`INSERT`, `MODIFY`, `REMOVE`).
    pub fn from_stream_event(name: &str) -> Self {
        match name {
            "INSERT" | "MODIFY" => Self::Put,
            "REMOVE" => Self::Delete,
            _ => Self::Unknown,
        }
    }

    /// Map an object notification `eventName` (`ObjectCreated:Put`, `ObjectRemoved:Delete`, ...).
    pub fn from_object_event(name: &str) -> Self {
        if name.starts_with("ObjectCreated:") {
            Self::Put
        } else if name.starts_with("ObjectRemoved:") {
            Self::Delete
        } else {
            Self::Unknown
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Put => write!(f, "PUT"),
            Self::Delete => write!(f, "DELETE"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// A decoded change notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Position of the originating envelope in the inbound batch.
    pub index: usize,
    /// Collection the change happened in.
    pub source_collection: String,
    /// Key of the affected record.
    pub key: Item,
    /// What happened to it.
    pub operation: OperationKind,
}

/// Current state of a source record.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedValue {
    pub key: Item,
    /// `None` when the source record no longer exists.
    pub payload: Option<Item>,
}

impl FetchedValue {
    /// Check if the source record is gone.
    pub fn is_absent(&self) -> bool {
        self.payload.is_none()
    }
}

/// Canonical string form of a key, usable as a map key.
///
/// `Item` is a `BTreeMap`, so attribute order is already canonical.
pub fn key_fingerprint(key: &Item) -> String {
    serde_json::to_string(key).unwrap_or_default()
}
