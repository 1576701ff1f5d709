// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Shared test utilities for integration and chaos tests.
//!
//! This module provides:
//! - Mock KvBackend for recording calls and injecting failures
//! - Change envelope helpers

#![allow(dead_code)]

pub mod mock_backend;

pub use mock_backend::*;

use change_replicator::record::Item;
use serde_json::{json, Value};
use tokio::sync::watch;

/// Source table used throughout the tests.
pub const SOURCE_TABLE: &str = "test-table-42";
/// Destination the default test naming maps [`SOURCE_TABLE`] to.
pub const DEST_TABLE: &str = "test-other-table-42";

/// Change-stream envelope for `user` in `table`.
pub fn stream_envelope(event_name: &str, table: &str, user: &str) -> Value {
    json!({
        "eventID": format!("evt-{}", user),
        "eventName": event_name,
        "eventSourceARN": format!(
            "arn:aws:dynamodb:us-east-1:123456789012:table/{}/stream/2024-01-01T00:00:00.000",
            table
        ),
        "dynamodb": {"Keys": {"userid": {"S": user}}}
    })
}

/// Object-notification envelope for `object_key` in `bucket`.
pub fn object_envelope(event_name: &str, bucket: &str, object_key: &str) -> Value {
    json!({
        "eventName": event_name,
        "s3": {
            "bucket": {"name": bucket},
            "object": {"key": object_key, "size": 1024}
        }
    })
}

/// Key item for `user`.
pub fn key(user: &str) -> Item {
    let mut key = Item::new();
    key.insert("userid".to_string(), json!({"S": user}));
    key
}

/// Full item for `user`.
pub fn item(user: &str, data: &str) -> Item {
    let mut item = key(user);
    item.insert("data".to_string(), json!({"S": data}));
    item
}

/// A cancel receiver whose sender is already gone.
pub fn no_cancel() -> watch::Receiver<bool> {
    let (_tx, rx) = watch::channel(false);
    rx
}
