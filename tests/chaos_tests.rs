// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Chaos tests: simulate failures and verify graceful degradation.
//!
//! These tests verify the coordinator handles hostile input and a flaky
//! backend without panics, deadlocks, or lost records.
//!
//! Run with: cargo test --test chaos_tests -- --nocapture

mod common;

use change_replicator::backend::{BackendError, BoxFuture};
use change_replicator::record::key_fingerprint;
use change_replicator::{
    replicate_batch, ErrorKind, InMemoryBackend, Item, KvBackend, ReplicatorConfig,
};
use common::{item, key, no_cancel, stream_envelope, DEST_TABLE, SOURCE_TABLE};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::timeout;

/// Wraps [`InMemoryBackend`] and fails the first call of each operation on
/// each key with `Unavailable`, or every call when `outage` is set.
struct FlakyBackend {
    inner: InMemoryBackend,
    seen: Mutex<HashSet<String>>,
    outage: bool,
}

impl FlakyBackend {
    fn new() -> Self {
        Self {
            inner: InMemoryBackend::new(),
            seen: Mutex::new(HashSet::new()),
            outage: false,
        }
    }

    fn down() -> Self {
        Self {
            outage: true,
            ..Self::new()
        }
    }

    fn should_fail(&self, operation: &str, collection: &str, key: &Item) -> bool {
        if self.outage {
            return true;
        }
        let call = format!("{}:{}:{}", operation, collection, key_fingerprint(key));
        self.seen.lock().map(|mut seen| seen.insert(call)).unwrap_or(false)
    }
}

impl KvBackend for FlakyBackend {
    fn get(&self, collection: &str, key: &Item) -> BoxFuture<'_, Option<Item>> {
        if self.should_fail("get", collection, key) {
            return Box::pin(async { Err(BackendError::Unavailable("flaky get".into())) });
        }
        self.inner.get(collection, key)
    }

    fn put(&self, collection: &str, key: &Item, payload: Item) -> BoxFuture<'_, ()> {
        if self.should_fail("put", collection, key) {
            return Box::pin(async { Err(BackendError::Unavailable("flaky put".into())) });
        }
        self.inner.put(collection, key, payload)
    }

    fn delete(&self, collection: &str, key: &Item) -> BoxFuture<'_, bool> {
        if self.should_fail("delete", collection, key) {
            return Box::pin(async { Err(BackendError::Unavailable("flaky delete".into())) });
        }
        self.inner.delete(collection, key)
    }
}

async fn seeded(backend: &FlakyBackend, users: &[String]) {
    backend.inner.create_collection(SOURCE_TABLE).await;
    backend.inner.create_collection(DEST_TABLE).await;
    for user in users {
        backend
            .inner
            .put(SOURCE_TABLE, &key(user), item(user, "x"))
            .await
            .expect("seed");
    }
}

// =============================================================================
// Hostile Input
// =============================================================================

/// Test: Garbage envelopes are reported, never panic
#[tokio::test]
async fn garbage_envelopes_no_panic() {
    let garbage: Vec<Value> = vec![
        Value::Null,
        json!(true),
        json!(-1),
        json!("INSERT"),
        json!([]),
        json!({}),
        json!({"eventName": null}),
        json!({"eventName": "INSERT", "eventSourceARN": 7}),
        json!({"eventName": "INSERT", "eventSourceARN": "", "dynamodb": {"Keys": {"id": {"S": "1"}}}}),
        json!({"eventName": "INSERT", "eventSourceARN": "table//stream", "dynamodb": {"Keys": {}}}),
        json!({"eventName": "INSERT", "eventSourceARN": "a/b/c", "dynamodb": {"Keys": []}}),
        json!({"eventName": "INSERT", "eventSourceARN": "a/b/c", "dynamodb": "Keys"}),
        json!({"s3": {"bucket": {"name": "b"}, "object": {"key": "k"}}}),
    ];
    let count = garbage.len();

    let backend = Arc::new(InMemoryBackend::new());
    let outcome = replicate_batch(
        ReplicatorConfig::for_testing("test-other-table-"),
        backend,
        garbage,
        no_cancel(),
    )
    .await
    .expect("batch should start");

    println!("Garbage outcome: {:?}", outcome.failed.iter().map(|f| &f.error).collect::<Vec<_>>());
    assert_eq!(outcome.processed, 0);
    assert_eq!(outcome.failed.len(), count);
    assert_eq!(outcome.failures_of(ErrorKind::MalformedEnvelope).count(), count);
}

/// Test: A batch with thousands of malformed envelopes completes quickly
#[tokio::test]
async fn large_malformed_batch_completes() {
    let batch: Vec<Value> = (0..5_000).map(|i| json!({"seq": i})).collect();
    let backend = Arc::new(InMemoryBackend::new());

    let start = std::time::Instant::now();
    let outcome = replicate_batch(
        ReplicatorConfig::for_testing("test-other-table-"),
        backend,
        batch,
        no_cancel(),
    )
    .await
    .expect("batch should start");

    assert_eq!(outcome.failed.len(), 5_000);
    assert!(outcome.failed.windows(2).all(|w| w[0].index < w[1].index));
    println!("Rejected 5000 envelopes in {:?}", start.elapsed());
}

// =============================================================================
// Flaky Backend
// =============================================================================

/// Test: Intermittent outages are absorbed by retries
#[tokio::test(start_paused = true)]
async fn flaky_backend_every_record_accounted() {
    let users: Vec<String> = (0..200).map(|i| format!("user-{}", i)).collect();
    let backend = Arc::new(FlakyBackend::new());
    seeded(&backend, &users).await;

    let batch: Vec<Value> = users
        .iter()
        .map(|u| stream_envelope("INSERT", SOURCE_TABLE, u))
        .collect();

    let outcome = timeout(
        Duration::from_secs(60),
        replicate_batch(
            ReplicatorConfig::for_testing("test-other-table-"),
            Arc::clone(&backend),
            batch,
            no_cancel(),
        ),
    )
    .await
    .expect("batch deadlocked")
    .expect("batch should start");

    assert_eq!(outcome.total(), 200);
    // Each step fails once, well within the retry budget.
    assert!(outcome.is_success(), "failures: {:?}", outcome.failed);
    assert_eq!(backend.inner.len(DEST_TABLE).await, Some(200));
}

/// Test: Concurrent batches against one backend stay isolated
#[tokio::test(start_paused = true)]
async fn concurrent_batches_isolated() {
    let users: Vec<String> = (0..50).map(|i| format!("user-{}", i)).collect();
    let backend = Arc::new(FlakyBackend::new());
    seeded(&backend, &users).await;

    let mut handles = Vec::new();
    for chunk in users.chunks(10) {
        let batch: Vec<Value> = chunk
            .iter()
            .map(|u| stream_envelope("MODIFY", SOURCE_TABLE, u))
            .collect();
        let backend = Arc::clone(&backend);
        handles.push(tokio::spawn(async move {
            replicate_batch(
                ReplicatorConfig::for_testing("test-other-table-"),
                backend,
                batch,
                no_cancel(),
            )
            .await
        }));
    }

    for handle in handles {
        let outcome = handle.await.expect("task panicked").expect("batch should start");
        assert_eq!(outcome.total(), 10);
        assert!(outcome.is_success());
    }
    assert_eq!(backend.inner.len(DEST_TABLE).await, Some(50));
}

/// Test: A backend that is always down fails every record without hanging
#[tokio::test(start_paused = true)]
async fn total_outage_fails_fast() {
    let users: Vec<String> = (0..20).map(|i| format!("user-{}", i)).collect();
    let backend = Arc::new(FlakyBackend::down());
    let batch: Vec<Value> = users
        .iter()
        .map(|u| stream_envelope("INSERT", SOURCE_TABLE, u))
        .collect();

    let config = ReplicatorConfig::for_testing("test-other-table-");
    let attempts = config.retry.max_retries + 1;
    let outcome = timeout(
        Duration::from_secs(60),
        replicate_batch(config, backend, batch, no_cancel()),
    )
    .await
    .expect("batch deadlocked")
    .expect("batch should start");

    assert_eq!(outcome.processed, 0);
    assert_eq!(outcome.failures_of(ErrorKind::BackendUnavailable).count(), 20);
    assert!(outcome.failed.iter().all(|f| f.attempts == attempts));
}
