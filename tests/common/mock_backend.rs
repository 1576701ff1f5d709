// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Mock KvBackend for testing.
//!
//! Records every get()/put()/delete() call for assertions, injects transient
//! or permanent failures on demand, and tracks how many fetch/replicate pairs
//! are in flight at once (high-water mark) for fan-out assertions.

use change_replicator::backend::{BackendError, BoxFuture, KvBackend};
use change_replicator::record::{key_fingerprint, Item};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{watch, RwLock};

/// A recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub collection: String,
    pub key: Item,
}

/// Mock implementation of KvBackend that records all calls.
///
/// # Example
/// ```rust,ignore
/// let mock = MockBackend::new();
/// mock.seed("test-table-1", key("jane"), item("jane", "hello")).await;
///
/// // Use in tests...
///
/// assert_eq!(mock.puts().await.len(), 1);
/// ```
pub struct MockBackend {
    /// Stored items: (collection, key fingerprint) -> item
    items: RwLock<HashMap<(String, String), Item>>,
    /// Recorded calls
    gets: RwLock<Vec<Call>>,
    puts: RwLock<Vec<Call>>,
    deletes: RwLock<Vec<Call>>,
    /// Every get() fails with Unavailable
    gets_unavailable: AtomicBool,
    /// The next N get() calls fail with Unavailable
    transient_get_failures: AtomicU32,
    /// Every put() fails with Rejected
    reject_puts: AtomicBool,
    /// Every put() fails with Unavailable
    puts_unavailable: AtomicBool,
    /// Artificial latency per call
    latency: Duration,
    /// Pairs between get() start and put()/delete() end
    active_pairs: AtomicUsize,
    max_active_pairs: AtomicUsize,
    /// Flipped to `true` on the first get()
    cancel_on_get: Mutex<Option<watch::Sender<bool>>>,
}

impl MockBackend {
    /// Create a mock with no latency and no failures.
    pub fn new() -> Self {
        Self::with_latency(Duration::ZERO)
    }

    /// Create a mock where every call sleeps for `latency`.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
            gets: RwLock::new(Vec::new()),
            puts: RwLock::new(Vec::new()),
            deletes: RwLock::new(Vec::new()),
            gets_unavailable: AtomicBool::new(false),
            transient_get_failures: AtomicU32::new(0),
            reject_puts: AtomicBool::new(false),
            puts_unavailable: AtomicBool::new(false),
            latency,
            active_pairs: AtomicUsize::new(0),
            max_active_pairs: AtomicUsize::new(0),
            cancel_on_get: Mutex::new(None),
        }
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Store an item for get() to return.
    pub async fn seed(&self, collection: &str, key: Item, item: Item) {
        self.items
            .write()
            .await
            .insert((collection.to_string(), key_fingerprint(&key)), item);
    }

    /// Make every get() fail with Unavailable.
    pub fn fail_gets_always(&self) {
        self.gets_unavailable.store(true, Ordering::SeqCst);
    }

    /// Make the next `n` get() calls fail with Unavailable.
    pub fn fail_next_gets(&self, n: u32) {
        self.transient_get_failures.store(n, Ordering::SeqCst);
    }

    /// Make every put() fail with Rejected.
    pub fn reject_puts(&self) {
        self.reject_puts.store(true, Ordering::SeqCst);
    }

    /// Make every put() fail with Unavailable.
    pub fn fail_puts_always(&self) {
        self.puts_unavailable.store(true, Ordering::SeqCst);
    }

    /// Send `true` on `tx` when the first get() arrives.
    pub fn cancel_on_first_get(&self, tx: watch::Sender<bool>) {
        if let Ok(mut slot) = self.cancel_on_get.lock() {
            *slot = Some(tx);
        }
    }

    // =========================================================================
    // Query Methods
    // =========================================================================

    pub async fn gets(&self) -> Vec<Call> {
        self.gets.read().await.clone()
    }

    pub async fn puts(&self) -> Vec<Call> {
        self.puts.read().await.clone()
    }

    pub async fn deletes(&self) -> Vec<Call> {
        self.deletes.read().await.clone()
    }

    /// Stored item, if any.
    pub async fn item(&self, collection: &str, key: &Item) -> Option<Item> {
        self.items
            .read()
            .await
            .get(&(collection.to_string(), key_fingerprint(key)))
            .cloned()
    }

    /// Highest number of fetch/replicate pairs observed in flight at once.
    pub fn max_concurrent_pairs(&self) -> usize {
        self.max_active_pairs.load(Ordering::SeqCst)
    }

    fn pair_started(&self) {
        let now = self.active_pairs.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active_pairs.fetch_max(now, Ordering::SeqCst);
    }

    fn pair_finished(&self) {
        // Saturating: a put without a preceding get must not underflow.
        let _ = self
            .active_pairs
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl KvBackend for MockBackend {
    fn get(&self, collection: &str, key: &Item) -> BoxFuture<'_, Option<Item>> {
        let call = Call {
            collection: collection.to_string(),
            key: key.clone(),
        };
        Box::pin(async move {
            self.gets.write().await.push(call.clone());
            if let Ok(mut slot) = self.cancel_on_get.lock() {
                if let Some(tx) = slot.take() {
                    let _ = tx.send(true);
                }
            }

            if self.gets_unavailable.load(Ordering::SeqCst) {
                return Err(BackendError::Unavailable("simulated outage".to_string()));
            }
            let transient = self
                .transient_get_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if transient {
                return Err(BackendError::Unavailable("simulated throttling".to_string()));
            }

            self.pair_started();
            self.simulate_latency().await;
            Ok(self
                .items
                .read()
                .await
                .get(&(call.collection, key_fingerprint(&call.key)))
                .cloned())
        })
    }

    fn put(&self, collection: &str, key: &Item, payload: Item) -> BoxFuture<'_, ()> {
        let call = Call {
            collection: collection.to_string(),
            key: key.clone(),
        };
        Box::pin(async move {
            self.puts.write().await.push(call.clone());
            self.simulate_latency().await;
            let result = if self.puts_unavailable.load(Ordering::SeqCst) {
                Err(BackendError::Unavailable("simulated outage".to_string()))
            } else if self.reject_puts.load(Ordering::SeqCst) {
                Err(BackendError::Rejected("simulated size limit".to_string()))
            } else {
                self.items
                    .write()
                    .await
                    .insert((call.collection, key_fingerprint(&call.key)), payload);
                Ok(())
            };
            self.pair_finished();
            result
        })
    }

    fn delete(&self, collection: &str, key: &Item) -> BoxFuture<'_, bool> {
        let call = Call {
            collection: collection.to_string(),
            key: key.clone(),
        };
        Box::pin(async move {
            self.deletes.write().await.push(call.clone());
            self.simulate_latency().await;
            let removed = self
                .items
                .write()
                .await
                .remove(&(call.collection, key_fingerprint(&call.key)))
                .is_some();
            self.pair_finished();
            Ok(removed)
        })
    }
}
