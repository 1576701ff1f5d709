// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! # Change Replicator
//!
//! An event-driven record replication core: change notifications in,
//! replicated records out, with a structured account of every record.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────────────┐
//! │                          change-replicator                                │
//! │                                                                           │
//! │  ┌──────────────┐    ┌──────────────────────────────────────────────┐     │
//! │  │ ChangeDecoder│───►│ BatchCoordinator (bulkhead, fan-out N)       │     │
//! │  │ (lazy, in    │    │                                              │     │
//! │  │  order)      │    │   per record:  RecordFetcher ──► Replicator  │     │
//! │  └──────────────┘    │                (get + retry)    (put/delete) │     │
//! │         │            └──────────────────────────────────────────────┘     │
//! │         │ malformed                        │ terminal disposition         │
//! │         ▼                                  ▼                              │
//! │  ┌─────────────────────────────────────────────────────────────────┐      │
//! │  │ BatchOutcome { processed, failed[(subject, kind)], ... }        │      │
//! │  └─────────────────────────────────────────────────────────────────┘      │
//! └───────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use change_replicator::{replicate_batch, InMemoryBackend, ReplicatorConfig};
//! use std::sync::Arc;
//! use tokio::sync::watch;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ReplicatorConfig::for_testing("test-other-table-");
//!     let backend = Arc::new(InMemoryBackend::new());
//!     let (_cancel_tx, cancel_rx) = watch::channel(false);
//!
//!     let batch: Vec<serde_json::Value> = Vec::new();
//!     let outcome = replicate_batch(config, backend, batch, cancel_rx)
//!         .await
//!         .expect("batch failed to start");
//!
//!     for failure in &outcome.failed {
//!         eprintln!("envelope {} failed: {}", failure.index, failure.error);
//!     }
//! }
//! ```

pub mod backend;
pub mod config;
pub mod coordinator;
pub mod decoder;
pub mod error;
pub mod fetcher;
pub mod metrics;
pub mod outcome;
pub mod record;
pub mod replicator;
pub mod resilience;

// Re-exports for convenience
pub use backend::{BackendError, InMemoryBackend, KvBackend};
pub use config::{DeletePolicy, DestinationNaming, EnvelopeConfig, EnvelopeFormat, ReplicatorConfig};
pub use coordinator::{replicate_batch, BatchCoordinator, RecordState};
pub use decoder::{ChangeDecoder, DecodeFailure};
pub use error::{ErrorKind, ReplicationError, Result};
pub use fetcher::RecordFetcher;
pub use outcome::{BatchOutcome, FailedSubject, RecordFailure};
pub use record::{ChangeRecord, FetchedValue, Item, OperationKind};
pub use replicator::{RecordReplicator, ReplicationAction};
