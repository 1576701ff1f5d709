// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics for observability.
//!
//! Records through the `metrics` facade; installing an exporter is the
//! caller's business.
//!
//! # Metric Naming Convention
//!
//! All metrics are prefixed with `replicator_` and follow Prometheus conventions:
//! - Counters end in `_total`
//! - Histograms track distributions (duration, size)

use metrics::{counter, histogram};
use std::time::Duration;

/// Record envelopes received in a batch.
pub fn record_envelopes_received(count: usize) {
    counter!("replicator_envelopes_received_total").increment(count as u64);
}

/// Record an envelope the decoder could not parse.
pub fn record_decode_failure() {
    counter!("replicator_decode_failures_total").increment(1);
}

/// Record a retry of a backend operation (`get`, `put`, `delete`).
pub fn record_retry(operation: &str) {
    counter!("replicator_retries_total", "operation" => operation.to_string()).increment(1);
}

/// Record a record that reached `Done`, labelled by what was done to it.
pub fn record_replicated(action: &str) {
    counter!("replicator_records_done_total", "action" => action.to_string()).increment(1);
}

/// Record a record that reached `Failed`.
pub fn record_failed(kind: &str) {
    counter!("replicator_records_failed_total", "kind" => kind.to_string()).increment(1);
}

/// Record a single record pipeline's latency.
pub fn record_pipeline_latency(duration: Duration) {
    histogram!("replicator_pipeline_duration_seconds").record(duration.as_secs_f64());
}

/// Record a completed batch.
pub fn record_batch(processed: usize, failed: usize, duration: Duration) {
    counter!("replicator_batches_total").increment(1);
    histogram!("replicator_batch_size").record((processed + failed) as f64);
    histogram!("replicator_batch_duration_seconds").record(duration.as_secs_f64());
}
