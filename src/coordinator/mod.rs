// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Batch coordinator.
//!
//! Drives decode → fetch → replicate for one inbound batch:
//! 1. Decodes envelopes lazily, in input order
//! 2. Starts one pipeline per record, bounded by the fan-out bulkhead
//! 3. Retries transient backend failures with exponential backoff
//! 4. Collects every pipeline's terminal disposition into a [`BatchOutcome`]
//!
//! # Failure Isolation
//!
//! A record that fails never affects its siblings. Per-record errors end up
//! in [`BatchOutcome::failed`]; `run` only returns `Err` for invalid
//! configuration or when cancellation is observed before any record starts.
//!
//! # Accumulation
//!
//! Pipelines run as tasks in a `JoinSet`. The coordinator task is the single
//! collector: it alone owns the outcome and folds in results as it joins
//! them.
//!
//! # Cancellation
//!
//! The batch watches a `watch::Receiver<bool>`. Once `true` is observed no
//! further record starts; pipelines already running finish normally, and
//! records that never started are reported as `Cancelled` failures.

mod pipeline;
mod types;

pub use types::RecordState;

use crate::backend::KvBackend;
use crate::config::ReplicatorConfig;
use crate::decoder::ChangeDecoder;
use crate::error::{ErrorKind, ReplicationError, Result};
use crate::fetcher::RecordFetcher;
use crate::metrics;
use crate::outcome::{BatchOutcome, RecordFailure};
use crate::record::ChangeRecord;
use crate::replicator::RecordReplicator;
use crate::resilience::Bulkhead;
use pipeline::{run_pipeline, PipelineContext, PipelineResult};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, OwnedSemaphorePermit};
use tokio::task::{Id as TaskId, JoinError, JoinSet};
use tracing::{error, info, info_span, instrument, warn, Instrument};

/// Coordinates one batch. Construct a fresh coordinator per batch.
pub struct BatchCoordinator<B: KvBackend> {
    decoder: ChangeDecoder,
    ctx: Arc<PipelineContext<B>>,
    bulkhead: Bulkhead,
}

impl<B: KvBackend> BatchCoordinator<B> {
    /// Create a coordinator for a single batch.
    ///
    /// Fails with [`ReplicationError::Config`] if `config` does not validate.
    pub fn new(config: ReplicatorConfig, backend: Arc<B>) -> Result<Self> {
        config.validate()?;
        let retry = config.retry_config()?;

        let ctx = PipelineContext {
            fetcher: RecordFetcher::new(Arc::clone(&backend)),
            replicator: RecordReplicator::new(backend, &config),
            retry,
        };

        Ok(Self {
            decoder: ChangeDecoder::new(config.envelope.clone()),
            ctx: Arc::new(ctx),
            bulkhead: Bulkhead::new(config.fan_out),
        })
    }

    /// Maximum concurrent record pipelines.
    pub fn fan_out(&self) -> usize {
        self.bulkhead.max_concurrent()
    }

    /// Process `batch` to completion.
    ///
    /// Consumes the coordinator: no state survives the batch.
    #[instrument(skip_all, fields(fan_out = self.bulkhead.max_concurrent()))]
    pub async fn run<I>(self, batch: I, mut cancel: watch::Receiver<bool>) -> Result<BatchOutcome>
    where
        I: IntoIterator<Item = Value>,
    {
        let started = Instant::now();
        let mut outcome = BatchOutcome::default();
        let mut join_set: JoinSet<PipelineResult> = JoinSet::new();
        let mut in_flight: HashMap<TaskId, ChangeRecord> = HashMap::new();
        let mut envelopes = 0usize;
        let mut started_any = false;
        let mut cancelled = false;

        for decoded in self.decoder.decode(batch) {
            envelopes += 1;

            let record = match decoded {
                Ok(record) => record,
                Err(failure) => {
                    warn!(index = failure.index, error = %failure.error, "Skipping malformed envelope");
                    metrics::record_decode_failure();
                    outcome.record_failure(failure.into());
                    continue;
                }
            };

            let permit = if cancelled {
                None
            } else {
                self.acquire_or_cancel(&mut cancel).await
            };

            let Some(permit) = permit else {
                if !started_any {
                    info!(index = record.index, "Cancelled before any record started");
                    return Err(ReplicationError::Cancelled);
                }
                if !cancelled {
                    info!(index = record.index, "Cancellation observed, not starting remaining records");
                    cancelled = true;
                }
                metrics::record_failed(ErrorKind::Cancelled.as_str());
                outcome.record_failure(RecordFailure::for_record(
                    record,
                    &ReplicationError::Cancelled,
                    0,
                ));
                continue;
            };

            started_any = true;
            let span = info_span!(
                "record",
                index = record.index,
                collection = %record.source_collection,
                operation = %record.operation,
            );
            let ctx = Arc::clone(&self.ctx);
            let task_record = record.clone();
            let handle = join_set.spawn(
                async move {
                    let result = run_pipeline(ctx, task_record).await;
                    drop(permit);
                    result
                }
                .instrument(span),
            );
            in_flight.insert(handle.id(), record);
        }

        metrics::record_envelopes_received(envelopes);

        while let Some(joined) = join_set.join_next_with_id().await {
            collect(&mut outcome, &mut in_flight, joined);
        }

        let outcome = outcome.finish();
        let duration = started.elapsed();
        metrics::record_batch(outcome.processed, outcome.failed.len(), duration);
        info!(
            envelopes,
            processed = outcome.processed,
            failed = outcome.failed.len(),
            written = outcome.written,
            deleted = outcome.deleted,
            skipped = outcome.skipped,
            duration_ms = duration.as_millis() as u64,
            "Batch complete"
        );

        Ok(outcome)
    }

    /// Wait for a fan-out slot, unless cancellation is observed first.
    async fn acquire_or_cancel(
        &self,
        cancel: &mut watch::Receiver<bool>,
    ) -> Option<OwnedSemaphorePermit> {
        if *cancel.borrow() {
            return None;
        }
        tokio::select! {
            biased;
            _ = wait_for_cancel(cancel) => None,
            permit = self.bulkhead.acquire() => permit.ok(),
        }
    }
}

/// Resolves once the cancel flag reads `true`. Never resolves if the sender is dropped.
async fn wait_for_cancel(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

fn collect(
    outcome: &mut BatchOutcome,
    in_flight: &mut HashMap<TaskId, ChangeRecord>,
    joined: std::result::Result<(TaskId, PipelineResult), JoinError>,
) {
    match joined {
        Ok((id, PipelineResult::Done { action })) => {
            in_flight.remove(&id);
            outcome.record_done(action);
        }
        Ok((id, PipelineResult::Failed { record, error, attempts })) => {
            in_flight.remove(&id);
            outcome.record_failure(RecordFailure::for_record(record, &error, attempts));
        }
        Err(join_error) => {
            let error = ReplicationError::Internal(format!("pipeline task failed: {}", join_error));
            match in_flight.remove(&join_error.id()) {
                Some(record) => {
                    error!(index = record.index, error = %error, "Record pipeline aborted");
                    metrics::record_failed(error.kind().as_str());
                    outcome.record_failure(RecordFailure::for_record(record, &error, 0));
                }
                None => error!(error = %error, "Unknown pipeline task failed"),
            }
        }
    }
}

/// Invocation entry point: replicate one batch.
///
/// Builds a fresh [`BatchCoordinator`] from `config` and runs `batch` through
/// it. The caller owns the cancel sender; pass a receiver whose sender stays
/// `false` (or is dropped) to run without cancellation.
pub async fn replicate_batch<B, I>(
    config: ReplicatorConfig,
    backend: Arc<B>,
    batch: I,
    cancel: watch::Receiver<bool>,
) -> Result<BatchOutcome>
where
    B: KvBackend,
    I: IntoIterator<Item = Value>,
{
    BatchCoordinator::new(config, backend)?.run(batch, cancel).await
}
