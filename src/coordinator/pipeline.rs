// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Per-record pipeline: fetch the source value, then replicate it.
//!
//! Each pipeline owns its [`ChangeRecord`] and reports exactly one
//! [`PipelineResult`] back to the coordinator's collector. It never touches
//! the batch outcome directly.

use super::types::RecordState;
use crate::backend::KvBackend;
use crate::error::ReplicationError;
use crate::fetcher::RecordFetcher;
use crate::metrics;
use crate::record::ChangeRecord;
use crate::replicator::{RecordReplicator, ReplicationAction};
use crate::resilience::{retry_with_backoff, RetryConfig};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Terminal disposition of one record.
#[derive(Debug)]
pub(crate) enum PipelineResult {
    Done {
        action: ReplicationAction,
    },
    Failed {
        record: ChangeRecord,
        error: ReplicationError,
        attempts: u32,
    },
}

/// Shared, read-only collaborators for every pipeline in a batch.
pub(crate) struct PipelineContext<B: KvBackend> {
    pub fetcher: RecordFetcher<B>,
    pub replicator: RecordReplicator<B>,
    pub retry: RetryConfig,
}

/// Drive one record from `Decoded` to a terminal state.
pub(crate) async fn run_pipeline<B: KvBackend>(
    ctx: Arc<PipelineContext<B>>,
    record: ChangeRecord,
) -> PipelineResult {
    let started = Instant::now();
    let mut state = RecordState::Decoded;

    let result = drive(&ctx, &record, &mut state).await;
    metrics::record_pipeline_latency(started.elapsed());

    match result {
        Ok(action) => {
            debug!(action = action.as_str(), "Record done");
            metrics::record_replicated(action.as_str());
            PipelineResult::Done { action }
        }
        Err((error, attempts)) => {
            if state.can_transition_to(RecordState::Failed) {
                state = RecordState::Failed;
            }
            warn!(
                state = %state,
                kind = %error.kind(),
                attempts,
                error = %error,
                "Record failed"
            );
            metrics::record_failed(error.kind().as_str());
            PipelineResult::Failed {
                record,
                error,
                attempts,
            }
        }
    }
}

async fn drive<B: KvBackend>(
    ctx: &PipelineContext<B>,
    record: &ChangeRecord,
    state: &mut RecordState,
) -> Result<ReplicationAction, (ReplicationError, u32)> {
    // Resolve the destination before any I/O so naming errors fail from Decoded.
    let destination = ctx
        .replicator
        .destination_for(&record.source_collection)
        .map_err(|e| (e, 0))?;

    state.transition(RecordState::Fetching).map_err(|e| (e, 0))?;
    let fetched = retry_with_backoff(&ctx.retry, "get", || {
        ctx.fetcher.fetch(&record.source_collection, &record.key)
    })
    .await;
    let value = fetched.result.map_err(|e| (e, fetched.attempts))?;
    state.transition(RecordState::Fetched).map_err(|e| (e, 0))?;

    state.transition(RecordState::Replicating).map_err(|e| (e, 0))?;
    let replicated = retry_with_backoff(&ctx.retry, "put", || {
        ctx.replicator.replicate(&destination, &value)
    })
    .await;
    let action = replicated.result.map_err(|e| (e, replicated.attempts))?;
    state.transition(RecordState::Done).map_err(|e| (e, 0))?;

    Ok(action)
}
