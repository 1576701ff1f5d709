// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Batch outcome: per-record accounting returned to the caller.

use crate::decoder::DecodeFailure;
use crate::error::{ErrorKind, ReplicationError};
use crate::record::ChangeRecord;
use crate::replicator::ReplicationAction;
use serde::Serialize;
use serde_json::Value;

/// What failed: a raw envelope (decode failure) or a decoded record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FailedSubject {
    Envelope(Value),
    Record(ChangeRecord),
}

/// One record's failure disposition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordFailure {
    /// Position of the envelope in the inbound batch.
    pub index: usize,
    pub subject: FailedSubject,
    pub kind: ErrorKind,
    /// Human-readable description of the last error.
    pub error: String,
    /// Attempts made on the failing step (0 if the record never started).
    pub attempts: u32,
}

impl RecordFailure {
    /// Failure for a record that went through the pipeline.
    pub fn for_record(record: ChangeRecord, error: &ReplicationError, attempts: u32) -> Self {
        Self {
            index: record.index,
            kind: error.kind(),
            error: error.to_string(),
            subject: FailedSubject::Record(record),
            attempts,
        }
    }

    /// The record, if this failure happened after decoding.
    pub fn record(&self) -> Option<&ChangeRecord> {
        match &self.subject {
            FailedSubject::Record(record) => Some(record),
            FailedSubject::Envelope(_) => None,
        }
    }
}

impl From<DecodeFailure> for RecordFailure {
    fn from(failure: DecodeFailure) -> Self {
        Self {
            index: failure.index,
            kind: failure.error.kind(),
            error: failure.error.to_string(),
            subject: FailedSubject::Envelope(failure.envelope),
            attempts: 0,
        }
    }
}

/// Summary of one batch.
///
/// `processed` counts records that reached `Done`; `written + deleted + skipped
/// == processed`. Every envelope in the batch is accounted for exactly once
/// in either `processed` or `failed`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchOutcome {
    pub processed: usize,
    /// Failures ordered by envelope index.
    pub failed: Vec<RecordFailure>,
    pub written: usize,
    pub deleted: usize,
    pub skipped: usize,
}

impl BatchOutcome {
    /// Check if every record succeeded.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Total envelopes accounted for.
    pub fn total(&self) -> usize {
        self.processed + self.failed.len()
    }

    /// Failures of a given kind.
    pub fn failures_of(&self, kind: ErrorKind) -> impl Iterator<Item = &RecordFailure> {
        self.failed.iter().filter(move |f| f.kind == kind)
    }

    pub(crate) fn record_done(&mut self, action: ReplicationAction) {
        self.processed += 1;
        match action {
            ReplicationAction::Written => self.written += 1,
            ReplicationAction::Deleted => self.deleted += 1,
            ReplicationAction::Skipped => self.skipped += 1,
        }
    }

    pub(crate) fn record_failure(&mut self, failure: RecordFailure) {
        self.failed.push(failure);
    }

    /// Sort failures by envelope index (pipelines finish out of order).
    pub(crate) fn finish(mut self) -> Self {
        self.failed.sort_by_key(|f| f.index);
        self
    }
}
