// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Record pipeline state types.
//!
//! Defines the state machine each change record walks through.
//!
//! # State Transitions
//!
//! ```text
//!            fetch()            ok              replicate()          ok
//! Decoded ──────────→ Fetching ────→ Fetched ──────────────→ Replicating ────→ Done
//!    │                   │                                        │
//!    │ (no destination,  │ (fetch error                           │ (write error
//!    │  cancelled)       │  after retries)                        │  after retries)
//!    ↓                   ↓                                        ↓
//! Failed ←───────────────┴────────────────────────────────────────┘
//! ```
//!
//! # State Descriptions
//!
//! - **Decoded**: Initial state. The record came out of the decoder.
//! - **Fetching**: Point lookup against the source collection in progress.
//! - **Fetched**: Current source value is known (possibly absent).
//! - **Replicating**: Write (or delete) against the destination in progress.
//! - **Done**: Terminal. The record was written, deleted or skipped.
//! - **Failed**: Terminal. The failure is captured in the batch outcome.

use crate::error::{ReplicationError, Result};

/// State of a single record pipeline.
///
/// See module docs for the state transition diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    Decoded,
    Fetching,
    Fetched,
    Replicating,
    Done,
    Failed,
}

impl RecordState {
    /// Check if this state ends the pipeline.
    #[cfg(test)]
    fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Check if `next` is a legal successor of this state.
    pub fn can_transition_to(&self, next: RecordState) -> bool {
        use RecordState::*;
        matches!(
            (self, next),
            (Decoded, Fetching)
                | (Fetching, Fetched)
                | (Fetched, Replicating)
                | (Replicating, Done)
                | (Decoded, Failed)
                | (Fetching, Failed)
                | (Replicating, Failed)
        )
    }

    /// Move to `next`, rejecting illegal transitions.
    pub fn transition(&mut self, next: RecordState) -> Result<()> {
        if !self.can_transition_to(next) {
            return Err(ReplicationError::InvalidState {
                expected: format!("a successor of {}", self),
                actual: next.to_string(),
            });
        }
        *self = next;
        Ok(())
    }
}

impl std::fmt::Display for RecordState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordState::Decoded => write!(f, "Decoded"),
            RecordState::Fetching => write!(f, "Fetching"),
            RecordState::Fetched => write!(f, "Fetched"),
            RecordState::Replicating => write!(f, "Replicating"),
            RecordState::Done => write!(f, "Done"),
            RecordState::Failed => write!(f, "Failed"),
        }
    }
}
