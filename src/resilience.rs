// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Resilience utilities: retry with exponential backoff, bulkheads.
//!
//! - [`RetryConfig`] / [`retry_with_backoff`]: bounded retries for transient failures
//! - [`Bulkhead`]: semaphore limiting concurrent record pipelines (fan-out)
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), change_replicator::resilience::BulkheadFull> {
//! use change_replicator::resilience::Bulkhead;
//!
//! // Bulkhead: max 10 concurrent pipelines
//! let bulkhead = Bulkhead::new(10);
//! let _permit = bulkhead.acquire().await?;
//! // permit dropped = slot released
//! # Ok(())
//! # }
//! ```

use crate::error::Result;
use crate::metrics;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

/// Configuration for retrying transient backend failures.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt. `0` means a single attempt.
    pub max_retries: u32,

    /// Delay before the first retry.
    pub initial_delay: Duration,

    /// Maximum delay between retries (ceiling for exponential backoff).
    pub max_delay: Duration,

    /// Backoff multiplier (e.g., 2.0 = double delay each retry).
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            backoff_factor: 2.0,
        }
    }
}

impl RetryConfig {
    /// Calculate delay before retry number `retry` (1-indexed).
    ///
    /// ```text
    /// retry  delay (base 100ms, factor 2)
    /// -----  -----
    /// 1      100ms
    /// 2      200ms
    /// 3      400ms
    /// ...    capped at max_delay
    /// ```
    pub fn delay_for_attempt(&self, retry: u32) -> Duration {
        if retry == 0 {
            return self.initial_delay;
        }

        // Saturate: far past the cap the exact exponent no longer matters.
        let exponent = i32::try_from(retry - 1).unwrap_or(i32::MAX);
        let multiplier = self.backoff_factor.powi(exponent);
        let delay_secs = self.initial_delay.as_secs_f64() * multiplier;
        if !delay_secs.is_finite() || delay_secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }

        std::cmp::min(Duration::from_secs_f64(delay_secs), self.max_delay)
    }
}

/// Outcome of a retried operation.
#[derive(Debug)]
pub struct Retried<T> {
    pub result: Result<T>,
    /// Total attempts made, including the first.
    pub attempts: u32,
}

/// Run `op` until it succeeds, fails with a non-retryable error, or
/// `config.max_retries` retries are exhausted.
///
/// Sleeps `config.delay_for_attempt(n)` before retry `n`.
pub async fn retry_with_backoff<T, F, Fut>(
    config: &RetryConfig,
    operation: &str,
    mut op: F,
) -> Retried<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        match op().await {
            Ok(value) => {
                return Retried {
                    result: Ok(value),
                    attempts,
                }
            }
            Err(e) if e.is_retryable() && attempts <= config.max_retries => {
                let delay = config.delay_for_attempt(attempts);
                debug!(
                    operation,
                    attempt = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient failure, backing off"
                );
                metrics::record_retry(operation);
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                return Retried {
                    result: Err(e),
                    attempts,
                }
            }
        }
    }
}

// =============================================================================
// Bulkhead (Concurrency Limiter)
// =============================================================================

/// Error when bulkhead is closed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("bulkhead closed: max {max_concurrent} concurrent operations")]
pub struct BulkheadFull {
    /// Maximum concurrent operations allowed.
    pub max_concurrent: usize,
}

/// Bulkhead pattern: limits concurrent operations to prevent resource exhaustion.
///
/// The coordinator acquires a permit before starting each record pipeline
/// and moves it into the pipeline task, so at most `max_concurrent`
/// fetch/replicate pairs are ever in flight.
#[derive(Debug)]
pub struct Bulkhead {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
}

impl Bulkhead {
    /// Create a new bulkhead with the given concurrency limit.
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    /// Acquire a permit, waiting if necessary.
    ///
    /// Returns a permit that releases the slot when dropped. Cancel-safe.
    pub async fn acquire(&self) -> std::result::Result<OwnedSemaphorePermit, BulkheadFull> {
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| BulkheadFull {
                max_concurrent: self.max_concurrent,
            })
    }

    /// Get the maximum concurrent operations allowed.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }
}
