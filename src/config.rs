// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for the change replicator.
//!
//! Configuration is passed explicitly to
//! [`BatchCoordinator::new()`](crate::coordinator::BatchCoordinator::new);
//! nothing is read from the process environment. It can be constructed
//! programmatically or deserialized from JSON or any serde format.
//!
//! # Quick Start
//!
//! ```rust
//! use change_replicator::config::{DestinationNaming, ReplicatorConfig};
//!
//! let config = ReplicatorConfig {
//!     naming: DestinationNaming::prefix("test-other-table-"),
//!     fan_out: 10,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```
//!
//! # Configuration Structure
//!
//! ```text
//! ReplicatorConfig
//! ├── envelope: EnvelopeConfig     # How notifications are decoded
//! ├── naming: DestinationNaming    # Source → destination collection name
//! ├── retry: RetrySettings         # Retry count and backoff for transient errors
//! ├── fan_out: usize               # Max concurrent record pipelines
//! ├── delete_policy: DeletePolicy  # Skip or propagate vanished records
//! ├── projection: Option<Vec<..>>  # Attributes to copy (None = all)
//! └── max_payload_bytes: Option<usize>
//! ```
//!
//! # JSON Example
//!
//! ```json
//! {
//!   "envelope": {"format": "change_stream", "arn_delimiter": "/", "arn_segment": 1},
//!   "naming": {
//!     "prefix": "test-other-table-",
//!     "source": {"keep": "instance_suffix", "separator": "-"}
//!   },
//!   "retry": {"max_retries": 5, "backoff_base": "100ms", "backoff_max": "5s"},
//!   "fan_out": 10,
//!   "delete_policy": "propagate"
//! }
//! ```

use crate::error::{ReplicationError, Result};
use crate::resilience::RetryConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ═══════════════════════════════════════════════════════════════════════════════
// Top-level config: passed to BatchCoordinator::new()
// ═══════════════════════════════════════════════════════════════════════════════

/// The top-level config object for one batch invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicatorConfig {
    /// Notification decoding contract.
    #[serde(default)]
    pub envelope: EnvelopeConfig,

    /// How destination collection names are derived from source names.
    #[serde(default)]
    pub naming: DestinationNaming,

    /// Retry behavior for transient backend failures.
    #[serde(default)]
    pub retry: RetrySettings,

    /// Maximum number of record pipelines in flight at once.
    #[serde(default = "default_fan_out")]
    pub fan_out: usize,

    /// What to do when the source record no longer exists.
    #[serde(default)]
    pub delete_policy: DeletePolicy,

    /// Attributes to copy to the destination. Key attributes are always kept.
    /// `None` copies the whole item.
    #[serde(default)]
    pub projection: Option<Vec<String>>,

    /// Reject payloads whose JSON encoding exceeds this many bytes.
    #[serde(default)]
    pub max_payload_bytes: Option<usize>,
}

fn default_fan_out() -> usize {
    10
}

impl Default for ReplicatorConfig {
    fn default() -> Self {
        Self {
            envelope: EnvelopeConfig::default(),
            naming: DestinationNaming::default(),
            retry: RetrySettings::default(),
            fan_out: 10,
            delete_policy: DeletePolicy::default(),
            projection: None,
            max_payload_bytes: None,
        }
    }
}

impl ReplicatorConfig {
    /// Create a config with fast retries for tests.
    pub fn for_testing(destination_prefix: &str) -> Self {
        Self {
            naming: DestinationNaming::prefix(destination_prefix),
            retry: RetrySettings::testing(),
            fan_out: 4,
            ..Default::default()
        }
    }

    /// Check the configuration for values that cannot work.
    pub fn validate(&self) -> Result<()> {
        if self.fan_out == 0 {
            return Err(ReplicationError::Config("fan_out must be at least 1".into()));
        }
        if self.envelope.arn_delimiter.is_empty() {
            return Err(ReplicationError::Config("arn_delimiter must not be empty".into()));
        }
        if self.naming.is_identity() {
            return Err(ReplicationError::Config(
                "naming must change the collection name (destination would equal source)".into(),
            ));
        }
        if let SourceSegment::AfterPrefix { prefix } = &self.naming.source {
            if prefix.is_empty() {
                return Err(ReplicationError::Config(
                    "naming.source.prefix must not be empty".into(),
                ));
            }
        }
        if matches!(self.max_payload_bytes, Some(0)) {
            return Err(ReplicationError::Config("max_payload_bytes must be positive".into()));
        }
        let base = self.retry.backoff_base_duration()?;
        let max = self.retry.backoff_max_duration()?;
        if base > max {
            return Err(ReplicationError::Config(format!(
                "backoff_base ({}) exceeds backoff_max ({})",
                self.retry.backoff_base, self.retry.backoff_max
            )));
        }
        if self.retry.backoff_factor < 1.0 {
            return Err(ReplicationError::Config("backoff_factor must be >= 1.0".into()));
        }
        Ok(())
    }

    /// Resolve retry settings into a [`RetryConfig`].
    pub fn retry_config(&self) -> Result<RetryConfig> {
        Ok(RetryConfig {
            max_retries: self.retry.max_retries,
            initial_delay: self.retry.backoff_base_duration()?,
            max_delay: self.retry.backoff_max_duration()?,
            backoff_factor: self.retry.backoff_factor,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EnvelopeConfig: notification field-extraction contract
// ═══════════════════════════════════════════════════════════════════════════════

/// Which notification shape the decoder expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeFormat {
    /// Table change streams: `eventSourceARN`, `eventName`, `dynamodb.Keys`.
    #[default]
    ChangeStream,
    /// Bucket object notifications: `s3.bucket.name`, `s3.object.key`, `eventName`.
    ObjectNotification,
}

/// Notification decoding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeConfig {
    #[serde(default)]
    pub format: EnvelopeFormat,

    /// Delimiter splitting the resource identifier into path segments.
    #[serde(default = "default_arn_delimiter")]
    pub arn_delimiter: String,

    /// Segment of the resource identifier holding the collection name.
    #[serde(default = "default_arn_segment")]
    pub arn_segment: usize,
}

fn default_arn_delimiter() -> String {
    "/".to_string()
}

fn default_arn_segment() -> usize {
    1
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            format: EnvelopeFormat::ChangeStream,
            arn_delimiter: "/".to_string(),
            arn_segment: 1,
        }
    }
}

impl EnvelopeConfig {
    /// Decoder settings for object notifications.
    pub fn object_notification() -> Self {
        Self {
            format: EnvelopeFormat::ObjectNotification,
            ..Default::default()
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DestinationNaming: source collection → destination collection
// ═══════════════════════════════════════════════════════════════════════════════

/// Which part of the source collection name is carried into the destination name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "keep", rename_all = "snake_case")]
pub enum SourceSegment {
    /// The full source name.
    Whole,
    /// The text after the last `separator` (`test-table-42` → `42`).
    /// Names without the separator are kept whole.
    InstanceSuffix { separator: char },
    /// The source name with a known leading prefix removed.
    AfterPrefix { prefix: String },
}

impl Default for SourceSegment {
    fn default() -> Self {
        Self::InstanceSuffix { separator: '-' }
    }
}

/// Deterministic destination name transform: `prefix + segment(source) + suffix`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationNaming {
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub suffix: String,
    #[serde(default)]
    pub source: SourceSegment,
}

impl Default for DestinationNaming {
    fn default() -> Self {
        Self::prefix("replica-")
    }
}

impl DestinationNaming {
    /// Prefix the source's instance suffix: `test-table-42` → `{prefix}42`.
    pub fn prefix(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            suffix: String::new(),
            source: SourceSegment::default(),
        }
    }

    /// Append a suffix to the whole source name.
    pub fn suffix(suffix: &str) -> Self {
        Self {
            prefix: String::new(),
            suffix: suffix.to_string(),
            source: SourceSegment::Whole,
        }
    }

    /// Replace a known source prefix: `from` + rest → `to` + rest.
    pub fn replace_prefix(from: &str, to: &str) -> Self {
        Self {
            prefix: to.to_string(),
            suffix: String::new(),
            source: SourceSegment::AfterPrefix {
                prefix: from.to_string(),
            },
        }
    }

    fn is_identity(&self) -> bool {
        self.prefix.is_empty() && self.suffix.is_empty() && self.source == SourceSegment::Whole
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DeletePolicy
// ═══════════════════════════════════════════════════════════════════════════════

/// Behavior when the fetched source record no longer exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    /// Leave the destination untouched.
    #[default]
    Skip,
    /// Delete the key from the destination.
    Propagate,
}

// ═══════════════════════════════════════════════════════════════════════════════
// RetrySettings
// ═══════════════════════════════════════════════════════════════════════════════

/// Retry settings for `BackendUnavailable` errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Retries after the first attempt (total attempts = 1 + max_retries).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First backoff interval as a duration string (e.g., "100ms").
    #[serde(default = "default_backoff_base")]
    pub backoff_base: String,

    /// Ceiling for exponential backoff (e.g., "5s").
    #[serde(default = "default_backoff_max")]
    pub backoff_max: String,

    /// Multiplier applied per retry.
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
}

fn default_max_retries() -> u32 {
    5
}

fn default_backoff_base() -> String {
    "100ms".to_string()
}

fn default_backoff_max() -> String {
    "5s".to_string()
}

fn default_backoff_factor() -> f64 {
    2.0
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff_base: "100ms".to_string(),
            backoff_max: "5s".to_string(),
            backoff_factor: 2.0,
        }
    }
}

impl RetrySettings {
    /// Fast retries for tests.
    pub fn testing() -> Self {
        Self {
            max_retries: 3,
            backoff_base: "1ms".to_string(),
            backoff_max: "10ms".to_string(),
            backoff_factor: 2.0,
        }
    }

    /// Parse the backoff_base string to a Duration.
    pub fn backoff_base_duration(&self) -> Result<Duration> {
        parse_duration("backoff_base", &self.backoff_base)
    }

    /// Parse the backoff_max string to a Duration.
    pub fn backoff_max_duration(&self) -> Result<Duration> {
        parse_duration("backoff_max", &self.backoff_max)
    }
}

fn parse_duration(field: &str, value: &str) -> Result<Duration> {
    humantime::parse_duration(value)
        .map_err(|e| ReplicationError::Config(format!("{} '{}': {}", field, value, e)))
}
