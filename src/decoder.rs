// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Change notification decoder.
//!
//! Turns a batch of raw notification envelopes (JSON values) into
//! [`ChangeRecord`]s. Decoding is lazy and order-preserving; an envelope that
//! does not satisfy the field-extraction contract is yielded as a
//! [`DecodeFailure`] instead of aborting the batch.
//!
//! # Field-Extraction Contract
//!
//! | Format | Collection | Key | Operation |
//! |--------|------------|-----|-----------|
//! | `ChangeStream` | segment `arn_segment` of `eventSourceARN` split on `arn_delimiter` | `dynamodb.Keys` (object) | `eventName`: `INSERT`/`MODIFY`/`REMOVE` |
//! | `ObjectNotification` | `s3.bucket.name` | `s3.object.key` as `{"key": ..}` | `eventName`: `ObjectCreated:*`/`ObjectRemoved:*` |
//!
//! A missing `eventName` decodes as [`OperationKind::Unknown`]; every other
//! field is required.

use crate::config::{EnvelopeConfig, EnvelopeFormat};
use crate::error::{ReplicationError, Result};
use crate::record::{ChangeRecord, Item, OperationKind};
use serde_json::Value;
use tracing::trace;

/// An envelope that could not be decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeFailure {
    /// Position in the inbound batch.
    pub index: usize,
    /// The raw envelope, kept for reporting.
    pub envelope: Value,
    pub error: ReplicationError,
}

/// Decodes envelopes according to an [`EnvelopeConfig`].
#[derive(Debug, Clone)]
pub struct ChangeDecoder {
    config: EnvelopeConfig,
}

impl ChangeDecoder {
    pub fn new(config: EnvelopeConfig) -> Self {
        Self { config }
    }

    /// Decode a batch lazily, preserving input order.
    ///
    /// The returned iterator consumes `batch`; it cannot be restarted.
    pub fn decode<I>(&self, batch: I) -> Decoded<'_, I::IntoIter>
    where
        I: IntoIterator<Item = Value>,
    {
        Decoded {
            decoder: self,
            inner: batch.into_iter().enumerate(),
        }
    }

    /// Decode a single envelope.
    pub fn decode_one(&self, index: usize, envelope: &Value) -> Result<ChangeRecord> {
        let record = match self.config.format {
            EnvelopeFormat::ChangeStream => self.decode_change_stream(index, envelope)?,
            EnvelopeFormat::ObjectNotification => decode_object_notification(index, envelope)?,
        };
        trace!(
            index,
            collection = %record.source_collection,
            operation = %record.operation,
            "Decoded change record"
        );
        Ok(record)
    }

    fn decode_change_stream(&self, index: usize, envelope: &Value) -> Result<ChangeRecord> {
        let arn = get_str(envelope, &["eventSourceARN"])?;
        let source_collection = self.collection_from_arn(arn)?;

        let keys = get_field(envelope, &["dynamodb", "Keys"])?
            .as_object()
            .ok_or_else(|| malformed("dynamodb.Keys is not an object"))?;
        if keys.is_empty() {
            return Err(malformed("dynamodb.Keys is empty"));
        }
        let key: Item = keys.iter().map(|(k, v)| (k.clone(), v.clone())).collect();

        let operation = envelope
            .get("eventName")
            .and_then(Value::as_str)
            .map(OperationKind::from_stream_event)
            .unwrap_or(OperationKind::Unknown);

        Ok(ChangeRecord {
            index,
            source_collection,
            key,
            operation,
        })
    }

    /// Extract the collection name from a delimiter-separated resource identifier.
    ///
    /// `arn:aws:dynamodb:us-east-1:123:table/test-table-42/stream/2024` → `test-table-42`
    pub fn collection_from_arn(&self, arn: &str) -> Result<String> {
        let segment = arn
            .split(self.config.arn_delimiter.as_str())
            .nth(self.config.arn_segment)
            .ok_or_else(|| {
                malformed(format!(
                    "eventSourceARN '{}' has no segment {}",
                    arn, self.config.arn_segment
                ))
            })?;
        if segment.is_empty() {
            return Err(malformed(format!(
                "eventSourceARN '{}' has an empty collection segment",
                arn
            )));
        }
        Ok(segment.to_string())
    }
}

fn decode_object_notification(index: usize, envelope: &Value) -> Result<ChangeRecord> {
    let bucket = get_str(envelope, &["s3", "bucket", "name"])?;
    if bucket.is_empty() {
        return Err(malformed("s3.bucket.name is empty"));
    }
    let object_key = get_str(envelope, &["s3", "object", "key"])?;
    if object_key.is_empty() {
        return Err(malformed("s3.object.key is empty"));
    }

    let mut key = Item::new();
    key.insert("key".to_string(), Value::String(object_key.to_string()));

    let operation = envelope
        .get("eventName")
        .and_then(Value::as_str)
        .map(OperationKind::from_object_event)
        .unwrap_or(OperationKind::Unknown);

    Ok(ChangeRecord {
        index,
        source_collection: bucket.to_string(),
        key,
        operation,
    })
}

/// Lazy decoding iterator returned by [`ChangeDecoder::decode`].
pub struct Decoded<'a, I> {
    decoder: &'a ChangeDecoder,
    inner: std::iter::Enumerate<I>,
}

impl<I> Iterator for Decoded<'_, I>
where
    I: Iterator<Item = Value>,
{
    type Item = std::result::Result<ChangeRecord, DecodeFailure>;

    fn next(&mut self) -> Option<Self::Item> {
        let (index, envelope) = self.inner.next()?;
        Some(
            self.decoder
                .decode_one(index, &envelope)
                .map_err(|error| DecodeFailure {
                    index,
                    envelope,
                    error,
                }),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

fn malformed(message: impl Into<String>) -> ReplicationError {
    ReplicationError::MalformedEnvelope(message.into())
}

fn get_field<'v>(envelope: &'v Value, path: &[&str]) -> Result<&'v Value> {
    let mut current = envelope;
    for segment in path {
        current = current
            .get(*segment)
            .ok_or_else(|| malformed(format!("missing field '{}'", path.join("."))))?;
    }
    Ok(current)
}

fn get_str<'v>(envelope: &'v Value, path: &[&str]) -> Result<&'v str> {
    get_field(envelope, path)?
        .as_str()
        .ok_or_else(|| malformed(format!("field '{}' is not a string", path.join("."))))
}
