//! Fuzz target for change envelope decoding.
//!
//! Arbitrary bytes are parsed as JSON and fed to the decoder in both
//! envelope formats. Decoding must never panic, and every envelope must
//! come back as exactly one record or one failure at its own index.

#![no_main]

use change_replicator::{ChangeDecoder, EnvelopeConfig};
use libfuzzer_sys::fuzz_target;
use serde_json::Value;

fuzz_target!(|data: &[u8]| {
    let Ok(parsed) = serde_json::from_slice::<Value>(data) else {
        return;
    };

    // Treat a top-level array as a batch, anything else as a single envelope.
    let batch = match parsed {
        Value::Array(items) => items,
        other => vec![other],
    };

    for config in [EnvelopeConfig::default(), EnvelopeConfig::object_notification()] {
        let decoder = ChangeDecoder::new(config);
        for (expected, result) in decoder.decode(batch.clone()).enumerate() {
            match result {
                Ok(record) => {
                    assert_eq!(record.index, expected);
                    assert!(!record.source_collection.is_empty());
                    assert!(!record.key.is_empty());
                }
                Err(failure) => {
                    assert_eq!(failure.index, expected);
                    assert_eq!(failure.envelope, batch[expected]);
                }
            }
        }
    }
});
