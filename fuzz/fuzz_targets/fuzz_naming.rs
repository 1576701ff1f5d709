//! Fuzz target for destination naming.
//!
//! Tests that deriving a destination name never panics on arbitrary
//! collection names and never maps a collection onto itself.

#![no_main]

use change_replicator::DestinationNaming;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: (&str, &str)| {
    let (source, affix) = data;
    if affix.is_empty() {
        return;
    }

    let namings = [
        DestinationNaming::prefix(affix),
        DestinationNaming::suffix(affix),
        DestinationNaming::replace_prefix("test-table-", affix),
    ];

    for naming in &namings {
        if let Ok(destination) = naming.destination_for(source) {
            assert!(!destination.is_empty());
            // Deterministic
            assert_eq!(naming.destination_for(source).ok(), Some(destination));
        }
    }

    // A non-empty suffix always changes the name.
    if let Ok(destination) = DestinationNaming::suffix(affix).destination_for(source) {
        assert_ne!(destination, source);
    }
});
