//! Fuzz target for kind name resolution.
//!
//! Any name the registry accepts must map back to a name that resolves to
//! the same kind.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_kind_names
//! ```

#![no_main]

use libfuzzer_sys::fuzz_target;
use stratum_migrate::MigrationKindRegistry;

fuzz_target!(|data: &[u8]| {
    if let Ok(name) = std::str::from_utf8(data) {
        let registry = MigrationKindRegistry::new();
        if let Ok(kind) = registry.kind_of(name) {
            let canonical = registry.name_of(&kind).expect("core kinds are enumerated");
            assert_eq!(registry.kind_of(canonical).ok(), Some(kind));
        }
    }
});
