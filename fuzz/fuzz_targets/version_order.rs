//! Fuzz target for version parsing and ordering.
//!
//! Parsed versions must form a total order consistent with equality and
//! hashing.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_version_order
//! ```

#![no_main]

use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use stratum_migrate::MigrationVersion;

#[derive(Debug, Arbitrary)]
struct Input<'a> {
    a: &'a str,
    b: &'a str,
    c: &'a str,
}

fn hash_of(version: &MigrationVersion) -> u64 {
    let mut hasher = DefaultHasher::new();
    version.hash(&mut hasher);
    hasher.finish()
}

fuzz_target!(|input: Input<'_>| {
    let (Ok(a), Ok(b), Ok(c)) = (
        MigrationVersion::parse(input.a),
        MigrationVersion::parse(input.b),
        MigrationVersion::parse(input.c),
    ) else {
        return;
    };

    assert_eq!(a.cmp(&b), b.cmp(&a).reverse());
    if a == b {
        assert_eq!(hash_of(&a), hash_of(&b));
    }
    if a.cmp(&b) != Ordering::Greater && b.cmp(&c) != Ordering::Greater {
        assert_ne!(a.cmp(&c), Ordering::Greater);
    }
});
