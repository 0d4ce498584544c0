//! Canonical migration ordering.
//!
//! Two orders live here:
//!
//! - [`OrderingKey`]: `(version, script)`, used to pair ledger rows with
//!   discovered migrations and to sequence execution.
//! - [`compare_resolved`]: the canonical order over discovered migrations,
//!   grouping by kind name before looking at versions.

use std::cmp::Ordering;
use std::fmt;

use crate::migration::ResolvedMigration;
use crate::version::MigrationVersion;

/// A `(version, script)` pair.
///
/// Versionless keys sort first; ties on version fall back to the script path.
/// The derived order relies on `None < Some(_)` and on field order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OrderingKey {
    version: Option<MigrationVersion>,
    script: String,
}

impl OrderingKey {
    /// Create a key.
    pub fn new(version: Option<MigrationVersion>, script: impl Into<String>) -> Self {
        Self {
            version,
            script: script.into(),
        }
    }

    /// The version part.
    pub fn version(&self) -> Option<&MigrationVersion> {
        self.version.as_ref()
    }

    /// The script part.
    pub fn script(&self) -> &str {
        &self.script
    }
}

impl fmt::Display for OrderingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}:{}", version, self.script),
            None => write!(f, "<repeatable>:{}", self.script),
        }
    }
}

/// Canonical order over discovered migrations.
///
/// Kind name first, then version (versionless first), then script path.
pub fn compare_resolved(a: &ResolvedMigration, b: &ResolvedMigration) -> Ordering {
    let by_kind = a.kind.name().cmp(b.kind.name());
    if by_kind.is_ne() {
        return by_kind;
    }

    match (&a.version, &b.version) {
        (None, None) => a.script.cmp(&b.script),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(va), Some(vb)) => va.cmp(vb).then_with(|| a.script.cmp(&b.script)),
    }
}

/// Sort discovered migrations into canonical order.
pub fn sort_resolved(migrations: &mut [ResolvedMigration]) {
    migrations.sort_by(compare_resolved);
}
