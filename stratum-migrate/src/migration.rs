//! Resolved and applied migrations.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MigrateResult;
use crate::kind::{MigrationKind, MigrationKindRegistry};
use crate::ordering::OrderingKey;
use crate::version::MigrationVersion;

/// Runs a resolved migration. Execution itself lives outside this crate; the
/// engine only inspects these flags.
pub trait MigrationExecutor: Send + Sync {
    /// Whether the migration may run inside a transaction.
    fn can_execute_in_transaction(&self) -> bool;

    /// Whether the migration should run at all.
    fn should_execute(&self) -> bool {
        true
    }
}

/// A migration discovered from source.
#[derive(Clone)]
pub struct ResolvedMigration {
    /// Version, or `None` for repeatable migrations.
    pub version: Option<MigrationVersion>,
    /// Human readable description.
    pub description: String,
    /// Script path relative to its location.
    pub script: String,
    /// Checksum of the script content.
    pub checksum: Option<i32>,
    /// Checksum of the raw content before placeholder substitution.
    pub equivalent_checksum: Option<i32>,
    /// Kind of migration.
    pub kind: MigrationKind,
    /// Absolute on-disk location, if the script lives on disk.
    pub physical_location: Option<PathBuf>,
    /// Executor handle.
    pub executor: Option<Arc<dyn MigrationExecutor>>,
}

impl ResolvedMigration {
    /// Create a resolved migration.
    pub fn new(
        version: Option<MigrationVersion>,
        description: impl Into<String>,
        script: impl Into<String>,
        checksum: Option<i32>,
        kind: MigrationKind,
    ) -> Self {
        Self {
            version,
            description: description.into(),
            script: script.into(),
            checksum,
            equivalent_checksum: None,
            kind,
            physical_location: None,
            executor: None,
        }
    }

    /// Set the equivalent checksum.
    pub fn with_equivalent_checksum(mut self, checksum: i32) -> Self {
        self.equivalent_checksum = Some(checksum);
        self
    }

    /// Set the on-disk location.
    pub fn with_physical_location(mut self, path: impl Into<PathBuf>) -> Self {
        self.physical_location = Some(path.into());
        self
    }

    /// Set the executor.
    pub fn with_executor(mut self, executor: Arc<dyn MigrationExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Whether this is a repeatable migration.
    pub fn is_repeatable(&self) -> bool {
        self.version.is_none()
    }

    /// Whether a recorded checksum matches this migration, either directly or
    /// through the equivalent checksum.
    pub fn checksum_matches(&self, checksum: Option<i32>) -> bool {
        checksum == self.checksum
            || (self.equivalent_checksum.is_some() && checksum == self.equivalent_checksum)
    }

    /// Key used to pair this migration with ledger rows.
    pub fn ordering_key(&self) -> OrderingKey {
        OrderingKey::new(self.version.clone(), self.script.clone())
    }
}

impl fmt::Debug for ResolvedMigration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedMigration")
            .field("version", &self.version)
            .field("description", &self.description)
            .field("script", &self.script)
            .field("checksum", &self.checksum)
            .field("equivalent_checksum", &self.equivalent_checksum)
            .field("kind", &self.kind)
            .field("physical_location", &self.physical_location)
            .field("executor", &self.executor.is_some())
            .finish()
    }
}

/// A ledger row as stored, with the kind kept by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRow {
    /// Order in which the row was installed.
    pub installed_rank: i32,
    /// Version string, if versioned.
    pub version: Option<String>,
    /// Description.
    pub description: String,
    /// Persisted kind name.
    #[serde(rename = "type")]
    pub kind_name: String,
    /// Script path.
    pub script: String,
    /// Recorded checksum.
    pub checksum: Option<i32>,
    /// Database user that installed the row.
    pub installed_by: String,
    /// When the row was installed.
    pub installed_on: DateTime<Utc>,
    /// Execution time in milliseconds.
    pub execution_time: i64,
    /// Whether the migration succeeded.
    pub success: bool,
}

/// A migration recorded in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedMigration {
    /// Order in which the row was installed.
    pub installed_rank: i32,
    /// Version, or `None` for repeatable migrations.
    pub version: Option<MigrationVersion>,
    /// Description.
    pub description: String,
    /// Kind of migration.
    #[serde(rename = "type")]
    pub kind: MigrationKind,
    /// Script path.
    pub script: String,
    /// Recorded checksum.
    pub checksum: Option<i32>,
    /// Database user that installed the row.
    pub installed_by: String,
    /// When the row was installed.
    pub installed_on: DateTime<Utc>,
    /// Execution time in milliseconds.
    pub execution_time: i64,
    /// Whether the migration succeeded.
    pub success: bool,
}

impl AppliedMigration {
    /// Record a successful run of a resolved migration.
    pub fn from_resolved(
        resolved: &ResolvedMigration,
        installed_rank: i32,
        installed_by: impl Into<String>,
        execution_time: i64,
    ) -> Self {
        Self {
            installed_rank,
            version: resolved.version.clone(),
            description: resolved.description.clone(),
            kind: resolved.kind,
            script: resolved.script.clone(),
            checksum: resolved.checksum,
            installed_by: installed_by.into(),
            installed_on: Utc::now(),
            execution_time,
            success: true,
        }
    }

    /// Load a row, resolving its kind name through the registry.
    pub fn from_row(row: LedgerRow, registry: &MigrationKindRegistry) -> MigrateResult<Self> {
        let kind = registry.kind_of(&row.kind_name)?;
        let version = row
            .version
            .as_deref()
            .map(MigrationVersion::parse)
            .transpose()?;

        Ok(Self {
            installed_rank: row.installed_rank,
            version,
            description: row.description,
            kind,
            script: row.script,
            checksum: row.checksum,
            installed_by: row.installed_by,
            installed_on: row.installed_on,
            execution_time: row.execution_time,
            success: row.success,
        })
    }

    /// Convert back to the stored shape.
    pub fn to_row(&self, registry: &MigrationKindRegistry) -> MigrateResult<LedgerRow> {
        Ok(LedgerRow {
            installed_rank: self.installed_rank,
            version: self.version.as_ref().map(ToString::to_string),
            description: self.description.clone(),
            kind_name: registry.name_of(&self.kind)?.to_string(),
            script: self.script.clone(),
            checksum: self.checksum,
            installed_by: self.installed_by.clone(),
            installed_on: self.installed_on,
            execution_time: self.execution_time,
            success: self.success,
        })
    }

    /// Key used to pair this row with a resolved migration.
    pub fn ordering_key(&self) -> OrderingKey {
        OrderingKey::new(self.version.clone(), self.script.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::{ExternalKind, KindFacets, StaticKindProvider};

    fn row(kind_name: &str) -> LedgerRow {
        LedgerRow {
            installed_rank: 3,
            version: Some("1.1".to_string()),
            description: "add users".to_string(),
            kind_name: kind_name.to_string(),
            script: "V1_1__add_users.sql".to_string(),
            checksum: Some(42),
            installed_by: "deploy".to_string(),
            installed_on: Utc::now(),
            execution_time: 12,
            success: true,
        }
    }

    #[test]
    fn test_checksum_matches() {
        let m = ResolvedMigration::new(None, "views", "R__views.sql", Some(1), MigrationKind::SQL)
            .with_equivalent_checksum(2);
        assert!(m.checksum_matches(Some(1)));
        assert!(m.checksum_matches(Some(2)));
        assert!(!m.checksum_matches(Some(3)));
        assert!(!m.checksum_matches(None));

        let plain = ResolvedMigration::new(None, "views", "R__views.sql", None, MigrationKind::SQL);
        assert!(plain.checksum_matches(None));
        assert!(!plain.checksum_matches(Some(1)));
    }

    #[test]
    fn test_row_round_trip() {
        let registry = MigrationKindRegistry::new();
        let original = row("SQL");
        let applied = AppliedMigration::from_row(original.clone(), &registry).unwrap();
        assert_eq!(applied.kind, MigrationKind::SQL);
        assert_eq!(applied.version, Some(MigrationVersion::parse("1.1").unwrap()));
        assert_eq!(applied.to_row(&registry).unwrap(), original);
    }

    #[test]
    fn test_legacy_row_kind() {
        let registry = MigrationKindRegistry::new();
        let applied = AppliedMigration::from_row(row("SPRING_JDBC"), &registry).unwrap();
        assert_eq!(applied.kind, MigrationKind::JDBC);
        assert_eq!(applied.to_row(&registry).unwrap().kind_name, "JDBC");
    }

    #[test]
    fn test_unknown_row_kind() {
        let registry = MigrationKindRegistry::new();
        let err = AppliedMigration::from_row(row("YAML"), &registry).unwrap_err();
        assert!(err.is_type_integrity());
    }

    #[test]
    fn test_plugin_row_kind() {
        const JSON: ExternalKind = ExternalKind::new("json", "JSON", KindFacets::NONE);
        static JSON_KINDS: StaticKindProvider = StaticKindProvider::new("json", &[JSON]);

        let registry = MigrationKindRegistry::new().with_provider(&JSON_KINDS);
        let applied = AppliedMigration::from_row(row("JSON"), &registry).unwrap();
        assert_eq!(applied.kind, MigrationKind::External(JSON));
    }

    #[test]
    fn test_applied_serializes_kind_by_name() {
        let registry = MigrationKindRegistry::new();
        let applied = AppliedMigration::from_row(row("UNDO_SQL"), &registry).unwrap();
        let json = serde_json::to_value(&applied).unwrap();
        assert_eq!(json["type"], "UNDO_SQL");
        assert_eq!(json["version"], "1.1");
        assert_eq!(json["script"], "V1_1__add_users.sql");
    }
}
