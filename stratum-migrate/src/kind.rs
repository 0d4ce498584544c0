//! Migration kinds and the kind registry.
//!
//! Every kind is a member of a closed, enumerable set: either the built-in
//! [`CoreMigrationKind`] set or a set published by a registered
//! [`MigrationKindProvider`]. Kinds are persisted in the ledger by name, so
//! resolution must always go through [`MigrationKindRegistry`].
//!
//! ```rust,ignore
//! use stratum_migrate::kind::{ExternalKind, KindFacets, MigrationKindRegistry, StaticKindProvider};
//!
//! const JSON: ExternalKind = ExternalKind::new("json", "JSON", KindFacets::NONE);
//! static JSON_KINDS: StaticKindProvider = StaticKindProvider::new("json", &[JSON]);
//!
//! let mut registry = MigrationKindRegistry::new();
//! registry.register(&JSON_KINDS);
//!
//! let kind = registry.kind_of("JSON")?;
//! assert_eq!(registry.name_of(&kind)?, "JSON");
//! ```

use std::fmt;

use serde::{Serialize, Serializer};

use crate::error::{MigrateResult, MigrationError};

/// Name under which the built-in kind set is reported.
pub const CORE_PROVIDER: &str = "core";

/// Historical kind names still found in old ledger rows.
const LEGACY_ALIASES: [(&str, CoreMigrationKind); 2] = [
    ("SPRING_JDBC", CoreMigrationKind::Jdbc),
    ("UNDO_SPRING_JDBC", CoreMigrationKind::UndoJdbc),
];

/// Boolean facets every kind carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct KindFacets {
    /// Only ever present in the ledger, never discovered by resolvers.
    pub synthetic: bool,
    /// Reverses an earlier applied migration.
    pub undo: bool,
    /// Marks a baseline point.
    pub baseline: bool,
}

impl KindFacets {
    /// No facet set.
    pub const NONE: Self = Self::new(false, false, false);

    /// Create a facet set.
    pub const fn new(synthetic: bool, undo: bool, baseline: bool) -> Self {
        Self {
            synthetic,
            undo,
            baseline,
        }
    }
}

/// The built-in kind set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CoreMigrationKind {
    /// Schema creation marker.
    Schema,
    /// Baseline marker.
    Baseline,
    /// Tombstone marking an earlier entry as intentionally removed.
    Delete,
    /// Versioned or repeatable SQL script.
    Sql,
    /// Baseline SQL script.
    SqlBaseline,
    /// Undo SQL script.
    UndoSql,
    /// Code-based migration.
    Jdbc,
    /// Code-based baseline migration.
    JdbcBaseline,
    /// Code-based undo migration.
    UndoJdbc,
    /// External script migration.
    Script,
    /// External script baseline migration.
    ScriptBaseline,
    /// External script undo migration.
    UndoScript,
    /// Custom resolver migration.
    Custom,
    /// Custom resolver undo migration.
    UndoCustom,
}

impl CoreMigrationKind {
    /// Every built-in kind, in declaration order.
    pub const ALL: [Self; 14] = [
        Self::Schema,
        Self::Baseline,
        Self::Delete,
        Self::Sql,
        Self::SqlBaseline,
        Self::UndoSql,
        Self::Jdbc,
        Self::JdbcBaseline,
        Self::UndoJdbc,
        Self::Script,
        Self::ScriptBaseline,
        Self::UndoScript,
        Self::Custom,
        Self::UndoCustom,
    ];

    /// Stable persisted name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Schema => "SCHEMA",
            Self::Baseline => "BASELINE",
            Self::Delete => "DELETE",
            Self::Sql => "SQL",
            Self::SqlBaseline => "SQL_BASELINE",
            Self::UndoSql => "UNDO_SQL",
            Self::Jdbc => "JDBC",
            Self::JdbcBaseline => "JDBC_BASELINE",
            Self::UndoJdbc => "UNDO_JDBC",
            Self::Script => "SCRIPT",
            Self::ScriptBaseline => "SCRIPT_BASELINE",
            Self::UndoScript => "UNDO_SCRIPT",
            Self::Custom => "CUSTOM",
            Self::UndoCustom => "UNDO_CUSTOM",
        }
    }

    /// Facets of this kind.
    pub const fn facets(self) -> KindFacets {
        match self {
            Self::Schema | Self::Delete => KindFacets::new(true, false, false),
            Self::Baseline => KindFacets::new(true, false, true),
            Self::SqlBaseline | Self::JdbcBaseline | Self::ScriptBaseline => {
                KindFacets::new(false, false, true)
            }
            Self::UndoSql | Self::UndoJdbc | Self::UndoScript | Self::UndoCustom => {
                KindFacets::new(false, true, false)
            }
            Self::Sql | Self::Jdbc | Self::Script | Self::Custom => KindFacets::NONE,
        }
    }

    /// Look up a built-in kind by its persisted name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

/// A kind published by an external provider.
///
/// Constructing one does not register it: [`MigrationKindRegistry::name_of`]
/// rejects any value that its provider does not enumerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExternalKind {
    provider: &'static str,
    name: &'static str,
    facets: KindFacets,
}

impl ExternalKind {
    /// Declare an external kind.
    pub const fn new(provider: &'static str, name: &'static str, facets: KindFacets) -> Self {
        Self {
            provider,
            name,
            facets,
        }
    }

    /// Name of the provider that owns this kind.
    pub fn provider(&self) -> &'static str {
        self.provider
    }

    /// Persisted name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Facets of this kind.
    pub fn facets(&self) -> KindFacets {
        self.facets
    }
}

/// The kind of a migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MigrationKind {
    /// A built-in kind.
    Core(CoreMigrationKind),
    /// A kind published by a registered provider.
    External(ExternalKind),
}

impl MigrationKind {
    /// Versioned or repeatable SQL.
    pub const SQL: Self = Self::Core(CoreMigrationKind::Sql);
    /// Undo SQL.
    pub const UNDO_SQL: Self = Self::Core(CoreMigrationKind::UndoSql);
    /// Tombstone.
    pub const DELETE: Self = Self::Core(CoreMigrationKind::Delete);
    /// Baseline marker.
    pub const BASELINE: Self = Self::Core(CoreMigrationKind::Baseline);
    /// Code-based migration.
    pub const JDBC: Self = Self::Core(CoreMigrationKind::Jdbc);
    /// Code-based undo migration.
    pub const UNDO_JDBC: Self = Self::Core(CoreMigrationKind::UndoJdbc);

    /// Name carried by this kind. Use [`MigrationKindRegistry::name_of`] when
    /// the name is about to be persisted.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Core(core) => core.name(),
            Self::External(ext) => ext.name(),
        }
    }

    /// Facets of this kind.
    pub fn facets(&self) -> KindFacets {
        match self {
            Self::Core(core) => core.facets(),
            Self::External(ext) => ext.facets(),
        }
    }

    /// Whether this kind only ever lives in the ledger.
    pub fn is_synthetic(&self) -> bool {
        self.facets().synthetic
    }

    /// Whether this kind reverses an earlier migration.
    pub fn is_undo(&self) -> bool {
        self.facets().undo
    }

    /// Whether this kind marks a baseline.
    pub fn is_baseline(&self) -> bool {
        self.facets().baseline
    }

    /// Whether this is the tombstone kind.
    pub fn is_tombstone(&self) -> bool {
        *self == Self::DELETE
    }
}

impl From<CoreMigrationKind> for MigrationKind {
    fn from(kind: CoreMigrationKind) -> Self {
        Self::Core(kind)
    }
}

impl From<ExternalKind> for MigrationKind {
    fn from(kind: ExternalKind) -> Self {
        Self::External(kind)
    }
}

impl fmt::Display for MigrationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for MigrationKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// A source of externally defined kinds.
pub trait MigrationKindProvider: Send + Sync {
    /// Provider name, reported in lookup failures.
    fn name(&self) -> &str;

    /// Every kind this provider owns.
    fn kinds(&self) -> &[ExternalKind];
}

/// A provider backed by a static kind table.
#[derive(Debug, Clone, Copy)]
pub struct StaticKindProvider {
    name: &'static str,
    kinds: &'static [ExternalKind],
}

impl StaticKindProvider {
    /// Create a provider over a static table.
    pub const fn new(name: &'static str, kinds: &'static [ExternalKind]) -> Self {
        Self { name, kinds }
    }
}

impl MigrationKindProvider for StaticKindProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn kinds(&self) -> &[ExternalKind] {
        self.kinds
    }
}

/// Name/kind lookup over the built-in set and an ordered list of providers.
#[derive(Default)]
pub struct MigrationKindRegistry {
    providers: Vec<&'static dyn MigrationKindProvider>,
}

impl MigrationKindRegistry {
    /// Create a registry holding only the built-in kinds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider. Providers are consulted in registration order.
    pub fn register(&mut self, provider: &'static dyn MigrationKindProvider) -> &mut Self {
        self.providers.push(provider);
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_provider(mut self, provider: &'static dyn MigrationKindProvider) -> Self {
        self.providers.push(provider);
        self
    }

    /// Names of every kind set, in lookup order.
    pub fn sources(&self) -> Vec<String> {
        std::iter::once(CORE_PROVIDER.to_string())
            .chain(self.providers.iter().map(|p| p.name().to_string()))
            .collect()
    }

    /// Every kind known to this registry.
    pub fn kinds(&self) -> Vec<MigrationKind> {
        CoreMigrationKind::ALL
            .into_iter()
            .map(MigrationKind::Core)
            .chain(
                self.providers
                    .iter()
                    .flat_map(|p| p.kinds().iter().copied().map(MigrationKind::External)),
            )
            .collect()
    }

    /// Persisted name of a kind.
    ///
    /// Fails when the kind is not enumerated by the provider it claims to come
    /// from; that always means a broken plugin.
    pub fn name_of(&self, kind: &MigrationKind) -> MigrateResult<&'static str> {
        match kind {
            MigrationKind::Core(core) => Ok(core.name()),
            MigrationKind::External(ext) => {
                let enumerated = self
                    .providers
                    .iter()
                    .filter(|p| p.name() == ext.provider())
                    .any(|p| p.kinds().contains(ext));

                if enumerated {
                    Ok(ext.name())
                } else {
                    Err(MigrationError::KindNotEnumerated {
                        name: ext.name().to_string(),
                        provider: ext.provider().to_string(),
                    })
                }
            }
        }
    }

    /// Resolve a persisted name back to a kind.
    ///
    /// Legacy aliases win, then the built-in set, then each provider in
    /// registration order.
    pub fn kind_of(&self, name: &str) -> MigrateResult<MigrationKind> {
        if let Some((_, kind)) = LEGACY_ALIASES.iter().find(|(alias, _)| *alias == name) {
            return Ok(MigrationKind::Core(*kind));
        }

        if let Some(core) = CoreMigrationKind::from_name(name) {
            return Ok(MigrationKind::Core(core));
        }

        for provider in &self.providers {
            if let Some(ext) = provider.kinds().iter().find(|k| k.name() == name) {
                return Ok(MigrationKind::External(*ext));
            }
        }

        Err(MigrationError::UnknownKind {
            name: name.to_string(),
            consulted: self.sources(),
        })
    }
}

impl fmt::Debug for MigrationKindRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationKindRegistry")
            .field("sources", &self.sources())
            .finish()
    }
}
