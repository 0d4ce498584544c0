//! Pairing of discovered migrations with ledger rows.
//!
//! [`MigrationInfoService`] takes a point-in-time snapshot of both sides and
//! pairs them by [`OrderingKey`]. Every ledger row yields one
//! [`MigrationInfo`], so a script that was run, purged and run again shows up
//! once per row. Discovered migrations without a live row become pending.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::error::{MigrateResult, MigrationError};
use crate::history::Ledger;
use crate::kind::MigrationKind;
use crate::migration::{AppliedMigration, ResolvedMigration};
use crate::ordering::OrderingKey;
use crate::pattern::ValidatePattern;
use crate::resolver::MigrationResolver;
use crate::version::MigrationVersion;

/// State of a migration relative to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationState {
    /// Not applied yet.
    Pending,
    /// Not applied yet, older than the newest applied version, allowed to run.
    OutOfOrder,
    /// Not applied and skipped (out of order or not cherry-picked).
    Ignored,
    /// Not applied and newer than the target version.
    AboveTarget,
    /// Applied successfully.
    Success,
    /// Applied and failed.
    Failed,
    /// Applied but no longer discovered.
    Missing,
    /// Applied with a version newer than anything discovered.
    Future,
    /// Tombstoned.
    Deleted,
}

impl MigrationState {
    /// Whether the migration is waiting to run.
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Pending | Self::OutOfOrder)
    }

    /// Whether a ledger row backs this state.
    pub fn is_applied(self) -> bool {
        matches!(
            self,
            Self::Success | Self::Failed | Self::Missing | Self::Future | Self::Deleted
        )
    }
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "Pending",
            Self::OutOfOrder => "Out of Order",
            Self::Ignored => "Ignored",
            Self::AboveTarget => "Above Target",
            Self::Success => "Success",
            Self::Failed => "Failed",
            Self::Missing => "Missing",
            Self::Future => "Future",
            Self::Deleted => "Deleted",
        };
        f.write_str(s)
    }
}

/// Display rank; applied rows first by installed rank, then pending
/// versioned migrations, then pending repeatables.
#[derive(PartialEq, Eq, PartialOrd, Ord)]
enum Rank<'a> {
    Applied(i32, &'a str),
    Versioned(&'a MigrationVersion, &'a str),
    Repeatable(&'a str),
}

/// A discovered migration paired with a ledger row. Either side may be absent.
#[derive(Debug, Clone)]
pub struct MigrationInfo {
    resolved: Option<ResolvedMigration>,
    applied: Option<AppliedMigration>,
    state: MigrationState,
}

impl MigrationInfo {
    /// Create an info. At least one side should be present.
    pub fn new(
        resolved: Option<ResolvedMigration>,
        applied: Option<AppliedMigration>,
        state: MigrationState,
    ) -> Self {
        Self {
            resolved,
            applied,
            state,
        }
    }

    /// The discovered side.
    pub fn resolved(&self) -> Option<&ResolvedMigration> {
        self.resolved.as_ref()
    }

    /// The ledger side.
    pub fn applied(&self) -> Option<&AppliedMigration> {
        self.applied.as_ref()
    }

    /// Derived state.
    pub fn state(&self) -> MigrationState {
        self.state
    }

    /// Version, preferring the ledger side.
    pub fn version(&self) -> Option<&MigrationVersion> {
        match (&self.applied, &self.resolved) {
            (Some(applied), _) => applied.version.as_ref(),
            (None, Some(resolved)) => resolved.version.as_ref(),
            (None, None) => None,
        }
    }

    /// Script path, preferring the discovered side.
    pub fn script(&self) -> &str {
        match (&self.resolved, &self.applied) {
            (Some(resolved), _) => &resolved.script,
            (None, Some(applied)) => &applied.script,
            (None, None) => "",
        }
    }

    /// Kind, preferring the ledger side.
    pub fn kind(&self) -> Option<MigrationKind> {
        self.applied
            .as_ref()
            .map(|a| a.kind)
            .or_else(|| self.resolved.as_ref().map(|r| r.kind))
    }

    /// Whether both sides are present and name the same script.
    pub fn is_matched(&self) -> bool {
        match (&self.resolved, &self.applied) {
            (Some(resolved), Some(applied)) => resolved.script == applied.script,
            _ => false,
        }
    }

    fn rank(&self) -> Rank<'_> {
        if let Some(applied) = &self.applied {
            return Rank::Applied(applied.installed_rank, &applied.script);
        }
        match self.version() {
            Some(version) => Rank::Versioned(version, self.script()),
            None => Rank::Repeatable(self.script()),
        }
    }

    /// Total display order. Independent of [`OrderingKey`].
    pub fn compare_rank(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

/// Which version to migrate up to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TargetVersion {
    /// Everything discovered.
    #[default]
    Latest,
    /// Nothing newer than the newest applied version.
    Current,
    /// Nothing newer than this version.
    Version(MigrationVersion),
}

impl FromStr for TargetVersion {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "latest" => Ok(Self::Latest),
            "current" => Ok(Self::Current),
            _ => Ok(Self::Version(MigrationVersion::parse(s)?)),
        }
    }
}

impl fmt::Display for TargetVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => f.write_str("latest"),
            Self::Current => f.write_str("current"),
            Self::Version(v) => write!(f, "{v}"),
        }
    }
}

impl Serialize for TargetVersion {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TargetVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Settings for building an info snapshot.
#[derive(Debug, Clone, Default)]
pub struct InfoRequest {
    /// Target version.
    pub target: TargetVersion,
    /// Whether pending migrations older than the newest applied one may run.
    pub out_of_order: bool,
    /// Patterns silencing validation errors.
    pub ignore_patterns: Vec<ValidatePattern>,
    /// If non-empty, only these versions or scripts are pending.
    pub cherry_pick: Vec<String>,
}

/// Why validation failed for a migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Applied but no longer discovered.
    Missing,
    /// Applied with a version newer than anything discovered.
    Future,
    /// Applied and failed.
    Failed,
    /// Discovered but skipped.
    Ignored,
    /// Script changed since it was applied.
    ChecksumMismatch {
        /// Checksum in the ledger.
        applied: Option<i32>,
        /// Checksum of the discovered script.
        resolved: Option<i32>,
    },
}

/// A validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Script path.
    pub script: String,
    /// Version, if any.
    pub version: Option<String>,
    /// What went wrong.
    pub kind: ValidationErrorKind,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let version = self.version.as_deref().unwrap_or("<repeatable>");
        match &self.kind {
            ValidationErrorKind::Missing => write!(
                f,
                "Migration {} ({}) was applied but is no longer discovered",
                self.script, version
            ),
            ValidationErrorKind::Future => write!(
                f,
                "Migration {} ({}) is newer than every discovered migration",
                self.script, version
            ),
            ValidationErrorKind::Failed => {
                write!(f, "Migration {} ({}) failed", self.script, version)
            }
            ValidationErrorKind::Ignored => write!(
                f,
                "Migration {} ({}) was discovered but not applied",
                self.script, version
            ),
            ValidationErrorKind::ChecksumMismatch { applied, resolved } => write!(
                f,
                "Checksum mismatch for migration {} ({}): applied {:?}, resolved {:?}",
                self.script, version, applied, resolved
            ),
        }
    }
}

/// Builds [`MigrationInfo`] snapshots from a resolver and a ledger.
pub struct MigrationInfoService<'a, R, L> {
    resolver: &'a R,
    ledger: &'a L,
    request: InfoRequest,
    infos: Vec<MigrationInfo>,
}

impl<'a, R: MigrationResolver, L: Ledger> MigrationInfoService<'a, R, L> {
    /// Create a service. Call [`refresh`](Self::refresh) before reading.
    pub fn new(resolver: &'a R, ledger: &'a L) -> Self {
        Self {
            resolver,
            ledger,
            request: InfoRequest::default(),
            infos: Vec::new(),
        }
    }

    /// Rebuild the snapshot.
    pub async fn refresh(&mut self, request: &InfoRequest) -> MigrateResult<()> {
        let resolved = self.resolver.resolve().await?;
        let mut applied = self.ledger.all_applied().await?;
        applied.sort_by_key(|a| a.installed_rank);

        self.request = request.clone();
        self.infos = pair(resolved, applied, request)?;
        debug!(count = self.infos.len(), "Refreshed migration info");
        Ok(())
    }

    /// Every info, in rank order.
    pub fn all(&self) -> &[MigrationInfo] {
        &self.infos
    }

    /// Migrations waiting to run, in execution order.
    pub fn pending(&self) -> Vec<&MigrationInfo> {
        let mut pending: Vec<_> = self.infos.iter().filter(|i| i.state().is_pending()).collect();
        pending.sort_by_key(|i| i.resolved().map(ResolvedMigration::ordering_key));
        pending
    }

    /// Migrations backed by a ledger row.
    pub fn applied(&self) -> Vec<&MigrationInfo> {
        self.infos.iter().filter(|i| i.state().is_applied()).collect()
    }

    /// The newest successfully applied versioned migration.
    pub fn current(&self) -> Option<&MigrationInfo> {
        self.infos
            .iter()
            .filter(|i| i.state() == MigrationState::Success && i.version().is_some())
            .max_by(|a, b| a.version().cmp(&b.version()).then_with(|| a.compare_rank(b)))
    }

    /// Validation failures not covered by the request's ignore patterns.
    /// Checksum mismatches are never ignored.
    pub fn validate(&self) -> Vec<ValidationError> {
        let patterns = &self.request.ignore_patterns;
        let mut errors = Vec::new();
        let mut latest: HashMap<OrderingKey, &MigrationInfo> = HashMap::new();

        for info in &self.infos {
            let kind = match info.state() {
                MigrationState::Missing => ValidationErrorKind::Missing,
                MigrationState::Future => ValidationErrorKind::Future,
                MigrationState::Failed => ValidationErrorKind::Failed,
                MigrationState::Ignored => ValidationErrorKind::Ignored,
                MigrationState::Success => {
                    if let Some(applied) = info.applied() {
                        latest
                            .entry(applied.ordering_key())
                            .and_modify(|e| {
                                if info.compare_rank(*e).is_gt() {
                                    *e = info;
                                }
                            })
                            .or_insert(info);
                    }
                    continue;
                }
                _ => continue,
            };

            if !ValidatePattern::any_matches(patterns, info) {
                errors.push(error_for(info, kind));
            }
        }

        let mut checked: Vec<_> = latest.into_values().collect();
        checked.sort_by(|a, b| a.compare_rank(b));
        for info in checked {
            if let (Some(resolved), Some(applied)) = (info.resolved(), info.applied()) {
                if !applied.kind.is_synthetic() && !resolved.checksum_matches(applied.checksum) {
                    errors.push(error_for(
                        info,
                        ValidationErrorKind::ChecksumMismatch {
                            applied: applied.checksum,
                            resolved: resolved.checksum,
                        },
                    ));
                }
            }
        }

        errors
    }
}

fn error_for(info: &MigrationInfo, kind: ValidationErrorKind) -> ValidationError {
    ValidationError {
        script: info.script().to_string(),
        version: info.version().map(ToString::to_string),
        kind,
    }
}

fn pair(
    resolved: Vec<ResolvedMigration>,
    applied: Vec<AppliedMigration>,
    request: &InfoRequest,
) -> MigrateResult<Vec<MigrationInfo>> {
    let mut by_key: BTreeMap<OrderingKey, ResolvedMigration> = BTreeMap::new();
    for migration in resolved {
        let key = migration.ordering_key();
        if by_key.contains_key(&key) {
            return Err(MigrationError::DuplicateMigration {
                script: migration.script,
                version: migration
                    .version
                    .map_or_else(|| "<none>".to_string(), |v| v.to_string()),
            });
        }
        by_key.insert(key, migration);
    }

    // Rows are sorted by rank, so the last insert per key is the newest row.
    let mut latest: HashMap<OrderingKey, &AppliedMigration> = HashMap::new();
    for row in &applied {
        latest.insert(row.ordering_key(), row);
    }
    let live: HashSet<&OrderingKey> = latest
        .iter()
        .filter(|(_, row)| !row.kind.is_tombstone())
        .map(|(key, _)| key)
        .collect();

    let newest_resolved = by_key.keys().filter_map(OrderingKey::version).max();
    let newest_applied = applied
        .iter()
        .filter(|a| a.success && !a.kind.is_tombstone() && live.contains(&a.ordering_key()))
        .filter_map(|a| a.version.as_ref())
        .max();

    let mut infos = Vec::with_capacity(applied.len() + by_key.len());

    for row in &applied {
        let key = row.ordering_key();
        let superseded = latest
            .get(&key)
            .is_some_and(|newest| newest.kind.is_tombstone() && newest.installed_rank > row.installed_rank);
        let resolved = by_key.get(&key).cloned();

        let state = if row.kind.is_tombstone() || superseded {
            MigrationState::Deleted
        } else if !row.success {
            MigrationState::Failed
        } else if resolved.is_none() && !row.kind.is_synthetic() {
            match (&row.version, newest_resolved) {
                (Some(v), Some(newest)) if v > newest => MigrationState::Future,
                (Some(_), None) => MigrationState::Future,
                _ => MigrationState::Missing,
            }
        } else {
            MigrationState::Success
        };

        infos.push(MigrationInfo::new(resolved, Some(row.clone()), state));
    }

    let limit = match &request.target {
        TargetVersion::Latest => None,
        TargetVersion::Current => newest_applied,
        TargetVersion::Version(v) => Some(v),
    };

    for (key, migration) in &by_key {
        if live.contains(key) {
            continue;
        }
        let state = pending_state(migration, request, limit, newest_applied);
        infos.push(MigrationInfo::new(Some(migration.clone()), None, state));
    }

    infos.sort_by(|a, b| a.compare_rank(b));
    Ok(infos)
}

fn pending_state(
    migration: &ResolvedMigration,
    request: &InfoRequest,
    limit: Option<&MigrationVersion>,
    newest_applied: Option<&MigrationVersion>,
) -> MigrationState {
    if !request.cherry_pick.is_empty() && !is_cherry_picked(migration, &request.cherry_pick) {
        return MigrationState::Ignored;
    }

    let Some(version) = &migration.version else {
        return MigrationState::Pending;
    };

    if limit.is_some_and(|limit| version > limit) {
        return MigrationState::AboveTarget;
    }

    match newest_applied {
        Some(newest) if version < newest => {
            if request.out_of_order {
                MigrationState::OutOfOrder
            } else {
                MigrationState::Ignored
            }
        }
        _ => MigrationState::Pending,
    }
}

fn is_cherry_picked(migration: &ResolvedMigration, picks: &[String]) -> bool {
    picks.iter().any(|pick| {
        pick == &migration.script
            || migration.version.as_ref().is_some_and(|version| {
                MigrationVersion::parse(pick).is_ok_and(|picked| &picked == version)
            })
    })
}
