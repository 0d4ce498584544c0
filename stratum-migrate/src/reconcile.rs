//! Drift reconciliation.
//!
//! When a script that has already been applied is edited, its ledger row no
//! longer matches what is on disk. [`DriftReconciler`] runs before validation,
//! finds those rows and deletes them so the edited script is pending again.
//!
//! The selection works on the newest ledger row per script only:
//!
//! ```text
//! infos ──▶ matched pairs ──▶ rank desc ──▶ first per script ──▶ checksum differs?
//!                                                                 & not a tombstone
//!                                                                 & not one-shot
//!                                                                        │
//!                                                                        ▼
//!                                                     ledger.delete() on that row and
//!                                                     every older row of the script
//! ```
//!
//! Older rows go with the newest one, otherwise the next pass would promote
//! the previous row to newest and purge it again.
//!
//! Re-running the script is left to the executor; whether an older version
//! may run after newer ones is governed by `out_of_order`.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use crate::callback::{Callback, Event};
use crate::config::MigrationSettings;
use crate::error::MigrateResult;
use crate::history::Ledger;
use crate::info::{MigrationInfo, MigrationInfoService};
use crate::migration::AppliedMigration;
use crate::pattern::ValidatePattern;
use crate::resolver::MigrationResolver;

/// Ledger rows selected for purging.
#[derive(Debug, Default)]
pub struct DriftSelection<'a> {
    /// Pairs with both sides present and the same script.
    pub matched: usize,
    /// Matched pairs left after keeping the newest row per script.
    pub candidates: usize,
    /// Rows whose checksum drifted.
    pub drifted: Vec<&'a AppliedMigration>,
    /// Older rows of the drifted scripts, newest first. Tombstones are kept.
    pub superseded: Vec<&'a AppliedMigration>,
}

/// Select the ledger rows whose scripts changed since they were applied.
///
/// A `None` checksum on one side and a value on the other counts as drift.
/// Tombstones and scripts starting with `one_shot_prefix` are never selected.
/// Every older non-tombstone row of a drifted script is returned in
/// `superseded`.
pub fn select_drifted<'a>(
    infos: &'a [MigrationInfo],
    one_shot_prefix: Option<&str>,
) -> DriftSelection<'a> {
    let mut matched: Vec<&MigrationInfo> = infos.iter().filter(|i| i.is_matched()).collect();
    matched.sort_by(|a, b| b.compare_rank(a));

    let mut seen = HashSet::new();
    let newest: Vec<&MigrationInfo> = matched
        .iter()
        .copied()
        .filter(|info| seen.insert(info.script()))
        .collect();

    let drifted: Vec<&AppliedMigration> = newest
        .iter()
        .filter_map(|info| {
            let applied = info.applied()?;
            let resolved = info.resolved()?;
            let one_shot = one_shot_prefix.is_some_and(|p| applied.script.starts_with(p));
            (applied.checksum != resolved.checksum && !applied.kind.is_tombstone() && !one_shot)
                .then_some(applied)
        })
        .collect();

    let purged_ranks: HashMap<&str, i32> = drifted
        .iter()
        .map(|a| (a.script.as_str(), a.installed_rank))
        .collect();
    let superseded = matched
        .iter()
        .copied()
        .filter_map(MigrationInfo::applied)
        .filter(|a| {
            !a.kind.is_tombstone()
                && purged_ranks
                    .get(a.script.as_str())
                    .is_some_and(|&rank| a.installed_rank < rank)
        })
        .collect();

    DriftSelection {
        matched: matched.len(),
        candidates: newest.len(),
        drifted,
        superseded,
    }
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    /// Matched pairs considered.
    pub matched: usize,
    /// Pairs left after deduplication.
    pub candidates: usize,
    /// Rows deleted from the ledger.
    pub purged: Vec<AppliedMigration>,
    /// Older rows of the purged scripts, deleted with them.
    pub superseded: Vec<AppliedMigration>,
}

impl ReconcileReport {
    /// Whether nothing was purged.
    pub fn is_empty(&self) -> bool {
        self.purged.is_empty()
    }

    /// Scripts whose rows were purged.
    pub fn purged_scripts(&self) -> Vec<&str> {
        self.purged.iter().map(|a| a.script.as_str()).collect()
    }

    /// Get a summary of the pass.
    pub fn summary(&self) -> String {
        if self.purged.is_empty() {
            return format!("No drift detected ({} scripts checked)", self.candidates);
        }
        format!(
            "Purged {} of {} scripts: {}",
            self.purged.len(),
            self.candidates,
            self.purged_scripts().join(", ")
        )
    }
}

/// Purges ledger rows of modified scripts so they run again.
pub struct DriftReconciler<R, L> {
    resolver: R,
    ledger: L,
    settings: MigrationSettings,
}

impl<R: MigrationResolver, L: Ledger> DriftReconciler<R, L> {
    /// Create a reconciler.
    pub fn new(resolver: R, ledger: L, settings: MigrationSettings) -> Self {
        Self {
            resolver,
            ledger,
            settings,
        }
    }

    /// The ledger.
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// The settings.
    pub fn settings(&self) -> &MigrationSettings {
        &self.settings
    }

    /// Run one reconciliation pass.
    ///
    /// A failed delete aborts the pass with the ledger error; rows already
    /// deleted stay deleted unless the caller's transaction rolls back.
    pub async fn reconcile(&self) -> MigrateResult<ReconcileReport> {
        if !self.settings.republish_on_change {
            debug!("Republishing of modified scripts is disabled");
            return Ok(ReconcileReport::default());
        }

        let mut request = self.settings.info_request();
        request.ignore_patterns = vec![ValidatePattern::IGNORE_ALL];

        let mut service = MigrationInfoService::new(&self.resolver, &self.ledger);
        service.refresh(&request).await?;

        let selection = select_drifted(service.all(), self.settings.one_shot_prefix.as_deref());
        debug!(
            matched = selection.matched,
            candidates = selection.candidates,
            drifted = selection.drifted.len(),
            "Checked ledger for modified scripts"
        );

        let mut report = ReconcileReport {
            matched: selection.matched,
            candidates: selection.candidates,
            purged: Vec::with_capacity(selection.drifted.len()),
            superseded: Vec::with_capacity(selection.superseded.len()),
        };

        for applied in selection.drifted {
            let record = serde_json::to_string(applied)?;
            self.ledger.delete(applied).await?;
            info!(
                script = %applied.script,
                installed_rank = applied.installed_rank,
                record = %record,
                out_of_order = self.settings.out_of_order,
                "Script changed after it was applied; purged its ledger row so it runs again"
            );
            report.purged.push(applied.clone());
        }

        for applied in selection.superseded {
            self.ledger.delete(applied).await?;
            debug!(
                script = %applied.script,
                installed_rank = applied.installed_rank,
                "Purged older ledger row of a modified script"
            );
            report.superseded.push(applied.clone());
        }

        Ok(report)
    }
}

#[async_trait::async_trait]
impl<R: MigrationResolver, L: Ledger> Callback for DriftReconciler<R, L> {
    fn name(&self) -> &str {
        "drift-reconciler"
    }

    fn supports(&self, event: Event) -> bool {
        event == Event::BeforeValidate
    }

    fn can_handle_in_transaction(&self, _event: Event) -> bool {
        true
    }

    async fn handle(&self, _event: Event) -> MigrateResult<()> {
        self.reconcile().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::history::InMemoryLedger;
    use crate::info::MigrationState;
    use crate::kind::MigrationKind;
    use crate::migration::ResolvedMigration;
    use crate::version::MigrationVersion;

    fn v(s: &str) -> Option<MigrationVersion> {
        Some(MigrationVersion::parse(s).unwrap())
    }

    fn resolved(script: &str, checksum: Option<i32>) -> ResolvedMigration {
        ResolvedMigration::new(v("1"), "init", script, checksum, MigrationKind::SQL)
    }

    fn applied(rank: i32, script: &str, checksum: Option<i32>, kind: MigrationKind) -> AppliedMigration {
        AppliedMigration {
            installed_rank: rank,
            version: v("1"),
            description: "init".to_string(),
            kind,
            script: script.to_string(),
            checksum,
            installed_by: "tester".to_string(),
            installed_on: Utc::now(),
            execution_time: 3,
            success: true,
        }
    }

    fn matched(rank: i32, script: &str, applied_sum: Option<i32>, resolved_sum: Option<i32>, kind: MigrationKind) -> MigrationInfo {
        MigrationInfo::new(
            Some(resolved(script, resolved_sum)),
            Some(applied(rank, script, applied_sum, kind)),
            MigrationState::Success,
        )
    }

    fn ranks(selection: &DriftSelection<'_>) -> Vec<i32> {
        selection.drifted.iter().map(|a| a.installed_rank).collect()
    }

    #[test]
    fn test_checksum_drift_selected() {
        let infos = vec![matched(1, "V1__init.sql", Some(111), Some(222), MigrationKind::SQL)];
        let selection = select_drifted(&infos, None);
        assert_eq!(ranks(&selection), vec![1]);
    }

    #[test]
    fn test_matching_checksum_ignored() {
        let infos = vec![matched(1, "V1__init.sql", Some(111), Some(111), MigrationKind::SQL)];
        assert!(select_drifted(&infos, None).drifted.is_empty());
    }

    #[test]
    fn test_null_checksum_is_drift() {
        let infos = vec![
            matched(1, "V1__a.sql", None, Some(1), MigrationKind::SQL),
            matched(2, "V1__b.sql", Some(1), None, MigrationKind::SQL),
            matched(3, "V1__c.sql", None, None, MigrationKind::SQL),
        ];
        assert_eq!(ranks(&select_drifted(&infos, None)), vec![2, 1]);
    }

    #[test]
    fn test_tombstone_exempt() {
        let infos = vec![matched(1, "V1__init.sql", Some(111), Some(222), MigrationKind::DELETE)];
        assert!(select_drifted(&infos, None).drifted.is_empty());
    }

    #[test]
    fn test_one_shot_prefix_exempt() {
        let infos = vec![
            matched(1, "O1__seed.sql", Some(1), Some(2), MigrationKind::SQL),
            matched(2, "V1__init.sql", Some(1), Some(2), MigrationKind::SQL),
        ];
        assert_eq!(ranks(&select_drifted(&infos, Some("O"))), vec![2]);
        assert_eq!(ranks(&select_drifted(&infos, None)), vec![2, 1]);
    }

    #[test]
    fn test_newest_row_per_script_wins() {
        let infos = vec![
            matched(1, "V1__init.sql", Some(111), Some(333), MigrationKind::SQL),
            matched(5, "V1__init.sql", Some(222), Some(333), MigrationKind::SQL),
        ];
        let selection = select_drifted(&infos, None);
        assert_eq!(selection.matched, 2);
        assert_eq!(selection.candidates, 1);
        assert_eq!(ranks(&selection), vec![5]);

        // The newest row matches, so the stale older row is left alone.
        let infos = vec![
            matched(1, "V1__init.sql", Some(111), Some(333), MigrationKind::SQL),
            matched(5, "V1__init.sql", Some(333), Some(333), MigrationKind::SQL),
        ];
        assert!(select_drifted(&infos, None).drifted.is_empty());
    }

    #[test]
    fn test_older_rows_of_drifted_script_superseded() {
        let infos = vec![
            matched(1, "R__views.sql", Some(10), Some(30), MigrationKind::SQL),
            matched(2, "R__views.sql", Some(30), Some(30), MigrationKind::DELETE),
            matched(3, "R__views.sql", Some(20), Some(30), MigrationKind::SQL),
            matched(4, "R__other.sql", Some(30), Some(30), MigrationKind::SQL),
        ];
        let selection = select_drifted(&infos, None);
        assert_eq!(ranks(&selection), vec![3]);
        let superseded: Vec<i32> = selection.superseded.iter().map(|a| a.installed_rank).collect();
        assert_eq!(superseded, vec![1]);
    }

    #[test]
    fn test_newest_tombstone_shields_older_rows() {
        let infos = vec![
            matched(1, "V1__init.sql", Some(111), Some(333), MigrationKind::SQL),
            matched(2, "V1__init.sql", Some(111), Some(333), MigrationKind::DELETE),
        ];
        assert!(select_drifted(&infos, None).drifted.is_empty());
    }

    #[test]
    fn test_structural_mismatch_skipped() {
        let renamed = MigrationInfo::new(
            Some(resolved("V1__renamed.sql", Some(2))),
            Some(applied(1, "V1__original.sql", Some(1), MigrationKind::SQL)),
            MigrationState::Success,
        );
        let pending = MigrationInfo::new(Some(resolved("V1__new.sql", Some(2))), None, MigrationState::Pending);
        let missing = MigrationInfo::new(
            None,
            Some(applied(2, "V1__gone.sql", Some(1), MigrationKind::SQL)),
            MigrationState::Missing,
        );

        let infos = vec![renamed, pending, missing];
        let selection = select_drifted(&infos, None);
        assert_eq!(selection.matched, 0);
        assert!(selection.drifted.is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_purges_and_is_idempotent() {
        let ledger = InMemoryLedger::with_rows([applied(1, "V1__a.sql", Some(100), MigrationKind::SQL)]);
        let reconciler = DriftReconciler::new(
            vec![resolved("V1__a.sql", Some(200))],
            ledger.clone(),
            MigrationSettings::default(),
        );

        let first = reconciler.reconcile().await.unwrap();
        assert_eq!(first.purged_scripts(), vec!["V1__a.sql"]);
        assert!(ledger.is_empty());
        assert!(first.summary().contains("Purged 1 of 1"));

        let second = reconciler.reconcile().await.unwrap();
        assert!(second.is_empty());
        assert_eq!(second.summary(), "No drift detected (0 scripts checked)");
    }

    #[tokio::test]
    async fn test_reconcile_settles_script_with_history() {
        let ledger = InMemoryLedger::with_rows([
            applied(1, "R__v.sql", Some(10), MigrationKind::SQL),
            applied(2, "R__v.sql", Some(20), MigrationKind::SQL),
        ]);
        let reconciler = DriftReconciler::new(
            vec![resolved("R__v.sql", Some(30))],
            ledger.clone(),
            MigrationSettings::default(),
        );

        let first = reconciler.reconcile().await.unwrap();
        let purged: Vec<i32> = first.purged.iter().map(|a| a.installed_rank).collect();
        let superseded: Vec<i32> = first.superseded.iter().map(|a| a.installed_rank).collect();
        assert_eq!(purged, vec![2]);
        assert_eq!(superseded, vec![1]);
        assert!(ledger.is_empty());

        let second = reconciler.reconcile().await.unwrap();
        assert!(second.is_empty());
        assert!(second.superseded.is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_disabled() {
        let ledger = InMemoryLedger::with_rows([applied(1, "V1__a.sql", Some(100), MigrationKind::SQL)]);
        let settings = MigrationSettings {
            republish_on_change: false,
            ..Default::default()
        };
        let reconciler = DriftReconciler::new(vec![resolved("V1__a.sql", Some(200))], ledger.clone(), settings);

        assert!(reconciler.reconcile().await.unwrap().is_empty());
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_callback_contract() {
        let reconciler = DriftReconciler::new(
            Vec::<ResolvedMigration>::new(),
            InMemoryLedger::new(),
            MigrationSettings::default(),
        );
        assert!(reconciler.supports(Event::BeforeValidate));
        assert!(!reconciler.supports(Event::BeforeMigrate));
        assert!(!reconciler.supports(Event::AfterValidate));
        assert!(reconciler.can_handle_in_transaction(Event::BeforeValidate));
    }
}
