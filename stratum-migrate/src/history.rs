//! The migration ledger.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{MigrateResult, MigrationError};
use crate::migration::AppliedMigration;

/// Durable record of every migration applied to a schema.
///
/// Deletes must happen inside the caller's transaction; an implementation that
/// cannot remove a row must return an error rather than skip it.
#[async_trait::async_trait]
pub trait Ledger: Send + Sync {
    /// Every row, ordered by installed rank.
    async fn all_applied(&self) -> MigrateResult<Vec<AppliedMigration>>;

    /// Remove a row.
    async fn delete(&self, applied: &AppliedMigration) -> MigrateResult<()>;

    /// Append a row.
    async fn append(&self, applied: AppliedMigration) -> MigrateResult<()>;
}

#[async_trait::async_trait]
impl<L: Ledger + ?Sized> Ledger for Arc<L> {
    async fn all_applied(&self) -> MigrateResult<Vec<AppliedMigration>> {
        (**self).all_applied().await
    }

    async fn delete(&self, applied: &AppliedMigration) -> MigrateResult<()> {
        (**self).delete(applied).await
    }

    async fn append(&self, applied: AppliedMigration) -> MigrateResult<()> {
        (**self).append(applied).await
    }
}

/// A ledger held in memory. Clones share the same rows.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    rows: Arc<Mutex<Vec<AppliedMigration>>>,
}

impl InMemoryLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a ledger holding the given rows.
    pub fn with_rows(rows: impl IntoIterator<Item = AppliedMigration>) -> Self {
        let mut rows: Vec<_> = rows.into_iter().collect();
        rows.sort_by_key(|r| r.installed_rank);
        Self {
            rows: Arc::new(Mutex::new(rows)),
        }
    }

    /// Rank the next appended row should carry.
    pub fn next_installed_rank(&self) -> i32 {
        self.rows
            .lock()
            .iter()
            .map(|r| r.installed_rank)
            .max()
            .map_or(1, |rank| rank + 1)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    /// Whether the ledger has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.lock().is_empty()
    }
}

#[async_trait::async_trait]
impl Ledger for InMemoryLedger {
    async fn all_applied(&self) -> MigrateResult<Vec<AppliedMigration>> {
        Ok(self.rows.lock().clone())
    }

    async fn delete(&self, applied: &AppliedMigration) -> MigrateResult<()> {
        let mut rows = self.rows.lock();
        let before = rows.len();
        rows.retain(|r| r.installed_rank != applied.installed_rank);
        if rows.len() == before {
            return Err(MigrationError::ledger(format!(
                "no row with installed rank {} for script '{}'",
                applied.installed_rank, applied.script
            )));
        }
        Ok(())
    }

    async fn append(&self, applied: AppliedMigration) -> MigrateResult<()> {
        let mut rows = self.rows.lock();
        if rows.iter().any(|r| r.installed_rank == applied.installed_rank) {
            return Err(MigrationError::ledger(format!(
                "installed rank {} is already taken",
                applied.installed_rank
            )));
        }
        rows.push(applied);
        rows.sort_by_key(|r| r.installed_rank);
        Ok(())
    }
}
