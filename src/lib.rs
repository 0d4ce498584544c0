//! # Stratum
//!
//! Migration state reconciliation for schema-versioned databases.
//!
//! Stratum provides:
//! - A typed registry of migration kinds with lossless ledger round-trips
//! - Canonical ordering of discovered migrations
//! - Ledger self-healing: rows of scripts edited after they ran are purged
//!   so the scripts run again
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stratum::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), stratum::MigrationError> {
//!     let config = StratumConfig::load("stratum.toml").await?;
//!     let migrations = vec![ResolvedMigration::new(
//!         Some("1".parse()?),
//!         "init",
//!         "V1__init.sql",
//!         Some(stratum::migrate::checksum::calculate("CREATE TABLE t (id INT);")),
//!         MigrationKind::SQL,
//!     )];
//!
//!     let reconciler = DriftReconciler::new(migrations, InMemoryLedger::new(), config.migrations);
//!     let report = reconciler.reconcile().await?;
//!     println!("{}", report.summary());
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Migration kinds, ordering, ledger pairing and drift reconciliation.
pub mod migrate {
    pub use stratum_migrate::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::migrate::{
        Callback, CallbackExecutor, DriftReconciler, Event, InMemoryLedger, Ledger,
        MigrationInfoService, MigrationKind, MigrationKindRegistry, MigrationResolver,
        MigrationVersion, ResolvedMigration, StratumConfig,
    };
}

// Re-export key types at the crate root
pub use migrate::{MigrateResult, MigrationError};
