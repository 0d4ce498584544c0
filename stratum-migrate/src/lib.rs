//! # stratum-migrate
//!
//! Migration state reconciliation for Stratum.
//!
//! This crate provides:
//! - A closed registry of migration kinds, extensible through statically
//!   registered providers, with lossless name round-trips
//! - Version parsing and the canonical ordering of discovered migrations
//! - Pairing of discovered migrations with ledger rows, state derivation
//!   and validation
//! - **Drift reconciliation**: ledger rows of scripts edited after they ran
//!   are purged before validation so the scripts run again
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌────────────────┐
//! │ Resolver     │────▶│                │     ┌──────────────────┐
//! └──────────────┘     │  Info Service  │────▶│ Drift Reconciler │
//! ┌──────────────┐     │  (pairing)     │     └──────────────────┘
//! │ Ledger       │────▶│                │              │
//! └──────────────┘     └────────────────┘              ▼
//!        ▲                                      ┌─────────────┐
//!        └──────────────────────────────────────│ delete rows │
//!                                               └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use stratum_migrate::{
//!     CallbackExecutor, DriftReconciler, Event, InMemoryLedger, StratumConfig,
//! };
//!
//! async fn before_validate(resolver: MyResolver) -> Result<(), Box<dyn std::error::Error>> {
//!     let config = StratumConfig::load("stratum.toml").await?;
//!     let ledger = InMemoryLedger::new();
//!
//!     let mut callbacks = CallbackExecutor::new();
//!     callbacks.register(DriftReconciler::new(resolver, ledger, config.migrations));
//!     callbacks.fire(Event::BeforeValidate).await?;
//!     Ok(())
//! }
//! ```

pub mod callback;
pub mod checksum;
pub mod config;
pub mod error;
pub mod history;
pub mod info;
pub mod kind;
pub mod logging;
pub mod migration;
pub mod ordering;
pub mod pattern;
pub mod reconcile;
pub mod resolver;
pub mod version;

// Re-exports
pub use callback::{Callback, CallbackExecutor, Event};
pub use config::{
    EnvironmentOverride, LoggingConfig, MigrationOverride, MigrationSettings, StratumConfig,
};
pub use error::{MigrateResult, MigrationError};
pub use history::{InMemoryLedger, Ledger};
pub use info::{
    InfoRequest, MigrationInfo, MigrationInfoService, MigrationState, TargetVersion,
    ValidationError, ValidationErrorKind,
};
pub use kind::{
    CoreMigrationKind, ExternalKind, KindFacets, MigrationKind, MigrationKindProvider,
    MigrationKindRegistry, StaticKindProvider,
};
pub use migration::{AppliedMigration, LedgerRow, MigrationExecutor, ResolvedMigration};
pub use ordering::{OrderingKey, compare_resolved, sort_resolved};
pub use pattern::{PatternState, PatternType, ValidatePattern};
pub use reconcile::{DriftReconciler, DriftSelection, ReconcileReport, select_drifted};
pub use resolver::{CompositeResolver, MigrationResolver};
pub use version::MigrationVersion;
