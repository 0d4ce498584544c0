//! Error types for the reconciliation engine.

use thiserror::Error;

/// Result type alias for migration operations.
pub type MigrateResult<T> = Result<T, MigrationError>;

/// Errors that can occur while reconciling migration state.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// A kind value that is not a member of any registered kind set.
    #[error(
        "migration kind '{name}' from provider '{provider}' is not a member of any registered kind set"
    )]
    KindNotEnumerated {
        /// Name carried by the offending kind.
        name: String,
        /// Provider the kind claims to belong to.
        provider: String,
    },

    /// A persisted kind name that matches no registered kind.
    #[error("migration kind '{name}' matches no registered kind (consulted: {})", consulted.join(", "))]
    UnknownKind {
        /// The persisted name that failed to resolve.
        name: String,
        /// Every kind set consulted, in lookup order.
        consulted: Vec<String>,
    },

    /// Malformed version string.
    #[error("invalid migration version: {0}")]
    InvalidVersion(String),

    /// Two discovered migrations share the same version and script.
    #[error("found more than one migration for script '{script}' (version {version})")]
    DuplicateMigration {
        /// Script path shared by both migrations.
        script: String,
        /// Version shared by both migrations, or `<none>`.
        version: String,
    },

    /// Ledger storage error.
    #[error("Ledger error: {0}")]
    Ledger(String),

    /// Migration discovery error.
    #[error("Resolver error: {0}")]
    Resolver(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid validate pattern.
    #[error("Invalid validate pattern: {0}")]
    InvalidPattern(String),

    /// File system error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrationError {
    /// Create a ledger error.
    pub fn ledger(msg: impl Into<String>) -> Self {
        Self::Ledger(msg.into())
    }

    /// Create a resolver error.
    pub fn resolver(msg: impl Into<String>) -> Self {
        Self::Resolver(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid version error.
    pub fn invalid_version(msg: impl Into<String>) -> Self {
        Self::InvalidVersion(msg.into())
    }

    /// Create an invalid pattern error.
    pub fn invalid_pattern(msg: impl Into<String>) -> Self {
        Self::InvalidPattern(msg.into())
    }

    /// Whether this error signals a broken kind registration.
    pub fn is_type_integrity(&self) -> bool {
        matches!(self, Self::KindNotEnumerated { .. } | Self::UnknownKind { .. })
    }

    /// Check if this is a recoverable error.
    ///
    /// Ledger errors are fatal: a failed purge fails the enclosing lifecycle
    /// event. Only I/O while reading configuration is worth another attempt.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}
