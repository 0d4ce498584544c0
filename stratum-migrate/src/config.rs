//! Configuration file parsing for `stratum.toml`.
//!
//! ```toml
//! [migrations]
//! target = "latest"
//! out_of_order = true
//! ignore_migration_patterns = ["*:missing"]
//! one_shot_prefix = "O"
//!
//! [logging]
//! level = "info"
//! format = "compact"
//!
//! [environments.ci.migrations]
//! republish_on_change = false
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{MigrateResult, MigrationError};
use crate::info::{InfoRequest, TargetVersion};
use crate::pattern::ValidatePattern;

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "stratum.toml";

/// Main configuration structure for `stratum.toml`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StratumConfig {
    /// Migration settings.
    #[serde(default)]
    pub migrations: MigrationSettings,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Environment-specific overrides.
    #[serde(default)]
    pub environments: HashMap<String, EnvironmentOverride>,
}

impl StratumConfig {
    /// Load configuration from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> MigrateResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            MigrationError::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        content.parse()
    }

    /// Load configuration, falling back to defaults when the file is absent.
    pub async fn load(path: impl AsRef<Path>) -> MigrateResult<Self> {
        let path = path.as_ref();
        if !tokio::fs::try_exists(path).await? {
            return Ok(Self::default());
        }
        let content = tokio::fs::read_to_string(path).await?;
        content.parse()
    }

    /// Apply environment-specific overrides.
    pub fn with_environment(mut self, env: &str) -> MigrateResult<Self> {
        let Some(overrides) = self.environments.remove(env) else {
            return Err(MigrationError::config(format!("unknown environment '{env}'")));
        };

        if let Some(m) = overrides.migrations {
            let settings = &mut self.migrations;
            if let Some(target) = m.target {
                settings.target = target;
            }
            if let Some(out_of_order) = m.out_of_order {
                settings.out_of_order = out_of_order;
            }
            if let Some(cherry_pick) = m.cherry_pick {
                settings.cherry_pick = cherry_pick;
            }
            if let Some(patterns) = m.ignore_migration_patterns {
                settings.ignore_migration_patterns = patterns;
            }
            if let Some(republish) = m.republish_on_change {
                settings.republish_on_change = republish;
            }
            if let Some(prefix) = m.one_shot_prefix {
                settings.one_shot_prefix = Some(prefix);
            }
        }

        if let Some(logging) = overrides.logging {
            if logging.level.is_some() {
                self.logging.level = logging.level;
            }
            if logging.format.is_some() {
                self.logging.format = logging.format;
            }
        }

        self.migrations.validate()?;
        Ok(self)
    }
}

impl FromStr for StratumConfig {
    type Err = MigrationError;

    fn from_str(content: &str) -> Result<Self, Self::Err> {
        let expanded = expand_env_vars(content);
        let config: Self = toml::from_str(&expanded)?;
        config.migrations.validate()?;
        Ok(config)
    }
}

/// Migration settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MigrationSettings {
    /// Target version (`latest`, `current` or a version).
    #[serde(default)]
    pub target: TargetVersion,

    /// Allow pending migrations older than the newest applied one to run.
    #[serde(default)]
    pub out_of_order: bool,

    /// Only these versions or scripts are considered pending.
    #[serde(default)]
    pub cherry_pick: Vec<String>,

    /// Patterns silencing validation errors.
    #[serde(default)]
    pub ignore_migration_patterns: Vec<ValidatePattern>,

    /// Purge ledger rows of modified scripts so they run again.
    #[serde(default = "default_true")]
    pub republish_on_change: bool,

    /// Scripts with this prefix are never purged.
    #[serde(default)]
    pub one_shot_prefix: Option<String>,
}

impl Default for MigrationSettings {
    fn default() -> Self {
        Self {
            target: TargetVersion::Latest,
            out_of_order: false,
            cherry_pick: Vec::new(),
            ignore_migration_patterns: Vec::new(),
            republish_on_change: true,
            one_shot_prefix: None,
        }
    }
}

impl MigrationSettings {
    /// Build the info request these settings describe.
    pub fn info_request(&self) -> InfoRequest {
        InfoRequest {
            target: self.target.clone(),
            out_of_order: self.out_of_order,
            ignore_patterns: self.ignore_migration_patterns.clone(),
            cherry_pick: self.cherry_pick.clone(),
        }
    }

    /// Check settings that serde cannot.
    pub fn validate(&self) -> MigrateResult<()> {
        if self.one_shot_prefix.as_deref().is_some_and(str::is_empty) {
            return Err(MigrationError::config(
                "migrations.one_shot_prefix must not be empty; omit it instead",
            ));
        }
        Ok(())
    }
}

/// Logging settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default)]
    pub level: Option<String>,

    /// Output format (json, pretty, compact).
    #[serde(default)]
    pub format: Option<String>,
}

/// Environment-specific overrides.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentOverride {
    /// Migration overrides.
    pub migrations: Option<MigrationOverride>,

    /// Logging overrides.
    pub logging: Option<LoggingConfig>,
}

/// Overridable migration settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MigrationOverride {
    /// Target version.
    pub target: Option<TargetVersion>,
    /// Out-of-order flag.
    pub out_of_order: Option<bool>,
    /// Cherry-picked versions or scripts.
    pub cherry_pick: Option<Vec<String>>,
    /// Validate patterns.
    pub ignore_migration_patterns: Option<Vec<ValidatePattern>>,
    /// Purge flag.
    pub republish_on_change: Option<bool>,
    /// One-shot prefix.
    pub one_shot_prefix: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Replace `${VAR}` with the variable's value; unknown variables are left as-is.
fn expand_env_vars(content: &str) -> String {
    let Ok(re) = regex_lite::Regex::new(r"\$\{([^}]+)\}") else {
        return content.to_string();
    };

    re.replace_all(content, |caps: &regex_lite::Captures<'_>| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}
