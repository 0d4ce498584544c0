//! Validate patterns (`type:state`) that silence validation errors.
//!
//! ```text
//! *:missing          ignore every missing migration
//! repeatable:*       ignore every problem with a repeatable migration
//! versioned:ignored  ignore skipped versioned migrations
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{MigrateResult, MigrationError};
use crate::info::{MigrationInfo, MigrationState};

/// Which migrations a pattern covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternType {
    /// Every migration.
    Any,
    /// Migrations with a version.
    Versioned,
    /// Migrations without a version.
    Repeatable,
}

/// Which states a pattern covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternState {
    /// Every state.
    Any,
    /// Applied but no longer discovered.
    Missing,
    /// Not yet applied.
    Pending,
    /// Skipped.
    Ignored,
    /// Applied with a version newer than anything discovered.
    Future,
    /// Applied but failed.
    Failed,
}

impl PatternState {
    fn covers(self, state: MigrationState) -> bool {
        match self {
            Self::Any => true,
            Self::Missing => state == MigrationState::Missing,
            Self::Pending => state.is_pending(),
            Self::Ignored => state == MigrationState::Ignored,
            Self::Future => state == MigrationState::Future,
            Self::Failed => state == MigrationState::Failed,
        }
    }
}

/// A parsed `type:state` pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValidatePattern {
    migration_type: PatternType,
    state: PatternState,
}

impl ValidatePattern {
    /// Pattern matching everything (`*:*`).
    pub const IGNORE_ALL: Self = Self {
        migration_type: PatternType::Any,
        state: PatternState::Any,
    };

    /// Create a pattern.
    pub fn new(migration_type: PatternType, state: PatternState) -> Self {
        Self {
            migration_type,
            state,
        }
    }

    /// Parse a pattern.
    pub fn parse(pattern: &str) -> MigrateResult<Self> {
        let (ty, state) = pattern.trim().split_once(':').ok_or_else(|| {
            MigrationError::invalid_pattern(format!(
                "'{pattern}' must be of the form type:state"
            ))
        })?;

        let migration_type = match ty.trim().to_ascii_lowercase().as_str() {
            "*" => PatternType::Any,
            "versioned" => PatternType::Versioned,
            "repeatable" => PatternType::Repeatable,
            other => {
                return Err(MigrationError::invalid_pattern(format!(
                    "unknown migration type '{other}' in '{pattern}' (expected *, versioned or repeatable)"
                )));
            }
        };

        let state = match state.trim().to_ascii_lowercase().as_str() {
            "*" => PatternState::Any,
            "missing" => PatternState::Missing,
            "pending" => PatternState::Pending,
            "ignored" => PatternState::Ignored,
            "future" => PatternState::Future,
            "failed" => PatternState::Failed,
            other => {
                return Err(MigrationError::invalid_pattern(format!(
                    "unknown state '{other}' in '{pattern}'"
                )));
            }
        };

        Ok(Self::new(migration_type, state))
    }

    /// Whether this pattern covers a migration.
    pub fn matches(&self, info: &MigrationInfo) -> bool {
        let type_matches = match self.migration_type {
            PatternType::Any => true,
            PatternType::Versioned => info.version().is_some(),
            PatternType::Repeatable => info.version().is_none(),
        };
        type_matches && self.state.covers(info.state())
    }

    /// Whether any of the patterns covers a migration.
    pub fn any_matches(patterns: &[Self], info: &MigrationInfo) -> bool {
        patterns.iter().any(|p| p.matches(info))
    }
}

impl fmt::Display for ValidatePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ty = match self.migration_type {
            PatternType::Any => "*",
            PatternType::Versioned => "versioned",
            PatternType::Repeatable => "repeatable",
        };
        let state = match self.state {
            PatternState::Any => "*",
            PatternState::Missing => "missing",
            PatternState::Pending => "pending",
            PatternState::Ignored => "ignored",
            PatternState::Future => "future",
            PatternState::Failed => "failed",
        };
        write!(f, "{ty}:{state}")
    }
}

impl FromStr for ValidatePattern {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ValidatePattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ValidatePattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(ValidatePattern::parse("*:*").unwrap(), ValidatePattern::IGNORE_ALL);
        assert_eq!(
            ValidatePattern::parse("Repeatable:Missing").unwrap(),
            ValidatePattern::new(PatternType::Repeatable, PatternState::Missing)
        );
        assert_eq!(
            ValidatePattern::parse(" versioned : future ").unwrap().to_string(),
            "versioned:future"
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(ValidatePattern::parse("missing").is_err());
        assert!(ValidatePattern::parse("baseline:*").is_err());
        assert!(ValidatePattern::parse("*:outdated").is_err());
    }

    #[test]
    fn test_state_coverage() {
        assert!(PatternState::Pending.covers(MigrationState::OutOfOrder));
        assert!(PatternState::Pending.covers(MigrationState::Pending));
        assert!(!PatternState::Missing.covers(MigrationState::Future));
        assert!(PatternState::Any.covers(MigrationState::Success));
    }
}
