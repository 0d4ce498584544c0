//! Migration versions.
//!
//! A version is a dotted sequence of parts (`1`, `1.2`, `2024.01.15.1`).
//! Underscores are accepted as separators so that a version taken straight from
//! a script name (`V1_2__add_index.sql`) parses the same as `1.2`.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::{MigrateResult, MigrationError};

/// One component of a version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Part {
    /// Decimal digits without leading zeros (`"0"` for zero).
    Numeric(String),
    Text(String),
}

impl Part {
    fn parse(raw: &str) -> Self {
        if raw.bytes().all(|b| b.is_ascii_digit()) {
            let trimmed = raw.trim_start_matches('0');
            Part::Numeric(if trimmed.is_empty() { "0" } else { trimmed }.to_string())
        } else {
            Part::Text(raw.to_string())
        }
    }

    fn is_zero(&self) -> bool {
        matches!(self, Part::Numeric(digits) if digits == "0")
    }

    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            // Digits are normalized, so a longer string is a larger number.
            (Part::Numeric(a), Part::Numeric(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
            (Part::Text(a), Part::Text(b)) => a.cmp(b),
            (Part::Numeric(_), Part::Text(_)) => Ordering::Less,
            (Part::Text(_), Part::Numeric(_)) => Ordering::Greater,
        }
    }
}

/// A comparable migration version.
///
/// Missing trailing parts count as zero, so `1`, `1.0` and `1.0.0` are equal
/// and hash identically.
#[derive(Debug, Clone)]
pub struct MigrationVersion {
    raw: String,
    parts: Vec<Part>,
}

impl MigrationVersion {
    /// Parse a version string.
    pub fn parse(version: &str) -> MigrateResult<Self> {
        let raw = version.trim();
        if raw.is_empty() {
            return Err(MigrationError::invalid_version("version must not be empty"));
        }

        let normalized = raw.replace('_', ".");
        let mut parts = Vec::new();
        for segment in normalized.split('.') {
            if segment.is_empty() {
                return Err(MigrationError::invalid_version(format!(
                    "empty component in '{raw}'"
                )));
            }
            if segment.chars().any(char::is_whitespace) {
                return Err(MigrationError::invalid_version(format!(
                    "whitespace in '{raw}'"
                )));
            }
            parts.push(Part::parse(segment));
        }

        Ok(Self {
            raw: raw.to_string(),
            parts,
        })
    }

    /// The version as originally written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Parts with trailing zeros removed.
    fn significant(&self) -> &[Part] {
        let len = self
            .parts
            .iter()
            .rposition(|p| !p.is_zero())
            .map_or(0, |i| i + 1);
        &self.parts[..len]
    }
}

impl Ord for MigrationVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let zero = Part::Numeric("0".to_string());
        let len = self.parts.len().max(other.parts.len());
        (0..len)
            .map(|i| {
                let a = self.parts.get(i).unwrap_or(&zero);
                let b = other.parts.get(i).unwrap_or(&zero);
                a.compare(b)
            })
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for MigrationVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for MigrationVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MigrationVersion {}

impl Hash for MigrationVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.significant().hash(state);
    }
}

impl FromStr for MigrationVersion {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for MigrationVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for MigrationVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}
