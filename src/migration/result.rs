//! What a run did, one entry per action

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationStatus {
    Applied,
    Reverted,
}

impl fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MigrationStatus::Applied => "applied",
            MigrationStatus::Reverted => "reverted",
        })
    }
}

/// One apply or revert action, in the order it was executed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationResult {
    #[serde(rename = "migrationName")]
    pub name: String,
    pub status: MigrationStatus,
}

impl MigrationResult {
    pub fn applied(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: MigrationStatus::Applied,
        }
    }

    pub fn reverted(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: MigrationStatus::Reverted,
        }
    }
}

impl fmt::Display for MigrationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_string(&MigrationResult::reverted("3_c")).unwrap();
        assert_eq!(json, r#"{"migrationName":"3_c","status":"reverted"}"#);
    }

    #[test]
    fn test_display() {
        assert_eq!(MigrationResult::applied("1_a").to_string(), "applied 1_a");
    }
}
