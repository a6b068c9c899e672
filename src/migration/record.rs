//! `MigrationRecord` - one row of the history table

use crate::executor::ShiftError;
use chrono::{DateTime, Utc};

/// A migration that has been applied to the target database
///
/// Matches the history table: `migration_name`, `applied_at`, `down_script`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRecord {
    /// Primary key, equal to the declared migration's name
    pub name: String,

    /// When the migration was applied
    pub applied_at: DateTime<Utc>,

    /// Reversal script captured at apply time; never updated afterwards
    pub down_script: String,
}

impl MigrationRecord {
    #[must_use]
    pub fn new(name: impl Into<String>, applied_at: DateTime<Utc>, down_script: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            applied_at,
            down_script: down_script.into(),
        }
    }

    /// Create a `MigrationRecord` from a database row
    ///
    /// Expected column order: `migration_name`, `applied_at`, `down_script`
    ///
    /// # Errors
    ///
    /// Returns `ShiftError::ParseError` if a column is missing or has an unexpected type.
    pub fn from_row(row: &may_postgres::Row) -> Result<Self, ShiftError> {
        let name: String = row
            .try_get(0)
            .map_err(|e| ShiftError::ParseError(format!("migration_name: {e}")))?;
        let applied_at: DateTime<Utc> = row
            .try_get(1)
            .map_err(|e| ShiftError::ParseError(format!("applied_at: {e}")))?;
        let down_script: String = row
            .try_get(2)
            .map_err(|e| ShiftError::ParseError(format!("down_script: {e}")))?;

        Ok(Self {
            name,
            applied_at,
            down_script,
        })
    }
}
