//! Migration-specific error types

use crate::executor::ShiftError;
use crate::transaction::TransactionError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Which script of a migration was running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Up => "up",
            Direction::Down => "down",
        })
    }
}

/// Migration-specific errors
///
/// Every failure of a run surfaces as one of these, unmodified, after the
/// run's transaction has been rolled back.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Missing migrations directory, script file, stored down script, or nothing to revert
    #[error("{0}")]
    NotFound(String),

    /// A migration file name or label uses characters outside the allow-list
    #[error("invalid migration name \"{name}\": {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// Up/down files cannot be paired, or declared names are not strictly ascending
    #[error("malformed migrations: {0}")]
    Malformed(String),

    /// Append of a name that history already holds
    #[error("migration \"{0}\" is already recorded in history")]
    Conflict(String),

    /// History diverges from source and the policy forbids reverting
    #[error(
        "history and source diverge at position {index}: history has \"{recorded}\" but source declares {}",
        describe_declared(.declared)
    )]
    Inconsistent {
        index: usize,
        recorded: String,
        declared: Option<String>,
    },

    /// An up or down script failed to execute
    #[error("{direction} script of migration \"{name}\" failed: {source}")]
    ScriptExecutionFailed {
        name: String,
        direction: Direction,
        #[source]
        source: ShiftError,
    },

    /// Connectivity, lock acquisition, history I/O or commit failure
    #[error("{context}: {source}")]
    StorageUnavailable {
        context: String,
        #[source]
        source: ShiftError,
    },

    /// The caller cancelled the run or its deadline passed
    #[error("run aborted: {0}")]
    Cancelled(String),

    /// Configuration rejected before any statement was built
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Filesystem error other than a missing path
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A run failed and rolling its transaction back failed as well
    #[error("{primary}; rolling back also failed: {rollback}")]
    RollbackFailed {
        #[source]
        primary: Box<MigrationError>,
        rollback: TransactionError,
    },
}

fn describe_declared(declared: &Option<String>) -> String {
    match declared {
        Some(name) => format!("\"{name}\""),
        None => "nothing at that position".to_string(),
    }
}

impl MigrationError {
    /// Adapter for `map_err` on history/storage calls
    pub(crate) fn storage(context: impl Into<String>) -> impl FnOnce(ShiftError) -> Self {
        let context = context.into();
        move |source| MigrationError::StorageUnavailable { context, source }
    }

    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                MigrationError::NotFound(format!("{} does not exist", path.display()))
            } else {
                MigrationError::Io { path, source }
            }
        }
    }

    /// The failure that triggered the run's abort
    ///
    /// For [`MigrationError::RollbackFailed`] this is the wrapped original
    /// error; for every other variant it is `self`.
    pub fn primary(&self) -> &MigrationError {
        match self {
            MigrationError::RollbackFailed { primary, .. } => primary.primary(),
            other => other,
        }
    }

    /// The cleanup failure, if rolling back failed too
    pub fn rollback_error(&self) -> Option<&TransactionError> {
        match self {
            MigrationError::RollbackFailed { rollback, .. } => Some(rollback),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inconsistent_names_both_sides() {
        let err = MigrationError::Inconsistent {
            index: 1,
            recorded: "2_b".to_string(),
            declared: Some("2_c".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "history and source diverge at position 1: history has \"2_b\" but source declares \"2_c\""
        );
    }

    #[test]
    fn test_inconsistent_without_declared() {
        let err = MigrationError::Inconsistent {
            index: 2,
            recorded: "3_c".to_string(),
            declared: None,
        };
        assert!(err.to_string().ends_with("source declares nothing at that position"));
    }

    #[test]
    fn test_script_failure_mentions_direction() {
        let err = MigrationError::ScriptExecutionFailed {
            name: "1_init".to_string(),
            direction: Direction::Down,
            source: ShiftError::QueryError("syntax error".to_string()),
        };
        assert!(err.to_string().starts_with("down script of migration \"1_init\" failed"));
    }

    #[test]
    fn test_rollback_failure_keeps_both_errors() {
        let err = MigrationError::RollbackFailed {
            primary: Box::new(MigrationError::Conflict("1_init".to_string())),
            rollback: TransactionError::Other("connection reset".to_string()),
        };

        assert!(matches!(err.primary(), MigrationError::Conflict(name) if name == "1_init"));
        assert!(err.rollback_error().unwrap().to_string().contains("connection reset"));
        let text = err.to_string();
        assert!(text.contains("already recorded"));
        assert!(text.contains("connection reset"));
    }

    #[test]
    fn test_primary_of_plain_error_is_itself() {
        let err = MigrationError::Malformed("x".to_string());
        assert!(matches!(err.primary(), MigrationError::Malformed(_)));
        assert!(err.rollback_error().is_none());
    }

    #[test]
    fn test_io_adapter_maps_missing_path_to_not_found() {
        let missing = std::io::Error::from(std::io::ErrorKind::NotFound);
        let err = MigrationError::io("/no/such/dir")(missing);
        assert!(matches!(err, MigrationError::NotFound(msg) if msg.contains("/no/such/dir")));

        let denied = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        assert!(matches!(
            MigrationError::io("/root")(denied),
            MigrationError::Io { .. }
        ));
    }
}
