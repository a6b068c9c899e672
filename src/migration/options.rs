//! Reconciliation policy and per-migrator settings

use crate::migration::QualifiedTable;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Which side wins when Source and History disagree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// History is authoritative: only ever apply the missing suffix of Source
    Db,
    /// Source is authoritative: revert back to the fork point, then apply
    #[default]
    Fs,
}

#[derive(Debug, Error)]
#[error("unknown priority \"{0}\", expected \"db\" or \"fs\"")]
pub struct ParsePriorityError(String);

impl FromStr for Priority {
    type Err = ParsePriorityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "db" => Ok(Priority::Db),
            "fs" => Ok(Priority::Fs),
            _ => Err(ParsePriorityError(s.to_string())),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Priority::Db => "db",
            Priority::Fs => "fs",
        })
    }
}

/// Settings shared by every run of a [`Migrator`](crate::migration::Migrator)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigratorOptions {
    pub table: QualifiedTable,
    pub priority: Priority,
    /// `None` waits for the history lock indefinitely
    pub lock_timeout: Option<Duration>,
    /// Reject History entries past the end of Source under `Priority::Db`
    pub strict_history: bool,
}

impl MigratorOptions {
    pub fn new(table: QualifiedTable) -> Self {
        Self {
            table,
            priority: Priority::default(),
            lock_timeout: None,
            strict_history: false,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn with_strict_history(mut self, strict: bool) -> Self {
        self.strict_history = strict;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_parsing() {
        assert_eq!("db".parse::<Priority>().unwrap(), Priority::Db);
        assert_eq!("FS".parse::<Priority>().unwrap(), Priority::Fs);
        assert!("both".parse::<Priority>().is_err());
        assert_eq!(Priority::default(), Priority::Fs);
    }

    #[test]
    fn test_builder() {
        let table = QualifiedTable::parse("public", "migrations").unwrap();
        let options = MigratorOptions::new(table)
            .with_priority(Priority::Db)
            .with_lock_timeout(Some(Duration::from_secs(5)))
            .with_strict_history(true);

        assert_eq!(options.priority, Priority::Db);
        assert_eq!(options.lock_timeout, Some(Duration::from_secs(5)));
        assert!(options.strict_history);
    }
}
