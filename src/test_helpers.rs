//! In-memory stand-ins for the database used by unit tests

use crate::executor::{ScriptRunner, ShiftError};
use crate::migration::{EmbeddedSource, MigrationError, MigrationHistory, MigrationRecord};
use chrono::Utc;
use std::cell::RefCell;
use std::time::Duration;

/// History and script runner backed by plain vectors
///
/// Scripts are not interpreted; they are only logged in execution order.
#[derive(Default)]
pub struct MemoryLedger {
    pub records: RefCell<Vec<MigrationRecord>>,
    pub executed: RefCell<Vec<String>>,
    pub failing_script: Option<String>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `(name, down_script)` entries already recorded
    pub fn with_history(entries: &[(&str, &str)]) -> Self {
        let ledger = Self::new();
        for (name, down) in entries {
            ledger
                .records
                .borrow_mut()
                .push(MigrationRecord::new(*name, Utc::now(), *down));
        }
        ledger
    }

    /// Make `run_script` fail for exactly this script text
    pub fn with_failing_script(mut self, script: &str) -> Self {
        self.failing_script = Some(script.to_string());
        self
    }

    /// Recorded names in insertion order
    pub fn names(&self) -> Vec<String> {
        self.records.borrow().iter().map(|r| r.name.clone()).collect()
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.borrow().clone()
    }
}

impl MigrationHistory for MemoryLedger {
    fn ensure(&self) -> Result<(), MigrationError> {
        Ok(())
    }

    fn lock(&self, _timeout: Option<Duration>) -> Result<(), MigrationError> {
        Ok(())
    }

    fn list(&self) -> Result<Vec<MigrationRecord>, MigrationError> {
        let mut records = self.records.borrow().clone();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }

    fn append(&self, name: &str, down_script: &str) -> Result<(), MigrationError> {
        let mut records = self.records.borrow_mut();
        if records.iter().any(|r| r.name == name) {
            return Err(MigrationError::Conflict(name.to_string()));
        }
        records.push(MigrationRecord::new(name, Utc::now(), down_script));
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<(), MigrationError> {
        let mut records = self.records.borrow_mut();
        let Some(position) = records.iter().position(|r| r.name == name) else {
            return Err(MigrationError::NotFound(format!("{name} not recorded")));
        };
        records.remove(position);
        Ok(())
    }

    fn down_script(&self, name: &str) -> Result<String, MigrationError> {
        self.records
            .borrow()
            .iter()
            .find(|r| r.name == name)
            .map(|r| r.down_script.clone())
            .ok_or_else(|| MigrationError::NotFound(format!("{name} not recorded")))
    }
}

impl ScriptRunner for MemoryLedger {
    fn run_script(&self, script: &str) -> Result<(), ShiftError> {
        if self.failing_script.as_deref() == Some(script) {
            return Err(ShiftError::QueryError(format!("syntax error in \"{script}\"")));
        }
        self.executed.borrow_mut().push(script.to_string());
        Ok(())
    }
}

/// Source declaring `names` with scripts `up <name>` / `down <name>`
pub fn sample_source(names: &[&str]) -> EmbeddedSource {
    names.iter().fold(EmbeddedSource::new(), |source, name| {
        source.with_migration(*name, format!("up {name}"), format!("down {name}"))
    })
}
