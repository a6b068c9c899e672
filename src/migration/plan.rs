//! Comparison of declared migrations against recorded History
//!
//! Both sequences are ascending by name and are walked with one shared index.
//! Position `i` is synchronized when both sides have an entry there and the
//! names are equal.

use crate::migration::{Migration, MigrationError, MigrationRecord, MigrationResult, Priority};

/// First position where History stops being a prefix of Source
///
/// `None` when every recorded entry is synchronized.
pub(crate) fn fork_point(declared: &[Migration], recorded: &[MigrationRecord]) -> Option<usize> {
    recorded
        .iter()
        .enumerate()
        .position(|(i, record)| declared.get(i).map_or(true, |m| m.name != record.name))
}

/// Index of the first declared migration that still has to be applied
///
/// Fails with `Inconsistent` when a recorded name differs from the declared
/// name at the same position. History entries past the end of Source are
/// tolerated with a warning unless `strict` is set.
pub(crate) fn pending_from(
    declared: &[Migration],
    recorded: &[MigrationRecord],
    strict: bool,
) -> Result<usize, MigrationError> {
    for (index, record) in recorded.iter().enumerate() {
        match declared.get(index) {
            Some(migration) if migration.name == record.name => {}
            Some(migration) => {
                return Err(MigrationError::Inconsistent {
                    index,
                    recorded: record.name.clone(),
                    declared: Some(migration.name.clone()),
                })
            }
            None if strict => {
                return Err(MigrationError::Inconsistent {
                    index,
                    recorded: record.name.clone(),
                    declared: None,
                })
            }
            None => {
                tracing::warn!(
                    recorded = recorded.len(),
                    declared = declared.len(),
                    first_extra = %record.name,
                    "History has migrations that are not declared; leaving them in place"
                );
                return Ok(declared.len());
            }
        }
    }
    Ok(recorded.len())
}

/// The actions a run with `priority` would take, without taking them
///
/// Produces exactly the sequence the corresponding run returns, and fails
/// with the same `Inconsistent` error where the run would.
pub fn plan(
    declared: &[Migration],
    recorded: &[MigrationRecord],
    priority: Priority,
    strict_history: bool,
) -> Result<Vec<MigrationResult>, MigrationError> {
    match priority {
        Priority::Db => {
            let start = pending_from(declared, recorded, strict_history)?;
            Ok(declared[start..]
                .iter()
                .map(|m| MigrationResult::applied(&m.name))
                .collect())
        }
        Priority::Fs => {
            let fork = fork_point(declared, recorded).unwrap_or(recorded.len());
            let reverts = recorded[fork..]
                .iter()
                .rev()
                .map(|r| MigrationResult::reverted(&r.name));
            let applies = declared[fork..]
                .iter()
                .map(|m| MigrationResult::applied(&m.name));
            Ok(reverts.chain(applies).collect())
        }
    }
}
