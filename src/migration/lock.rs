//! Exclusive lock on the history table
//!
//! A run takes `ACCESS EXCLUSIVE` on the history table inside its own
//! transaction. Concurrent runs queue on the lock and see the first run's
//! committed History once they get it. The lock is released by the commit or
//! rollback that ends the transaction, so there is no explicit unlock.

use crate::executor::ShiftExecutor;
use crate::migration::{MigrationError, QualifiedTable};
use std::time::{Duration, Instant};

/// Format a duration as a PostgreSQL interval literal in milliseconds
///
/// Never rounds down to `0ms`, which PostgreSQL reads as "no limit".
pub(crate) fn millis_literal(duration: Duration) -> String {
    format!("'{}ms'", duration.as_millis().max(1))
}

pub(crate) fn lock_timeout_sql(timeout: Duration) -> String {
    format!("SET LOCAL lock_timeout = {}", millis_literal(timeout))
}

pub(crate) fn lock_sql(table: &QualifiedTable) -> String {
    format!("LOCK TABLE {} IN ACCESS EXCLUSIVE MODE", table.quoted())
}

/// Acquire the run lock on `table` within the executor's transaction
///
/// # Errors
///
/// Returns `MigrationError::StorageUnavailable` if the lock cannot be taken,
/// including when `timeout` expires first.
pub fn lock_history_table<E: ShiftExecutor + ?Sized>(
    executor: &E,
    table: &QualifiedTable,
    timeout: Option<Duration>,
) -> Result<(), MigrationError> {
    if let Some(timeout) = timeout {
        executor
            .execute(&lock_timeout_sql(timeout), &[])
            .map_err(MigrationError::storage("failed to set lock timeout"))?;
    }

    let started = Instant::now();
    executor
        .execute(&lock_sql(table), &[])
        .map_err(MigrationError::storage(format!(
            "failed to lock history table {table}"
        )))?;

    tracing::debug!(
        table = %table,
        waited = ?started.elapsed(),
        "Acquired history lock"
    );
    Ok(())
}
