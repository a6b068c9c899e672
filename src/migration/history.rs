//! The database-resident ledger of applied migrations

use crate::executor::ShiftExecutor;
use crate::migration::{lock, MigrationError, MigrationRecord, QualifiedTable};
use std::time::Duration;

/// Ledger of applied migrations
///
/// `list` is always ascending by name. Every method except `ensure` is meant
/// to run inside the transaction of a single run.
pub trait MigrationHistory {
    /// Idempotently create the ledger storage
    fn ensure(&self) -> Result<(), MigrationError>;

    /// Take the exclusive run lock, waiting at most `timeout`
    fn lock(&self, timeout: Option<Duration>) -> Result<(), MigrationError>;

    fn list(&self) -> Result<Vec<MigrationRecord>, MigrationError>;

    /// Record `name` as applied. `Conflict` if it is already recorded.
    fn append(&self, name: &str, down_script: &str) -> Result<(), MigrationError>;

    /// Forget `name`. `NotFound` if it is not recorded.
    fn remove(&self, name: &str) -> Result<(), MigrationError>;

    /// Stored reversal script of `name`. `NotFound` if it is not recorded.
    fn down_script(&self, name: &str) -> Result<String, MigrationError>;
}

/// [`MigrationHistory`] stored in a PostgreSQL table
///
/// ```sql
/// CREATE TABLE "public"."migrations" (
///     migration_name VARCHAR(512) NOT NULL,
///     applied_at     TIMESTAMPTZ  NOT NULL DEFAULT CURRENT_TIMESTAMP(3),
///     down_script    TEXT         NOT NULL,
///     CONSTRAINT "migrations_pk" PRIMARY KEY (migration_name)
/// )
/// ```
pub struct PgHistory<'e, E: ShiftExecutor + ?Sized> {
    executor: &'e E,
    table: &'e QualifiedTable,
}

impl<'e, E: ShiftExecutor + ?Sized> PgHistory<'e, E> {
    pub fn new(executor: &'e E, table: &'e QualifiedTable) -> Self {
        Self { executor, table }
    }

    fn schema_exists_sql(&self) -> &'static str {
        "SELECT 1 FROM pg_catalog.pg_namespace WHERE nspname = $1"
    }

    fn create_schema_sql(&self) -> String {
        format!("CREATE SCHEMA IF NOT EXISTS {};", self.table.schema().quoted())
    }

    fn create_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {table} (\n    \
             migration_name VARCHAR(512) NOT NULL,\n    \
             applied_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP(3),\n    \
             down_script TEXT NOT NULL,\n    \
             CONSTRAINT {pk} PRIMARY KEY (migration_name)\n\
             );",
            table = self.table.quoted(),
            pk = self.table.primary_key_name(),
        )
    }

    fn list_sql(&self) -> String {
        format!(
            "SELECT migration_name, applied_at, down_script FROM {} ORDER BY migration_name COLLATE \"C\" ASC",
            self.table.quoted()
        )
    }

    fn append_sql(&self) -> String {
        format!(
            "INSERT INTO {} (migration_name, down_script) VALUES ($1, $2) ON CONFLICT (migration_name) DO NOTHING",
            self.table.quoted()
        )
    }

    fn remove_sql(&self) -> String {
        format!(
            "DELETE FROM {} WHERE migration_name = $1",
            self.table.quoted()
        )
    }

    fn down_script_sql(&self) -> String {
        format!(
            "SELECT down_script FROM {} WHERE migration_name = $1",
            self.table.quoted()
        )
    }
}

impl<'e, E: ShiftExecutor + ?Sized> MigrationHistory for PgHistory<'e, E> {
    fn ensure(&self) -> Result<(), MigrationError> {
        let failed =
            || MigrationError::storage(format!("failed to create history table {}", self.table));

        // CREATE SCHEMA checks the database CREATE privilege even when the schema exists.
        let schema = self.table.schema().as_str();
        let found = self
            .executor
            .execute(self.schema_exists_sql(), &[&schema])
            .map_err(failed())?;
        if found == 0 {
            self.executor
                .batch_execute(&self.create_schema_sql())
                .map_err(failed())?;
        }

        self.executor
            .batch_execute(&self.create_table_sql())
            .map_err(failed())
    }

    fn lock(&self, timeout: Option<Duration>) -> Result<(), MigrationError> {
        lock::lock_history_table(self.executor, self.table, timeout)
    }

    fn list(&self) -> Result<Vec<MigrationRecord>, MigrationError> {
        let rows = self
            .executor
            .query_all(&self.list_sql(), &[])
            .map_err(MigrationError::storage(format!("failed to read {}", self.table)))?;

        let records = rows
            .iter()
            .map(MigrationRecord::from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(MigrationError::storage(format!("failed to read {}", self.table)))?;

        tracing::debug!(table = %self.table, recorded = records.len(), "Read migration history");
        Ok(records)
    }

    fn append(&self, name: &str, down_script: &str) -> Result<(), MigrationError> {
        let inserted = self
            .executor
            .execute(&self.append_sql(), &[&name, &down_script])
            .map_err(MigrationError::storage(format!(
                "failed to record migration \"{name}\""
            )))?;

        if inserted == 0 {
            return Err(MigrationError::Conflict(name.to_string()));
        }
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<(), MigrationError> {
        let deleted = self
            .executor
            .execute(&self.remove_sql(), &[&name])
            .map_err(MigrationError::storage(format!(
                "failed to remove migration \"{name}\" from history"
            )))?;

        if deleted == 0 {
            return Err(MigrationError::NotFound(format!(
                "migration \"{name}\" is not recorded in history"
            )));
        }
        Ok(())
    }

    fn down_script(&self, name: &str) -> Result<String, MigrationError> {
        let rows = self
            .executor
            .query_all(&self.down_script_sql(), &[&name])
            .map_err(MigrationError::storage(format!(
                "failed to read down script of \"{name}\""
            )))?;

        let Some(row) = rows.first() else {
            return Err(MigrationError::NotFound(format!(
                "down script of migration \"{name}\" not found"
            )));
        };
        row.try_get(0).map_err(|e| MigrationError::StorageUnavailable {
            context: format!("failed to read down script of \"{name}\""),
            source: crate::executor::ShiftError::ParseError(e.to_string()),
        })
    }
}
