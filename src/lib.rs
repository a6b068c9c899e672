//! # pgshift
//!
//! Reconciles a directory of up/down SQL migration scripts with the history
//! table of a PostgreSQL database, using the `may_postgres` driver.
//!
//! A run reads the declared migrations, locks the history table inside a
//! serializable transaction, and applies or reverts migrations until History
//! matches the declared set under the chosen [`Priority`](migration::Priority).
//! Everything a run does is committed together or not at all.

pub mod config;
pub mod connection;
pub mod context;
pub mod executor;
pub mod migration;
pub mod transaction;

#[cfg(test)]
mod test_helpers;

pub use config::MigratorConfig;
pub use connection::{connect, ConnectionError};
pub use context::{CancelToken, RunContext};
pub use executor::{MayPostgresExecutor, ScriptRunner, ShiftError, ShiftExecutor};
pub use migration::{MigrationError, MigrationResult, Migrator};
