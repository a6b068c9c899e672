//! Reconciliation of declared migrations with recorded History
//!
//! The engine runs against whatever [`MigrationHistory`] and [`ScriptRunner`]
//! it is given and never commits anything itself. Atomicity comes from the
//! caller running it inside one transaction (see
//! [`Migrator`](crate::migration::Migrator)).

use crate::context::RunContext;
use crate::executor::ScriptRunner;
use crate::migration::error::Direction;
use crate::migration::plan::{self, fork_point, pending_from};
use crate::migration::{
    Migration, MigrationError, MigrationHistory, MigrationRecord, MigrationResult, Priority,
};

/// Computes and executes the actions that align History with Source
///
/// Any failure aborts the run immediately; results of actions that already
/// ran are discarded along with the caller's transaction.
pub struct ReconciliationEngine<'a, H, R>
where
    H: MigrationHistory + ?Sized,
    R: ScriptRunner + ?Sized,
{
    history: &'a H,
    runner: &'a R,
    ctx: &'a RunContext,
    strict_history: bool,
}

impl<'a, H, R> ReconciliationEngine<'a, H, R>
where
    H: MigrationHistory + ?Sized,
    R: ScriptRunner + ?Sized,
{
    pub fn new(history: &'a H, runner: &'a R, ctx: &'a RunContext) -> Self {
        Self {
            history,
            runner,
            ctx,
            strict_history: false,
        }
    }

    /// Treat History entries past the end of Source as `Inconsistent` under `Priority::Db`
    pub fn strict_history(mut self, strict: bool) -> Self {
        self.strict_history = strict;
        self
    }

    /// Bring History in line with `declared` under `priority`
    ///
    /// # Errors
    ///
    /// `Inconsistent` when `Priority::Db` finds a diverging History (before
    /// anything runs), `ScriptExecutionFailed` for a failing script,
    /// `Cancelled` at a checkpoint, and any History error.
    pub fn reconcile(
        &self,
        declared: &[Migration],
        priority: Priority,
    ) -> Result<Vec<MigrationResult>, MigrationError> {
        self.ctx.in_scope(|| {
            let recorded = self.history.list()?;
            match priority {
                Priority::Db => self.apply_pending(declared, &recorded),
                Priority::Fs => self.converge(declared, &recorded),
            }
        })
    }

    /// What [`reconcile`](Self::reconcile) would do right now, without doing it
    pub fn plan(
        &self,
        declared: &[Migration],
        priority: Priority,
    ) -> Result<Vec<MigrationResult>, MigrationError> {
        self.ctx.in_scope(|| {
            let recorded = self.history.list()?;
            plan::plan(declared, &recorded, priority, self.strict_history)
        })
    }

    /// Revert the most recently applied migration
    ///
    /// # Errors
    ///
    /// `NotFound` when History is empty.
    pub fn down(&self) -> Result<MigrationResult, MigrationError> {
        self.ctx.in_scope(|| {
            let recorded = self.history.list()?;
            let Some(last) = recorded.last() else {
                return Err(MigrationError::NotFound("migrations not found".to_string()));
            };
            self.revert_one(&last.name)
        })
    }

    fn apply_pending(
        &self,
        declared: &[Migration],
        recorded: &[MigrationRecord],
    ) -> Result<Vec<MigrationResult>, MigrationError> {
        let start = pending_from(declared, recorded, self.strict_history)?;
        declared[start..]
            .iter()
            .map(|migration| self.apply_one(migration))
            .collect()
    }

    fn converge(
        &self,
        declared: &[Migration],
        recorded: &[MigrationRecord],
    ) -> Result<Vec<MigrationResult>, MigrationError> {
        if declared.is_empty() {
            tracing::info!(recorded = recorded.len(), "No migrations declared, reverting all");
            let names: Vec<&str> = recorded.iter().map(|r| r.name.as_str()).collect();
            return self.revert_many(&names);
        }

        let Some(fork) = fork_point(declared, recorded) else {
            return self.apply_pending(declared, recorded);
        };

        tracing::debug!(fork, recorded = recorded.len(), "History diverges from source");
        let names: Vec<&str> = recorded[fork..].iter().map(|r| r.name.as_str()).collect();
        let mut results = self.revert_many(&names)?;

        let recorded = self.history.list()?;
        results.extend(self.apply_pending(declared, &recorded)?);
        Ok(results)
    }

    fn apply_one(&self, migration: &Migration) -> Result<MigrationResult, MigrationError> {
        self.ctx
            .checkpoint(format_args!("applying \"{}\"", migration.name))?;

        let up = migration.up.load()?;
        let down = migration.down.load()?;

        self.runner
            .run_script(&up)
            .map_err(|source| MigrationError::ScriptExecutionFailed {
                name: migration.name.clone(),
                direction: Direction::Up,
                source,
            })?;
        self.history.append(&migration.name, &down)?;

        tracing::info!(migration = %migration.name, "Applied migration");
        Ok(MigrationResult::applied(&migration.name))
    }

    fn revert_one(&self, name: &str) -> Result<MigrationResult, MigrationError> {
        self.ctx.checkpoint(format_args!("reverting \"{name}\""))?;

        let down = self.history.down_script(name)?;
        self.runner
            .run_script(&down)
            .map_err(|source| MigrationError::ScriptExecutionFailed {
                name: name.to_string(),
                direction: Direction::Down,
                source,
            })?;
        self.history.remove(name)?;

        tracing::info!(migration = %name, "Reverted migration");
        Ok(MigrationResult::reverted(name))
    }

    /// Revert `names` last to first, stopping at the first failure
    fn revert_many<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> Result<Vec<MigrationResult>, MigrationError> {
        names
            .iter()
            .rev()
            .map(|name| self.revert_one(name.as_ref()))
            .collect()
    }
}
