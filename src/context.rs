//! Per-run context handed to every migration entry point
//!
//! Carries the three things a run needs from its caller: where log events go,
//! whether the caller wants the run stopped, and by when it must finish.

use crate::migration::MigrationError;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Dispatch;

/// Shared flag a caller flips to stop a run in progress
///
/// Clones observe the same flag, so one clone can live in a signal handler
/// while another sits in the [`RunContext`].
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. The run stops at its next checkpoint and rolls back.
    ///
    /// Checkpoints sit between actions: before locking and before each apply
    /// or revert. A script that is already executing is not interrupted and
    /// runs to completion first. Only the run's deadline bounds a single
    /// statement, through `SET LOCAL statement_timeout`.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Explicit context for one migration run
///
/// Events are emitted under `dispatch` only; nothing here touches the global
/// default subscriber. The default context is silent, never cancelled and has
/// no deadline.
///
/// # Example
///
/// ```
/// use pgshift::{CancelToken, RunContext};
/// use std::time::Duration;
///
/// let token = CancelToken::new();
/// let ctx = RunContext::new()
///     .with_cancel_token(token.clone())
///     .with_timeout(Duration::from_secs(30));
///
/// assert!(ctx.checkpoint("applying 1_init").is_ok());
/// token.cancel();
/// assert!(ctx.checkpoint("applying 1_init").is_err());
/// ```
#[derive(Clone)]
pub struct RunContext {
    dispatch: Dispatch,
    cancel: CancelToken,
    deadline: Option<Instant>,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            dispatch: Dispatch::none(),
            cancel: CancelToken::default(),
            deadline: None,
        }
    }

    /// Route this run's log events to `dispatch`
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Abort the run if it is still going at `deadline`
    ///
    /// Unlike a [`CancelToken`], the deadline also interrupts a running
    /// statement: the transaction's `statement_timeout` is set to the time left.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` when there is no deadline
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Fail with [`MigrationError::Cancelled`] if the run was cancelled or is past its deadline
    ///
    /// `step` names what was about to happen and ends up in the error message.
    pub fn checkpoint(&self, step: impl fmt::Display) -> Result<(), MigrationError> {
        if self.cancel.is_cancelled() {
            return Err(MigrationError::Cancelled(format!(
                "cancelled before {step}"
            )));
        }
        if self.remaining() == Some(Duration::ZERO) {
            return Err(MigrationError::Cancelled(format!(
                "deadline passed before {step}"
            )));
        }
        Ok(())
    }

    /// Run `f` with this context's dispatcher as the default for the current thread
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }
}
