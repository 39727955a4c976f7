use std::future::Future;
use std::sync::Arc;

use log::debug;

use crate::context;
use crate::error::{BoxError, DbError, Result};
use crate::udbc::connection::Connection;
use crate::udbc::driver::Driver;

/// Reentrant transaction scope manager.
///
/// All three entry points accept a unit of work that receives the shared
/// connection, and all three are freely nestable in any combination: every
/// call in one execution context (one async scope chain) reuses the same
/// physical connection, and the connection is only returned to the provider
/// when the outermost call unwinds.
///
/// Commit and rollback are flat across nesting levels: an inner transactional
/// scope that succeeds commits immediately, at its own level, even if an
/// enclosing scope later rolls back. There is no savepoint isolation between
/// levels.
pub struct TransactionManager {
    provider: Arc<dyn Driver>,
}

impl TransactionManager {
    pub fn new(provider: Arc<dyn Driver>) -> Self {
        Self { provider }
    }

    /// Auto-commit scope.
    ///
    /// Forces autocommit on for the shared connection, so every statement the
    /// unit of work executes commits individually. A failing unit of work is
    /// wrapped and propagated with no corrective action: statements that
    /// already ran stay committed.
    ///
    /// The autocommit mode is only restored at the outermost unwind, never
    /// per nested call, so nested scopes share one autocommit setting for the
    /// connection's remaining lifetime in this context.
    pub async fn with_connection<F, Fut>(&self, work: F) -> Result<()>
    where
        F: FnOnce(Arc<dyn Connection>) -> Fut,
        Fut: Future<Output = std::result::Result<(), BoxError>>,
    {
        context::scoped(self.run_auto_commit(work)).await
    }

    /// Transactional scope without a result.
    ///
    /// Commits when the unit of work returns `Ok`, rolls back and propagates
    /// a wrapped failure when it returns `Err`. Both happen at the current
    /// nesting level, per the flat semantics described on
    /// [`TransactionManager`].
    pub async fn in_transaction_without_result<F, Fut>(&self, work: F) -> Result<()>
    where
        F: FnOnce(Arc<dyn Connection>) -> Fut,
        Fut: Future<Output = std::result::Result<(), BoxError>>,
    {
        self.in_transaction(work).await
    }

    /// Transactional scope producing a result.
    ///
    /// Same protocol as [`in_transaction_without_result`], but the unit of
    /// work's value becomes the call's result on success. On failure no value
    /// is produced; the wrapped failure propagates.
    ///
    /// [`in_transaction_without_result`]: TransactionManager::in_transaction_without_result
    pub async fn in_transaction<F, Fut, T>(&self, work: F) -> Result<T>
    where
        F: FnOnce(Arc<dyn Connection>) -> Fut,
        Fut: Future<Output = std::result::Result<T, BoxError>>,
    {
        context::scoped(self.run_transactional(work)).await
    }

    async fn run_auto_commit<F, Fut>(&self, work: F) -> Result<()>
    where
        F: FnOnce(Arc<dyn Connection>) -> Fut,
        Fut: Future<Output = std::result::Result<(), BoxError>>,
    {
        let conn = context::acquire(self.provider.as_ref()).await?;
        let attempt = match conn.set_auto_commit(true).await {
            Ok(()) => work(conn.clone()).await.map_err(DbError::work),
            Err(e) => Err(e),
        };
        finish(attempt, context::release(false).await)
    }

    async fn run_transactional<F, Fut, T>(&self, work: F) -> Result<T>
    where
        F: FnOnce(Arc<dyn Connection>) -> Fut,
        Fut: Future<Output = std::result::Result<T, BoxError>>,
    {
        let conn = context::acquire(self.provider.as_ref()).await?;
        let attempt = match work(conn.clone()).await {
            Ok(value) => match conn.commit().await {
                Ok(()) => Ok(value),
                Err(commit_err) => {
                    debug!(
                        "Commit failed at depth {}, rolling back",
                        context::current_depth()
                    );
                    rollback_after(&*conn, Box::new(commit_err)).await
                }
            },
            Err(source) => {
                debug!(
                    "Unit of work failed at depth {}, rolling back",
                    context::current_depth()
                );
                rollback_after(&*conn, source).await
            }
        };
        finish(attempt, context::release(false).await)
    }
}

/// Rolls back after a failed attempt, keeping both errors observable when the
/// rollback itself fails.
async fn rollback_after<T>(conn: &dyn Connection, work: BoxError) -> Result<T> {
    match conn.rollback().await {
        Ok(()) => Err(DbError::work(work)),
        Err(rollback_err) => Err(DbError::Rollback {
            source: Box::new(rollback_err),
            work,
        }),
    }
}

/// Combines the scope's outcome with the outcome of releasing the context
/// connection. A release failure surfaces to the caller, but it carries the
/// in-flight scope error instead of masking it.
fn finish<T>(attempt: Result<T>, released: Result<()>) -> Result<T> {
    match released {
        Ok(()) => attempt,
        Err(release_err) => Err(DbError::Release {
            source: Box::new(release_err),
            work: attempt.err().map(Box::new),
        }),
    }
}
