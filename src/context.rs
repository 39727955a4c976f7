use std::cell::RefCell;
use std::future::Future;
use std::sync::Arc;

use log::{debug, trace};

use crate::error::Result;
use crate::udbc::connection::Connection;
use crate::udbc::driver::Driver;

tokio::task_local! {
    static CONTEXT: RefCell<ExecutionContext>;
}

/// Per-execution-context registry entry: the shared physical connection, the
/// reentrancy depth and the autocommit mode captured at first acquisition.
///
/// Invariant: `connection` is `Some` iff `depth > 0`. Depth is incremented
/// only in `acquire` and decremented only in `release`, and the two are
/// paired on every path through the scope manager.
#[derive(Default)]
struct ExecutionContext {
    connection: Option<Arc<dyn Connection>>,
    depth: u32,
    prior_auto_commit: bool,
}

/// Runs `fut` inside the current execution context, establishing a fresh one
/// if the task has none yet. Nested scope calls land in the first branch and
/// therefore share the outer call's connection and depth counter; independent
/// top-level calls each get their own context.
pub(crate) async fn scoped<F: Future>(fut: F) -> F::Output {
    if CONTEXT.try_with(|_| ()).is_ok() {
        fut.await
    } else {
        CONTEXT
            .scope(RefCell::new(ExecutionContext::default()), fut)
            .await
    }
}

/// Depth of the current context, 0 outside any scope.
pub(crate) fn current_depth() -> u32 {
    CONTEXT.try_with(|ctx| ctx.borrow().depth).unwrap_or(0)
}

/// Hands out the context connection, obtaining one from the provider on first
/// use. First use records the connection's autocommit mode, forces autocommit
/// off and sets depth to 1; reentrant use leaves the connection untouched and
/// only bumps the depth.
///
/// An acquisition failure leaves the depth at 0, so no compensating release
/// is owed by the caller.
pub(crate) async fn acquire(provider: &dyn Driver) -> Result<Arc<dyn Connection>> {
    let shared = CONTEXT.with(|ctx| {
        let mut ctx = ctx.borrow_mut();
        match ctx.connection.clone() {
            Some(conn) => {
                ctx.depth += 1;
                trace!("Reusing context connection, depth={}", ctx.depth);
                Some(conn)
            }
            None => None,
        }
    });
    if let Some(conn) = shared {
        return Ok(conn);
    }

    let conn = provider.acquire().await?;
    let prior_auto_commit = match configure(conn.as_ref()).await {
        Ok(prior) => prior,
        Err(e) => {
            // Never store a half-configured connection.
            let _ = conn.close().await;
            return Err(e);
        }
    };

    CONTEXT.with(|ctx| {
        let mut ctx = ctx.borrow_mut();
        ctx.connection = Some(conn.clone());
        ctx.prior_auto_commit = prior_auto_commit;
        ctx.depth = 1;
    });
    debug!(
        "Acquired connection from '{}', prior auto-commit={}",
        provider.name(),
        prior_auto_commit
    );
    Ok(conn)
}

async fn configure(conn: &dyn Connection) -> Result<bool> {
    let prior = conn.auto_commit().await?;
    conn.set_auto_commit(false).await?;
    Ok(prior)
}

/// Unwinds one level of nesting, or the whole context when `force` is set
/// (used to abandon a connection that nested scopes can no longer trust).
/// At depth 0 this is a no-op, so unmatched calls cannot underflow the
/// counter or reacquire a connection.
///
/// When the outermost level unwinds, the stored reference is cleared first
/// and only then is the autocommit mode restored and the connection closed;
/// a failure in either step surfaces to the caller, but the context is never
/// left holding a dead handle.
pub(crate) async fn release(force: bool) -> Result<()> {
    let unwound = CONTEXT.with(|ctx| {
        let mut ctx = ctx.borrow_mut();
        if ctx.depth == 0 {
            return None;
        }
        ctx.depth = if force { 0 } else { ctx.depth - 1 };
        if ctx.depth == 0 {
            Some((ctx.connection.take(), ctx.prior_auto_commit))
        } else {
            trace!("Released nested scope, depth={}", ctx.depth);
            None
        }
    });

    let Some((conn, prior_auto_commit)) = unwound else {
        return Ok(());
    };
    let Some(conn) = conn else {
        return Ok(());
    };

    debug!(
        "Releasing context connection, restoring auto-commit={}",
        prior_auto_commit
    );
    let restored = conn.set_auto_commit(prior_auto_commit).await;
    let closed = conn.close().await;
    restored?;
    closed
}
