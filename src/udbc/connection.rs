use crate::error::DbError;
use crate::udbc::value::Value;
use async_trait::async_trait;
use std::collections::HashMap;

/// An abstract database connection that defines statement execution for
/// caller-supplied units of work plus the lifecycle operations the scope
/// manager sequences around them (commit, rollback, autocommit mode, close).
///
/// The scope manager itself never issues SQL; `query`/`execute` exist so the
/// unit of work handed into a scope can do its own statement execution
/// against the shared connection.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Execute a query statement and return the result set.
    ///
    /// # Arguments
    /// * `sql` - The SQL query string to execute
    /// * `args` - Positional parameters to bind to the SQL query
    ///
    /// # Returns
    /// A vector of hash maps where each hash map represents a row with column names as keys
    async fn query(
        &self,
        sql: &str,
        args: &[Value],
    ) -> Result<Vec<HashMap<String, Value>>, DbError>;

    /// Execute a non-query statement (INSERT, UPDATE, DELETE) and return the number of affected rows.
    ///
    /// # Arguments
    /// * `sql` - The SQL statement to execute
    /// * `args` - Positional parameters to bind to the SQL statement
    ///
    /// # Returns
    /// The number of affected rows
    async fn execute(&self, sql: &str, args: &[Value]) -> Result<u64, DbError>;

    /// Get the ID of the last inserted row.
    async fn last_insert_id(&self) -> Result<u64, DbError>;

    // ---------- lifecycle ----------
    /// Commit the current transaction.
    async fn commit(&self) -> Result<(), DbError>;
    /// Rollback the current transaction.
    async fn rollback(&self) -> Result<(), DbError>;
    /// Current autocommit mode.
    async fn auto_commit(&self) -> Result<bool, DbError>;
    /// Switch autocommit mode. Turning autocommit on while a transaction is
    /// open commits that transaction, matching the JDBC contract.
    async fn set_auto_commit(&self, on: bool) -> Result<(), DbError>;
    /// Close the connection, returning it to its provider. Any further call
    /// on this handle fails with `DbError::ConnectionClosed`.
    async fn close(&self) -> Result<(), DbError>;
}
