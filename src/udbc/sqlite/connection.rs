use async_trait::async_trait;
use rusqlite::params_from_iter;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::DbError;
use crate::udbc::connection::Connection;
use crate::udbc::sqlite::value_codec::{from_sqlite_value, to_sqlite_value};
use crate::udbc::value::Value;

struct State {
    conn: Option<rusqlite::Connection>,
    auto_commit: bool,
}

impl State {
    fn conn(&self) -> Result<&rusqlite::Connection, DbError> {
        self.conn.as_ref().ok_or(DbError::ConnectionClosed)
    }
}

/// A SQLite connection with JDBC-style autocommit emulation.
///
/// SQLite itself is always in autocommit mode outside an explicit
/// transaction, so "autocommit off" is modeled by keeping a transaction open:
/// switching autocommit off issues `BEGIN`, and `commit`/`rollback` end the
/// open transaction and immediately `BEGIN` the next one. Switching autocommit
/// back on commits whatever is open, matching the JDBC contract.
pub struct SqliteConnection {
    state: Arc<Mutex<State>>,
}

impl SqliteConnection {
    pub fn new(conn: rusqlite::Connection) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                conn: Some(conn),
                auto_commit: true,
            })),
        }
    }
}

#[async_trait]
impl Connection for SqliteConnection {
    async fn query(
        &self,
        sql: &str,
        args: &[Value],
    ) -> Result<Vec<HashMap<String, Value>>, DbError> {
        let sql = sql.to_string();
        let params = args.iter().map(to_sqlite_value).collect::<Vec<_>>();
        let state = self.state.clone();
        tokio::task::spawn_blocking(move || {
            let state = state.blocking_lock();
            let conn = state.conn()?;
            let mut stmt = conn.prepare(&sql)?;
            let column_count = stmt.column_count();
            let column_names = (0..column_count)
                .map(|i| {
                    stmt.column_name(i)
                        .map(|s| s.to_string())
                        .unwrap_or_else(|_| i.to_string())
                })
                .collect::<Vec<_>>();

            let mut rows = stmt.query(params_from_iter(params))?;
            let mut out = Vec::new();

            while let Some(row) = rows.next()? {
                let mut map = HashMap::with_capacity(column_count);
                for i in 0..column_count {
                    let name = column_names
                        .get(i)
                        .cloned()
                        .unwrap_or_else(|| i.to_string());
                    let v = row.get_ref(i)?;
                    map.insert(name, from_sqlite_value(v));
                }
                out.push(map);
            }

            Ok::<_, DbError>(out)
        })
        .await
        .map_err(|e| DbError::Database(e.to_string()))?
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> Result<u64, DbError> {
        let sql = sql.to_string();
        let params = args.iter().map(to_sqlite_value).collect::<Vec<_>>();
        let state = self.state.clone();
        tokio::task::spawn_blocking(move || {
            let state = state.blocking_lock();
            let affected = state.conn()?.execute(&sql, params_from_iter(params))?;
            Ok::<_, DbError>(affected as u64)
        })
        .await
        .map_err(|e| DbError::Database(e.to_string()))?
    }

    async fn last_insert_id(&self) -> Result<u64, DbError> {
        let state = self.state.clone();
        tokio::task::spawn_blocking(move || {
            let state = state.blocking_lock();
            Ok::<_, DbError>(state.conn()?.last_insert_rowid().max(0) as u64)
        })
        .await
        .map_err(|e| DbError::Database(e.to_string()))?
    }

    async fn commit(&self) -> Result<(), DbError> {
        let state = self.state.clone();
        tokio::task::spawn_blocking(move || {
            let state = state.blocking_lock();
            let conn = state.conn()?;
            if state.auto_commit {
                return Err(DbError::Database(
                    "commit called in auto-commit mode".to_string(),
                ));
            }
            conn.execute_batch("COMMIT")?;
            conn.execute_batch("BEGIN")?;
            Ok::<_, DbError>(())
        })
        .await
        .map_err(|e| DbError::Database(e.to_string()))?
    }

    async fn rollback(&self) -> Result<(), DbError> {
        let state = self.state.clone();
        tokio::task::spawn_blocking(move || {
            let state = state.blocking_lock();
            let conn = state.conn()?;
            if state.auto_commit {
                return Err(DbError::Database(
                    "rollback called in auto-commit mode".to_string(),
                ));
            }
            conn.execute_batch("ROLLBACK")?;
            conn.execute_batch("BEGIN")?;
            Ok::<_, DbError>(())
        })
        .await
        .map_err(|e| DbError::Database(e.to_string()))?
    }

    async fn auto_commit(&self) -> Result<bool, DbError> {
        let state = self.state.lock().await;
        state.conn()?;
        Ok(state.auto_commit)
    }

    async fn set_auto_commit(&self, on: bool) -> Result<(), DbError> {
        let state = self.state.clone();
        tokio::task::spawn_blocking(move || {
            let mut state = state.blocking_lock();
            if state.auto_commit == on {
                state.conn()?;
                return Ok(());
            }
            let conn = state.conn()?;
            if on {
                if !conn.is_autocommit() {
                    conn.execute_batch("COMMIT")?;
                }
            } else {
                conn.execute_batch("BEGIN")?;
            }
            state.auto_commit = on;
            Ok::<_, DbError>(())
        })
        .await
        .map_err(|e| DbError::Database(e.to_string()))?
    }

    async fn close(&self) -> Result<(), DbError> {
        let state = self.state.clone();
        tokio::task::spawn_blocking(move || {
            let mut state = state.blocking_lock();
            let conn = state.conn.take().ok_or(DbError::ConnectionClosed)?;
            if !conn.is_autocommit() {
                // A transaction left open here was abandoned; discard it.
                let _ = conn.execute_batch("ROLLBACK");
            }
            conn.close()
                .map_err(|(_, e)| DbError::Database(e.to_string()))
        })
        .await
        .map_err(|e| DbError::Database(e.to_string()))?
    }
}
