//! In-memory test doubles for the `Driver`/`Connection` seams, used by the
//! protocol-level unit tests. They record every lifecycle call into a shared
//! event log and can be told to fail at specific points.

use crate::error::DbError;
use crate::udbc::connection::Connection;
use crate::udbc::driver::Driver;
use crate::udbc::value::Value;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub(crate) type EventLog = Arc<Mutex<Vec<String>>>;

#[derive(Default)]
pub(crate) struct MockDriver {
    pub events: EventLog,
    pub fail_acquire: bool,
    pub fail_commit: bool,
    pub fail_rollback: bool,
    pub fail_close: bool,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> EventLog {
        self.events.clone()
    }
}

#[async_trait]
impl Driver for MockDriver {
    fn name(&self) -> &str {
        "mock"
    }

    fn r#type(&self) -> &str {
        "mock"
    }

    async fn acquire(&self) -> Result<Arc<dyn Connection>, DbError> {
        if self.fail_acquire {
            return Err(DbError::Driver("pool exhausted".to_string()));
        }
        self.events.lock().unwrap().push("acquire".to_string());
        Ok(Arc::new(MockConnection {
            events: self.events.clone(),
            auto_commit: Mutex::new(true),
            closed: Mutex::new(false),
            fail_commit: self.fail_commit,
            fail_rollback: self.fail_rollback,
            fail_close: self.fail_close,
        }))
    }

    async fn close(&self) -> Result<(), DbError> {
        Ok(())
    }
}

pub(crate) struct MockConnection {
    events: EventLog,
    auto_commit: Mutex<bool>,
    closed: Mutex<bool>,
    fail_commit: bool,
    fail_rollback: bool,
    fail_close: bool,
}

impl MockConnection {
    fn guard_open(&self) -> Result<(), DbError> {
        if *self.closed.lock().unwrap() {
            return Err(DbError::ConnectionClosed);
        }
        Ok(())
    }

    fn log(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn query(
        &self,
        sql: &str,
        _args: &[Value],
    ) -> Result<Vec<HashMap<String, Value>>, DbError> {
        self.guard_open()?;
        self.log(format!("query: {sql}"));
        Ok(Vec::new())
    }

    async fn execute(&self, sql: &str, _args: &[Value]) -> Result<u64, DbError> {
        self.guard_open()?;
        self.log(format!("execute: {sql}"));
        Ok(1)
    }

    async fn last_insert_id(&self) -> Result<u64, DbError> {
        self.guard_open()?;
        Ok(0)
    }

    async fn commit(&self) -> Result<(), DbError> {
        self.guard_open()?;
        if self.fail_commit {
            return Err(DbError::Database("commit failed".to_string()));
        }
        self.log("commit");
        Ok(())
    }

    async fn rollback(&self) -> Result<(), DbError> {
        self.guard_open()?;
        if self.fail_rollback {
            return Err(DbError::Database("rollback failed".to_string()));
        }
        self.log("rollback");
        Ok(())
    }

    async fn auto_commit(&self) -> Result<bool, DbError> {
        self.guard_open()?;
        Ok(*self.auto_commit.lock().unwrap())
    }

    async fn set_auto_commit(&self, on: bool) -> Result<(), DbError> {
        self.guard_open()?;
        *self.auto_commit.lock().unwrap() = on;
        self.log(format!("set_auto_commit({on})"));
        Ok(())
    }

    async fn close(&self) -> Result<(), DbError> {
        self.guard_open()?;
        if self.fail_close {
            return Err(DbError::Database("close failed".to_string()));
        }
        *self.closed.lock().unwrap() = true;
        self.log("close");
        Ok(())
    }
}
