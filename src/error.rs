use thiserror::Error;

/// Any error a caller-supplied unit of work may fail with.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database Error: {0}")]
    Database(String),
    #[error("Invalid Database Url: {0}")]
    InvalidDatabaseUrl(String),
    #[error("Driver Error: {0}")]
    Driver(String),
    #[error("Connection Closed")]
    ConnectionClosed,
    /// A caller-supplied unit of work failed. The original cause stays
    /// inspectable through `source()` / downcasting.
    #[error("Unit Of Work Error: {source}")]
    Work {
        #[source]
        source: BoxError,
    },
    /// Rolling back after a failed unit of work itself failed. Neither error
    /// masks the other: the rollback failure is the `source()`, the work
    /// failure that triggered it is kept in `work`.
    #[error("Rollback Error: {source} (while handling: {work})")]
    Rollback {
        source: Box<DbError>,
        work: BoxError,
    },
    /// Restoring autocommit or closing the connection failed at the outermost
    /// release. An in-flight scope error, if any, is kept in `work`.
    #[error("Release Error: {source}")]
    Release {
        source: Box<DbError>,
        work: Option<Box<DbError>>,
    },
}

impl DbError {
    /// Wraps an arbitrary unit-of-work failure.
    pub fn work(source: impl Into<BoxError>) -> Self {
        DbError::Work {
            source: source.into(),
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for DbError {
    fn from(e: rusqlite::Error) -> Self {
        DbError::Database(e.to_string())
    }
}
