use crate::error::DbError;
use crate::udbc::connection::Connection;
use async_trait::async_trait;
use std::sync::Arc;

/// `Driver` is the pooled-connection provider seam.
///
/// A driver is responsible for:
/// - Providing metadata about itself (name, type)
/// - Handing out database connections
/// - Cleaning up resources when closed
///
/// Pool sizing, eviction and health checking live behind this trait; the
/// scope manager only calls `acquire` and `Connection::close`.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Returns the name of the driver.
    ///
    /// Used as the registration key in the `DriverManager`.
    fn name(&self) -> &str;

    /// Returns the type of the driver.
    ///
    /// Example: "postgres", "mysql", "sqlite"
    fn r#type(&self) -> &str;

    /// Obtains a connection.
    ///
    /// Blocks (asynchronously) for as long as the underlying pool's
    /// acquisition blocks; the scope manager adds no waiting of its own.
    ///
    /// # Returns
    /// - `Ok(Arc<dyn Connection>)` if a connection is available
    /// - `Err(DbError)` on pool exhaustion or network failure
    async fn acquire(&self) -> Result<Arc<dyn Connection>, DbError>;

    /// Closes the driver and releases any associated resources.
    async fn close(&self) -> Result<(), DbError>;
}
