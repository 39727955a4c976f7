use std::sync::{Arc, LazyLock};

use dashmap::DashMap;

use crate::Result;
use crate::error::DbError;
use crate::transaction::TransactionManager;
use crate::udbc::DEFAULT_DB_NAME;
use crate::udbc::driver::Driver;

/// The global entry point for the `utx` library.
/// Use this singleton to register drivers and obtain transaction managers.
pub static TX: LazyLock<DriverManager> = LazyLock::new(DriverManager::new);

/// A registry for database drivers (pooled-connection providers).
///
/// `DriverManager` stores drivers under unique names and hands out
/// [`TransactionManager`] instances bound to a registered driver, so
/// application code can open scopes without threading the driver around.
pub struct DriverManager {
    /// A thread-safe map storing registered database drivers by their unique names.
    pools: DashMap<String, Arc<dyn Driver>>,
}

impl Default for DriverManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverManager {
    /// Creates a new, empty `DriverManager`.
    pub fn new() -> Self {
        Self {
            pools: DashMap::new(),
        }
    }

    /// Registers a database driver with the manager.
    ///
    /// The driver's name (retrieved via `driver.name()`) is used as the registration key.
    ///
    /// # Errors
    /// Returns an error if a driver with the same name (especially the default name)
    /// is already registered.
    pub fn register(&self, driver: impl Driver + 'static) -> Result<()> {
        let name = driver.name().to_string();
        if name == DEFAULT_DB_NAME && self.pools.contains_key(&name) {
            return Err(DbError::Driver(format!(
                "Driver with name '{}' already registered",
                name
            )));
        }
        self.pools.insert(name, Arc::new(driver));
        Ok(())
    }

    /// Creates a `TransactionManager` for the default database.
    ///
    /// # Returns
    /// `Some(TransactionManager)` if the default driver is registered, otherwise `None`.
    pub fn manager(&self) -> Option<TransactionManager> {
        self.manager_by_name(DEFAULT_DB_NAME)
    }

    /// Creates a `TransactionManager` for the specified database by name.
    ///
    /// # Returns
    /// `Some(TransactionManager)` if a driver with `db_name` is registered, otherwise `None`.
    pub fn manager_by_name(&self, db_name: &str) -> Option<TransactionManager> {
        self.pools
            .get(db_name)
            .map(|v| TransactionManager::new(v.value().clone()))
    }
}
