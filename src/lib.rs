pub(crate) mod context;
pub mod driver_manager;
pub mod error;
pub mod transaction;
pub mod udbc;

pub use driver_manager::TX;
pub use error::{BoxError, DbError, Result};
pub use transaction::TransactionManager;
