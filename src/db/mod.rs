//! Database layer
//!
//! Pool abstraction, embedded migrations, and repositories. The service
//! runs on SQLite by default (single-binary deployment) and on MySQL when
//! configured for larger installs; repositories dispatch on the driver.

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{create_pool, create_test_pool, DatabasePool, DynDatabasePool};
