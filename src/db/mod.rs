//! Database layer
//!
//! Database access for PetBeacon. Two backends are supported:
//! - SQLite (default, for single-binary deployment)
//! - MySQL (for larger deployments)
//!
//! The driver is selected once from configuration. Repositories resolve their
//! backend-specific implementation when they are constructed, so callers hold an
//! `Arc<dyn ...Repository>` and never branch on the backend themselves.

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
