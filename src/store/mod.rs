//! Persistence layer — durable task rows with atomic conditional updates.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlStore;
pub use traits::TaskStore;
