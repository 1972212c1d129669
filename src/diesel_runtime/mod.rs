//! Diesel ORM runtime infrastructure
//!
//! Connection pooling plus the per-record bulk insert used by the SQL
//! warehouse.
//!
//! # Features
//!
//! - `mysql` (default): `DbConnection` is a `MysqlConnection`
//! - `postgres`: `DbConnection` is a `PgConnection`

pub mod database;
pub mod operations;

// Re-export key types
pub use database::{Database, DatabaseConfig, DbConnection, Pool, PooledConnection};
pub use operations::{max_batch_size, BulkInsert};
