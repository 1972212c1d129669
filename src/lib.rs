//! # salesload: sales warehouse loader
//!
//! Consolidates customer, product, order and order-line extracts from CSV
//! files into a relational warehouse.
//!
//! A run reads the four extracts, coerces them into typed records, removes
//! duplicate rows, merges order lines that share an (OrderID, ProductID)
//! key, checks referential completeness, and then replaces the warehouse
//! contents: deletes children-first, inserts parents-first, in bounded
//! multi-row batches inside transactions. Row counts are validated at the
//! end.
//!
//! ## Example
//!
//! ```ignore
//! use salesload::{Config, Database, Pipeline, SqlWarehouse};
//!
//! let config = Config::load("salesload.yaml")?;
//! let db = Database::new(config.database_url()?)?;
//! let mut conn = db.get_connection()?;
//!
//! let report = Pipeline::new(config)?.run(&mut SqlWarehouse::new(&mut conn))?;
//! println!("{}", report);
//! ```
//!
//! ## Features
//!
//! - `mysql` (default): load into MySQL / MariaDB
//! - `postgres`: load into PostgreSQL
//!
//! `mysql` takes precedence when both are enabled, so a PostgreSQL build
//! must drop the default: `cargo build --no-default-features --features postgres`.

// Records and their store schema
pub mod entity;
pub mod schema;

// Processing stages
pub mod extract;
pub mod normalize;
pub mod dedupe;
pub mod reconcile;
pub mod integrity;

// Loading
pub mod load_order;
pub mod loader;
pub mod validate;
pub mod warehouse;

// Diesel ORM runtime infrastructure
pub mod diesel_runtime;

pub mod config;
pub mod error;
pub mod pipeline;

// Re-export key types
pub use config::{Config, IdentityConflictPolicy, OrphanPolicy, TransactionScope};
pub use entity::{Customer, Entity, LineItem, Order, OrderLine, Product, Record, Snapshot};
pub use error::{EtlError, Phase, Result};
pub use loader::{BulkLoader, LoadSummary};
pub use pipeline::{Pipeline, Prepared, ProcessingSummary, RunReport};
pub use reconcile::{reconcile, Reconciliation};
pub use validate::{count_tables, validate, Validation};
pub use warehouse::{MemoryWarehouse, SqlWarehouse, Table, Warehouse};

// Re-export diesel_runtime types
pub use diesel_runtime::{BulkInsert, Database, DatabaseConfig};
