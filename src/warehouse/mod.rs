//! The relational store the pipeline writes into.
//!
//! [`Warehouse`] is the seam between the loader/validator and a concrete
//! store. [`SqlWarehouse`] drives a diesel connection; [`MemoryWarehouse`]
//! keeps tables in memory for dry runs and records every operation it sees.

pub mod memory;
pub mod sql;

pub use memory::{MemoryWarehouse, Operation};
pub use sql::SqlWarehouse;

use diesel::result::QueryResult;
use serde::Serialize;
use std::fmt;

use crate::diesel_runtime::BulkInsert;

/// The four target tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Customers,
    Products,
    Orders,
    OrderDetails,
}

impl Table {
    pub const ALL: [Table; 4] = [
        Table::Customers,
        Table::Products,
        Table::Orders,
        Table::OrderDetails,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Table::Customers => "customers",
            Table::Products => "products",
            Table::Orders => "orders",
            Table::OrderDetails => "order_details",
        }
    }

    /// Tables this table holds foreign keys into.
    pub fn dependencies(&self) -> Vec<Table> {
        match self {
            Table::Customers | Table::Products => Vec::new(),
            Table::Orders => vec![Table::Customers],
            Table::OrderDetails => vec![Table::Orders, Table::Products],
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Operations the loader and validator need from a store.
///
/// Transactions are flat: `begin` while one is open is an error.
pub trait Warehouse {
    fn begin(&mut self) -> QueryResult<()>;

    fn commit(&mut self) -> QueryResult<()>;

    fn rollback(&mut self) -> QueryResult<()>;

    /// Delete every row of `table`, returning the number removed.
    fn delete_all(&mut self, table: Table) -> QueryResult<usize>;

    /// Insert `rows` as a single multi-row statement.
    fn insert_batch<R: BulkInsert>(&mut self, rows: &[R]) -> QueryResult<usize>;

    fn count(&mut self, table: Table) -> QueryResult<i64>;
}
