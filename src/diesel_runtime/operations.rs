//! Multi-row INSERT for each warehouse record type.
//!
//! Each call issues exactly one `INSERT ... VALUES (..), (..), ...`
//! statement for the whole slice; callers are responsible for chunking.

use diesel::prelude::*;
use diesel::result::Error as DieselError;

use super::database::DbConnection;
use crate::entity::{Customer, Order, OrderLine, Product, Record};
use crate::schema::*;

/// MySQL's ceiling on bound parameters in a single prepared statement.
pub const MAX_BIND_PARAMS: usize = 65_535;

/// Widest target table, in columns. Bounds the rows per statement.
pub const MAX_COLUMNS: usize = 4;

/// A record type that can be written as one multi-row INSERT.
pub trait BulkInsert: Record + Sized {
    /// Number of bound parameters each row contributes.
    const COLUMNS: usize;

    fn bulk_insert(conn: &mut DbConnection, rows: &[Self]) -> Result<usize, DieselError>;
}

// ============================================================================
// Customer
// ============================================================================

impl BulkInsert for Customer {
    const COLUMNS: usize = 4;

    fn bulk_insert(conn: &mut DbConnection, rows: &[Self]) -> Result<usize, DieselError> {
        diesel::insert_into(customers::table)
            .values(rows)
            .execute(conn)
    }
}

// ============================================================================
// Product
// ============================================================================

impl BulkInsert for Product {
    const COLUMNS: usize = 4;

    fn bulk_insert(conn: &mut DbConnection, rows: &[Self]) -> Result<usize, DieselError> {
        diesel::insert_into(products::table)
            .values(rows)
            .execute(conn)
    }
}

// ============================================================================
// Order
// ============================================================================

impl BulkInsert for Order {
    const COLUMNS: usize = 3;

    fn bulk_insert(conn: &mut DbConnection, rows: &[Self]) -> Result<usize, DieselError> {
        diesel::insert_into(orders::table)
            .values(rows)
            .execute(conn)
    }
}

// ============================================================================
// OrderLine
// ============================================================================

impl BulkInsert for OrderLine {
    const COLUMNS: usize = 4;

    fn bulk_insert(conn: &mut DbConnection, rows: &[Self]) -> Result<usize, DieselError> {
        diesel::insert_into(order_details::table)
            .values(rows)
            .execute(conn)
    }
}

/// Largest batch size that keeps every table under [`MAX_BIND_PARAMS`].
pub fn max_batch_size() -> usize {
    MAX_BIND_PARAMS / MAX_COLUMNS
}
