//! Warehouse backed by a live diesel connection.

use diesel::connection::{AnsiTransactionManager, TransactionManager};
use diesel::prelude::*;
use diesel::result::QueryResult;

use super::{Table, Warehouse};
use crate::diesel_runtime::{BulkInsert, DbConnection};
use crate::schema::*;

/// Store handle borrowed for the length of one run.
///
/// The connection is passed in explicitly; the warehouse never opens or
/// reconfigures connections itself.
pub struct SqlWarehouse<'a> {
    conn: &'a mut DbConnection,
}

impl<'a> SqlWarehouse<'a> {
    pub fn new(conn: &'a mut DbConnection) -> Self {
        Self { conn }
    }
}

impl Warehouse for SqlWarehouse<'_> {
    fn begin(&mut self) -> QueryResult<()> {
        AnsiTransactionManager::begin_transaction(&mut *self.conn)
    }

    fn commit(&mut self) -> QueryResult<()> {
        AnsiTransactionManager::commit_transaction(&mut *self.conn)
    }

    fn rollback(&mut self) -> QueryResult<()> {
        AnsiTransactionManager::rollback_transaction(&mut *self.conn)
    }

    fn delete_all(&mut self, table: Table) -> QueryResult<usize> {
        match table {
            Table::Customers => diesel::delete(customers::table).execute(&mut *self.conn),
            Table::Products => diesel::delete(products::table).execute(&mut *self.conn),
            Table::Orders => diesel::delete(orders::table).execute(&mut *self.conn),
            Table::OrderDetails => diesel::delete(order_details::table).execute(&mut *self.conn),
        }
    }

    fn insert_batch<R: BulkInsert>(&mut self, rows: &[R]) -> QueryResult<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        R::bulk_insert(&mut *self.conn, rows)
    }

    fn count(&mut self, table: Table) -> QueryResult<i64> {
        match table {
            Table::Customers => customers::table.count().get_result(&mut *self.conn),
            Table::Products => products::table.count().get_result(&mut *self.conn),
            Table::Orders => orders::table.count().get_result(&mut *self.conn),
            Table::OrderDetails => order_details::table.count().get_result(&mut *self.conn),
        }
    }
}
