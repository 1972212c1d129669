//! Statically declared record types for the four warehouse entities.
//!
//! Rows move through three shapes: raw extract rows (see [`crate::extract`]),
//! typed records produced by the normalizer, and the reconciled
//! [`OrderLine`] that replaces [`LineItem`] once natural-key duplicates have
//! been merged.

use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;

use crate::schema::*;
use crate::warehouse::Table;

/// Key a record is unique by once processing is complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RowKey {
    Id(i64),
    Pair(i64, i64),
}

impl From<i64> for RowKey {
    fn from(id: i64) -> Self {
        RowKey::Id(id)
    }
}

impl From<(i64, i64)> for RowKey {
    fn from((a, b): (i64, i64)) -> Self {
        RowKey::Pair(a, b)
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowKey::Id(id) => write!(f, "{}", id),
            RowKey::Pair(a, b) => write!(f, "({}, {})", a, b),
        }
    }
}

/// Core trait for every processed row type.
///
/// Equality is full-row equality (every column), which is what the
/// structural deduplicator relies on; [`Entity::key`] is the identity
/// (or natural key) the store requires to be unique.
pub trait Entity: Clone + Eq + Hash {
    /// The name of this entity type, as used in logs and reports
    const NAME: &'static str;

    type Key: Copy + Eq + Hash + fmt::Debug + Into<RowKey>;

    fn key(&self) -> Self::Key;
}

/// An entity that is written to a warehouse table.
pub trait Record: Entity + Serialize {
    const TABLE: Table;

    /// Foreign keys held by this row as (referenced table, referenced id).
    fn references(&self) -> Vec<(Table, i64)> {
        Vec::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Insertable, Serialize, Deserialize)]
#[diesel(table_name = customers)]
pub struct Customer {
    pub customer_id: i64,
    pub name: Option<String>,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Insertable, Serialize, Deserialize)]
#[diesel(table_name = products)]
pub struct Product {
    pub product_id: i64,
    pub product_name: Option<String>,
    pub category: String,
    pub price: Option<BigDecimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Insertable, Serialize, Deserialize)]
#[diesel(table_name = orders)]
pub struct Order {
    pub order_id: i64,
    pub customer_id: i64,
    /// `None` when the extract held no parseable date.
    pub order_date: Option<NaiveDateTime>,
}

/// Normalized order-detail row before natural-key reconciliation.
///
/// Amounts stay optional here; missing values are only resolved (to zero)
/// when the reconciler folds a partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineItem {
    pub order_id: i64,
    pub product_id: i64,
    pub quantity: Option<i64>,
    pub total_price: Option<BigDecimal>,
}

/// Reconciled order line, unique by (order_id, product_id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Insertable, Serialize, Deserialize)]
#[diesel(table_name = order_details)]
pub struct OrderLine {
    pub order_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub total_price: BigDecimal,
}

impl Entity for Customer {
    const NAME: &'static str = "customers";
    type Key = i64;

    fn key(&self) -> i64 {
        self.customer_id
    }
}

impl Entity for Product {
    const NAME: &'static str = "products";
    type Key = i64;

    fn key(&self) -> i64 {
        self.product_id
    }
}

impl Entity for Order {
    const NAME: &'static str = "orders";
    type Key = i64;

    fn key(&self) -> i64 {
        self.order_id
    }
}

impl Entity for LineItem {
    const NAME: &'static str = "order_details";
    type Key = (i64, i64);

    fn key(&self) -> (i64, i64) {
        (self.order_id, self.product_id)
    }
}

impl Entity for OrderLine {
    const NAME: &'static str = "order_details";
    type Key = (i64, i64);

    fn key(&self) -> (i64, i64) {
        (self.order_id, self.product_id)
    }
}

impl Record for Customer {
    const TABLE: Table = Table::Customers;
}

impl Record for Product {
    const TABLE: Table = Table::Products;
}

impl Record for Order {
    const TABLE: Table = Table::Orders;

    fn references(&self) -> Vec<(Table, i64)> {
        vec![(Table::Customers, self.customer_id)]
    }
}

impl Record for OrderLine {
    const TABLE: Table = Table::OrderDetails;

    fn references(&self) -> Vec<(Table, i64)> {
        vec![
            (Table::Orders, self.order_id),
            (Table::Products, self.product_id),
        ]
    }
}

/// Fully processed row sets for one run, ready to be loaded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub customers: Vec<Customer>,
    pub products: Vec<Product>,
    pub orders: Vec<Order>,
    pub order_lines: Vec<OrderLine>,
}

impl Snapshot {
    /// Number of rows destined for a table.
    pub fn row_count(&self, table: Table) -> usize {
        match table {
            Table::Customers => self.customers.len(),
            Table::Products => self.products.len(),
            Table::Orders => self.orders.len(),
            Table::OrderDetails => self.order_lines.len(),
        }
    }
}
