//! In-memory warehouse.
//!
//! Enforces the same primary-key and foreign-key constraints as the SQL
//! schema, supports one level of transaction with full rollback, and keeps
//! a log of every operation so callers can inspect ordering and batching.

use diesel::result::{DatabaseErrorKind, Error as DieselError, QueryResult};
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashSet};

use super::{Table, Warehouse};
use crate::diesel_runtime::BulkInsert;
use crate::entity::RowKey;

/// One call made against the warehouse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Begin,
    Commit,
    Rollback,
    Delete(Table),
    Insert { table: Table, rows: usize },
}

#[derive(Debug, Clone)]
struct StoredRow {
    references: Vec<(Table, i64)>,
    value: serde_json::Value,
}

#[derive(Debug, Clone, Default)]
struct TableData {
    rows: Vec<StoredRow>,
    keys: HashSet<RowKey>,
}

type Tables = BTreeMap<Table, TableData>;

#[derive(Debug, Default)]
pub struct MemoryWarehouse {
    tables: Tables,
    saved: Option<Tables>,
    log: Vec<Operation>,
    fail_insert: Option<(Table, usize)>,
    fail_delete: Option<Table>,
    inserts_seen: BTreeMap<Table, usize>,
}

fn violation(kind: DatabaseErrorKind, message: String) -> DieselError {
    DieselError::DatabaseError(kind, Box::new(message))
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the `batch`-th insert (zero based) into `table` fail.
    pub fn fail_insert_at(mut self, table: Table, batch: usize) -> Self {
        self.fail_insert = Some((table, batch));
        self
    }

    /// Make any delete of `table` fail.
    pub fn fail_delete_of(mut self, table: Table) -> Self {
        self.fail_delete = Some(table);
        self
    }

    pub fn operations(&self) -> &[Operation] {
        &self.log
    }

    pub fn clear_operations(&mut self) {
        self.log.clear();
    }

    pub fn in_transaction(&self) -> bool {
        self.saved.is_some()
    }

    /// Row counts of every insert statement issued against `table`.
    pub fn insert_batches(&self, table: Table) -> Vec<usize> {
        self.log
            .iter()
            .filter_map(|op| match op {
                Operation::Insert { table: t, rows } if *t == table => Some(*rows),
                _ => None,
            })
            .collect()
    }

    /// Current contents of `table`, decoded as `T`.
    pub fn rows<T: DeserializeOwned>(&self, table: Table) -> QueryResult<Vec<T>> {
        self.tables
            .get(&table)
            .map(|data| data.rows.as_slice())
            .unwrap_or_default()
            .iter()
            .map(|row| {
                serde_json::from_value(row.value.clone())
                    .map_err(|e| DieselError::DeserializationError(Box::new(e)))
            })
            .collect()
    }

    fn contains(&self, table: Table, id: i64) -> bool {
        self.tables
            .get(&table)
            .is_some_and(|data| data.keys.contains(&RowKey::Id(id)))
    }
}

impl Warehouse for MemoryWarehouse {
    fn begin(&mut self) -> QueryResult<()> {
        if self.saved.is_some() {
            return Err(DieselError::AlreadyInTransaction);
        }
        self.saved = Some(self.tables.clone());
        self.log.push(Operation::Begin);
        Ok(())
    }

    fn commit(&mut self) -> QueryResult<()> {
        if self.saved.take().is_none() {
            return Err(DieselError::NotInTransaction);
        }
        self.log.push(Operation::Commit);
        Ok(())
    }

    fn rollback(&mut self) -> QueryResult<()> {
        let saved = self.saved.take().ok_or(DieselError::NotInTransaction)?;
        self.tables = saved;
        self.log.push(Operation::Rollback);
        Ok(())
    }

    fn delete_all(&mut self, table: Table) -> QueryResult<usize> {
        self.log.push(Operation::Delete(table));

        if self.fail_delete == Some(table) {
            return Err(violation(
                DatabaseErrorKind::Unknown,
                format!("injected failure deleting {}", table),
            ));
        }

        let referenced = self.tables.iter().any(|(other, data)| {
            *other != table
                && data
                    .rows
                    .iter()
                    .any(|row| row.references.iter().any(|(t, _)| *t == table))
        });
        if referenced {
            return Err(violation(
                DatabaseErrorKind::ForeignKeyViolation,
                format!("cannot delete from {}: rows in another table reference it", table),
            ));
        }

        let data = self.tables.remove(&table).unwrap_or_default();
        Ok(data.rows.len())
    }

    fn insert_batch<R: BulkInsert>(&mut self, rows: &[R]) -> QueryResult<usize> {
        let table = R::TABLE;
        if rows.is_empty() {
            return Ok(0);
        }
        self.log.push(Operation::Insert {
            table,
            rows: rows.len(),
        });

        let seen = self.inserts_seen.entry(table).or_insert(0);
        let batch = *seen;
        *seen += 1;
        if self.fail_insert == Some((table, batch)) {
            return Err(violation(
                DatabaseErrorKind::Unknown,
                format!("injected failure on {} batch {}", table, batch),
            ));
        }

        // Validate the whole statement before applying any of it.
        let existing = self
            .tables
            .get(&table)
            .map(|data| data.keys.clone())
            .unwrap_or_default();
        let mut staged = Vec::with_capacity(rows.len());
        let mut batch_keys = HashSet::with_capacity(rows.len());
        for row in rows {
            let key: RowKey = row.key().into();
            if existing.contains(&key) || !batch_keys.insert(key) {
                return Err(violation(
                    DatabaseErrorKind::UniqueViolation,
                    format!("duplicate key {} in {}", key, table),
                ));
            }
            let references = row.references();
            for (parent, id) in &references {
                if !self.contains(*parent, *id) {
                    return Err(violation(
                        DatabaseErrorKind::ForeignKeyViolation,
                        format!("{} row {} references missing {} {}", table, key, parent, id),
                    ));
                }
            }
            let value = serde_json::to_value(row)
                .map_err(|e| DieselError::SerializationError(Box::new(e)))?;
            staged.push(StoredRow {
                references,
                value,
            });
        }

        let data = self.tables.entry(table).or_default();
        data.keys.extend(batch_keys);
        data.rows.extend(staged);
        Ok(rows.len())
    }

    fn count(&mut self, table: Table) -> QueryResult<i64> {
        Ok(self
            .tables
            .get(&table)
            .map(|data| data.rows.len() as i64)
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Customer, Order};

    fn customer(id: i64) -> Customer {
        Customer {
            customer_id: id,
            name: None,
            email: String::new(),
            phone: String::new(),
        }
    }

    fn order(id: i64, customer_id: i64) -> Order {
        Order {
            order_id: id,
            customer_id,
            order_date: None,
        }
    }

    #[test]
    fn test_insert_and_count() {
        let mut store = MemoryWarehouse::new();
        store.insert_batch(&[customer(1), customer(2)]).unwrap();

        assert_eq!(store.count(Table::Customers).unwrap(), 2);
        assert_eq!(store.insert_batches(Table::Customers), vec![2]);

        let rows: Vec<Customer> = store.rows(Table::Customers).unwrap();
        assert_eq!(rows[1].customer_id, 2);
    }

    #[test]
    fn test_rejects_duplicate_primary_key() {
        let mut store = MemoryWarehouse::new();
        store.insert_batch(&[customer(1)]).unwrap();

        let err = store.insert_batch(&[customer(1)]).unwrap_err();
        assert!(matches!(
            err,
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)
        ));
        assert_eq!(store.count(Table::Customers).unwrap(), 1);
    }

    #[test]
    fn test_rejects_missing_parent() {
        let mut store = MemoryWarehouse::new();

        let err = store.insert_batch(&[order(10, 99)]).unwrap_err();
        assert!(matches!(
            err,
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _)
        ));
    }

    #[test]
    fn test_delete_blocked_while_referenced() {
        let mut store = MemoryWarehouse::new();
        store.insert_batch(&[customer(1)]).unwrap();
        store.insert_batch(&[order(10, 1)]).unwrap();

        assert!(store.delete_all(Table::Customers).is_err());
        assert_eq!(store.delete_all(Table::Orders).unwrap(), 1);
        assert_eq!(store.delete_all(Table::Customers).unwrap(), 1);
    }

    #[test]
    fn test_rollback_restores_tables() {
        let mut store = MemoryWarehouse::new();
        store.insert_batch(&[customer(1)]).unwrap();

        store.begin().unwrap();
        store.delete_all(Table::Customers).unwrap();
        assert_eq!(store.count(Table::Customers).unwrap(), 0);
        store.rollback().unwrap();

        assert_eq!(store.count(Table::Customers).unwrap(), 1);
        assert!(!store.in_transaction());
        assert!(matches!(store.commit(), Err(DieselError::NotInTransaction)));
    }

    #[test]
    fn test_nested_begin_is_rejected() {
        let mut store = MemoryWarehouse::new();
        store.begin().unwrap();
        assert!(matches!(
            store.begin(),
            Err(DieselError::AlreadyInTransaction)
        ));
    }

    #[test]
    fn test_injected_insert_failure() {
        let mut store = MemoryWarehouse::new().fail_insert_at(Table::Customers, 1);

        store.insert_batch(&[customer(1)]).unwrap();
        assert!(store.insert_batch(&[customer(2)]).is_err());
        assert_eq!(store.count(Table::Customers).unwrap(), 1);
    }
}
