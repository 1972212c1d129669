//! Post-load count validation.
//!
//! Compares each table's row count in the store against the size of the
//! processed collection that was loaded into it. A mismatch is logged and
//! reported; it does not fail the run.

use serde::Serialize;
use tracing::{info, warn};

use crate::error::{EtlError, Phase, Result};
use crate::warehouse::{Table, Warehouse};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableCount {
    pub table: Table,
    pub expected: usize,
    pub actual: i64,
    pub matches: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Validation {
    pub tables: Vec<TableCount>,
}

impl Validation {
    pub fn all_match(&self) -> bool {
        self.tables.iter().all(|t| t.matches)
    }

    pub fn mismatches(&self) -> impl Iterator<Item = &TableCount> {
        self.tables.iter().filter(|t| !t.matches)
    }
}

/// Row count of every table in the store.
pub fn count_tables<W: Warehouse>(store: &mut W) -> Result<Vec<(Table, i64)>> {
    Table::ALL
        .into_iter()
        .map(|table| {
            store
                .count(table)
                .map(|n| (table, n))
                .map_err(|e| EtlError::store(Phase::Validate, table, e))
        })
        .collect()
}

/// Compare store counts against `expected` row counts.
pub fn validate<W: Warehouse>(store: &mut W, expected: &[(Table, usize)]) -> Result<Validation> {
    let mut tables = Vec::with_capacity(expected.len());

    for &(table, expected) in expected {
        let actual = store
            .count(table)
            .map_err(|e| EtlError::store(Phase::Validate, table, e))?;
        let matches = usize::try_from(actual).is_ok_and(|n| n == expected);

        if matches {
            info!(%table, rows = actual, "Row count matches");
        } else {
            warn!(%table, expected, actual, "Row count mismatch");
        }

        tables.push(TableCount {
            table,
            expected,
            actual,
            matches,
        });
    }

    Ok(Validation { tables })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Customer;
    use crate::warehouse::MemoryWarehouse;

    fn customer(id: i64) -> Customer {
        Customer {
            customer_id: id,
            name: Some(format!("c{}", id)),
            email: String::new(),
            phone: String::new(),
        }
    }

    #[test]
    fn test_matching_counts() {
        let mut store = MemoryWarehouse::new();
        store.insert_batch(&[customer(1), customer(2)]).unwrap();

        let validation =
            validate(&mut store, &[(Table::Customers, 2), (Table::Orders, 0)]).unwrap();

        assert!(validation.all_match());
        assert_eq!(validation.tables[0].actual, 2);
    }

    #[test]
    fn test_mismatch_is_reported_not_raised() {
        let mut store = MemoryWarehouse::new();
        store.insert_batch(&[customer(1)]).unwrap();

        let validation = validate(&mut store, &[(Table::Customers, 3)]).unwrap();

        assert!(!validation.all_match());
        let mismatch: Vec<_> = validation.mismatches().collect();
        assert_eq!(mismatch.len(), 1);
        assert_eq!(mismatch[0].expected, 3);
        assert_eq!(mismatch[0].actual, 1);
    }

    #[test]
    fn test_count_tables_covers_all() {
        let mut store = MemoryWarehouse::new();
        store.insert_batch(&[customer(7)]).unwrap();

        let counts = count_tables(&mut store).unwrap();

        assert_eq!(counts.len(), 4);
        assert_eq!(counts[0], (Table::Customers, 1));
        assert_eq!(counts[3], (Table::OrderDetails, 0));
    }
}
