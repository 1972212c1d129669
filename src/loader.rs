//! Full-refresh load of a processed snapshot.
//!
//! Deletes run children-first and inserts parents-first (see
//! [`crate::load_order`]). Every table is inserted in chunks of at most
//! `batch_size` rows, one multi-row INSERT per chunk. Each transactional
//! scope is committed on success and rolled back on every error path.

use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{LoadConfig, TransactionScope};
use crate::diesel_runtime::{max_batch_size, BulkInsert};
use crate::entity::Snapshot;
use crate::error::{EtlError, Phase, Result};
use crate::load_order::{delete_order, insert_order};
use crate::warehouse::{Table, Warehouse};

/// Rows written to one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableLoad {
    pub table: Table,
    pub rows: usize,
    pub batches: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    /// Rows removed per table, in delete order.
    pub deleted: Vec<(Table, usize)>,
    /// Rows inserted per table, in insert order.
    pub inserted: Vec<TableLoad>,
}

impl LoadSummary {
    pub fn batches(&self, table: Table) -> usize {
        self.inserted
            .iter()
            .find(|t| t.table == table)
            .map(|t| t.batches)
            .unwrap_or(0)
    }
}

/// Run `f` inside a transaction on `store`.
///
/// Commits when `f` succeeds. When `f` or the commit fails, the
/// transaction is rolled back and the original error returned.
pub fn with_transaction<W, T, F>(store: &mut W, phase: Phase, f: F) -> Result<T>
where
    W: Warehouse,
    F: FnOnce(&mut W) -> Result<T>,
{
    store
        .begin()
        .map_err(|source| EtlError::Transaction { phase, source })?;

    let outcome = f(store).and_then(|value| {
        store
            .commit()
            .map(|_| value)
            .map_err(|source| EtlError::Transaction { phase, source })
    });

    if let Err(err) = &outcome {
        warn!(%phase, error = %err, "Rolling back");
        if let Err(rollback_err) = store.rollback() {
            // A failed commit may already have ended the transaction.
            debug!(%phase, error = %rollback_err, "Rollback reported an error");
        }
    }

    outcome
}

/// Replaces the warehouse contents with a snapshot.
#[derive(Debug, Clone)]
pub struct BulkLoader {
    batch_size: usize,
    scope: TransactionScope,
}

impl BulkLoader {
    pub fn new(batch_size: usize, scope: TransactionScope) -> Result<Self> {
        let max = max_batch_size();
        if batch_size == 0 || batch_size > max {
            return Err(EtlError::Config(format!(
                "batch size must be between 1 and {}, got {}",
                max, batch_size
            )));
        }
        Ok(Self { batch_size, scope })
    }

    pub fn from_config(config: &LoadConfig) -> Result<Self> {
        Self::new(config.batch_size, config.transaction_scope)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Delete the four tables' contents and insert `snapshot`.
    pub fn load<W: Warehouse>(&self, store: &mut W, snapshot: &Snapshot) -> Result<LoadSummary> {
        let start = Instant::now();

        let summary = match self.scope {
            TransactionScope::Separate => {
                let deleted = with_transaction(store, Phase::Delete, |s| self.delete_all(s))?;
                let inserted =
                    with_transaction(store, Phase::Insert, |s| self.insert_all(s, snapshot))?;
                LoadSummary { deleted, inserted }
            }
            TransactionScope::Single => with_transaction(store, Phase::Insert, |s| {
                let deleted = self.delete_all(s)?;
                let inserted = self.insert_all(s, snapshot)?;
                Ok(LoadSummary { deleted, inserted })
            })?,
        };

        info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Load committed"
        );
        Ok(summary)
    }

    fn delete_all<W: Warehouse>(&self, store: &mut W) -> Result<Vec<(Table, usize)>> {
        let mut deleted = Vec::with_capacity(Table::ALL.len());
        for table in delete_order() {
            let rows = store
                .delete_all(table)
                .map_err(|e| EtlError::store(Phase::Delete, table, e))?;
            debug!(%table, rows, "Deleted previous rows");
            deleted.push((table, rows));
        }
        Ok(deleted)
    }

    fn insert_all<W: Warehouse>(&self, store: &mut W, snapshot: &Snapshot) -> Result<Vec<TableLoad>> {
        insert_order()
            .into_iter()
            .map(|table| match table {
                Table::Customers => self.insert_table(store, &snapshot.customers),
                Table::Products => self.insert_table(store, &snapshot.products),
                Table::Orders => self.insert_table(store, &snapshot.orders),
                Table::OrderDetails => self.insert_table(store, &snapshot.order_lines),
            })
            .collect()
    }

    /// Insert `rows` in chunks of `batch_size`, one statement per chunk.
    fn insert_table<W: Warehouse, R: BulkInsert>(&self, store: &mut W, rows: &[R]) -> Result<TableLoad> {
        let table = R::TABLE;
        let total_batches = rows.len().div_ceil(self.batch_size);
        let mut inserted = 0;

        for (index, chunk) in rows.chunks(self.batch_size).enumerate() {
            inserted += store
                .insert_batch(chunk)
                .map_err(|e| EtlError::store(Phase::Insert, table, e))?;
            debug!(
                %table,
                batch = index + 1,
                of = total_batches,
                rows = chunk.len(),
                "Inserted batch"
            );
        }

        info!(%table, rows = inserted, batches = total_batches, "Inserted table");
        Ok(TableLoad {
            table,
            rows: inserted,
            batches: total_batches,
        })
    }
}
