//! One load run, end to end.
//!
//! `extract -> normalize -> deduplicate -> reconcile -> integrity` builds a
//! [`Snapshot`] without touching the store ([`Pipeline::prepare`]). The
//! snapshot is then loaded and validated ([`Pipeline::run`]).

use serde::Serialize;
use std::fmt;
use std::time::Instant;
use tracing::{info, info_span, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::dedupe::{deduplicate, drop_duplicates};
use crate::entity::Snapshot;
use crate::error::Result;
use crate::extract::read_extracts;
use crate::integrity::enforce;
use crate::loader::{BulkLoader, LoadSummary};
use crate::normalize::{normalize_customers, normalize_order_lines, normalize_orders, normalize_products};
use crate::reconcile::reconcile;
use crate::validate::{validate, Validation};
use crate::warehouse::{Table, Warehouse};

/// Row counts for one entity as it moves through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityCounts {
    pub table: Table,
    /// Data rows in the extract.
    pub read: usize,
    /// Rows identical in every column to an earlier row.
    pub exact_duplicates: usize,
    /// Rows dropped because an earlier, different row had the same identity.
    pub identity_conflicts: usize,
    /// Rows dropped for referencing a row outside the snapshot.
    pub orphans_dropped: usize,
    /// Rows ready to load.
    pub processed: usize,
    /// Rows written, once a load has happened.
    pub loaded: Option<usize>,
}

impl EntityCounts {
    fn new(table: Table, read: usize) -> Self {
        Self {
            table,
            read,
            exact_duplicates: 0,
            identity_conflicts: 0,
            orphans_dropped: 0,
            processed: 0,
            loaded: None,
        }
    }

    /// Rows left after both dedup passes.
    pub fn after_dedup(&self) -> usize {
        self.read - self.exact_duplicates - self.identity_conflicts
    }
}

/// What processing did to the extracts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessingSummary {
    pub entities: Vec<EntityCounts>,
    /// Order-detail rows whose natural key occurred more than once.
    pub duplicate_line_rows: usize,
    /// Natural keys merged into a single order line.
    pub merged_line_keys: usize,
    /// Orders stored with a null date.
    pub invalid_dates: usize,
}

impl ProcessingSummary {
    pub fn entity(&self, table: Table) -> Option<&EntityCounts> {
        self.entities.iter().find(|e| e.table == table)
    }
}

/// A snapshot ready to load and how it was produced.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub snapshot: Snapshot,
    pub summary: ProcessingSummary,
}

/// Everything a completed run reports.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    #[serde(flatten)]
    pub summary: ProcessingSummary,
    pub load: LoadSummary,
    pub validation: Validation,
    pub elapsed_ms: u64,
}

pub struct Pipeline {
    config: Config,
}

impl Pipeline {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Read and process the extracts. Nothing is written anywhere.
    pub fn prepare(&self) -> Result<Prepared> {
        let policy = &self.config.policy;
        let extracts = read_extracts(&self.config.source, self.config.delimiter_byte()?)?;

        let mut customer_counts = EntityCounts::new(Table::Customers, extracts.customers.len());
        let mut product_counts = EntityCounts::new(Table::Products, extracts.products.len());
        let mut order_counts = EntityCounts::new(Table::Orders, extracts.orders.len());
        let mut line_counts = EntityCounts::new(Table::OrderDetails, extracts.order_details.len());

        let customers = normalize_customers(extracts.customers)?;
        let products = normalize_products(extracts.products)?;
        let (orders, invalid_dates) = normalize_orders(extracts.orders)?;
        let line_items = normalize_order_lines(extracts.order_details)?;

        let (customers, exact, conflicts) = deduplicate(customers, policy.identity_conflicts)?;
        customer_counts.exact_duplicates = exact;
        customer_counts.identity_conflicts = conflicts;

        let (products, exact, conflicts) = deduplicate(products, policy.identity_conflicts)?;
        product_counts.exact_duplicates = exact;
        product_counts.identity_conflicts = conflicts;

        let (orders, exact, conflicts) = deduplicate(orders, policy.identity_conflicts)?;
        order_counts.exact_duplicates = exact;
        order_counts.identity_conflicts = conflicts;

        // Order lines sharing a natural key are merged, not resolved as conflicts.
        let line_items = drop_duplicates(line_items);
        line_counts.exact_duplicates = line_items.removed;
        let reconciled = reconcile(line_items.rows)?;

        let mut snapshot = Snapshot {
            customers,
            products,
            orders,
            order_lines: reconciled.lines,
        };
        let integrity = enforce(&mut snapshot, policy.orphans)?;
        order_counts.orphans_dropped = integrity.orphan_orders;
        line_counts.orphans_dropped = integrity.orphan_lines;

        let mut entities = vec![customer_counts, product_counts, order_counts, line_counts];
        for counts in &mut entities {
            counts.processed = snapshot.row_count(counts.table);
        }

        Ok(Prepared {
            snapshot,
            summary: ProcessingSummary {
                entities,
                duplicate_line_rows: reconciled.duplicate_rows,
                merged_line_keys: reconciled.merged_keys,
                invalid_dates,
            },
        })
    }

    /// Process the extracts, replace the store's contents and validate.
    pub fn run<W: Warehouse>(&self, store: &mut W) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let span = info_span!("run", %run_id);
        let _guard = span.enter();
        let start = Instant::now();

        info!(data_dir = %self.config.source.data_dir.display(), "Starting load");

        let loader = BulkLoader::from_config(&self.config.load)?;
        let Prepared {
            snapshot,
            mut summary,
        } = self.prepare()?;

        let load = loader.load(store, &snapshot)?;
        for counts in &mut summary.entities {
            counts.loaded = load
                .inserted
                .iter()
                .find(|t| t.table == counts.table)
                .map(|t| t.rows);
        }

        let expected: Vec<(Table, usize)> = Table::ALL
            .into_iter()
            .map(|table| (table, snapshot.row_count(table)))
            .collect();
        let validation = validate(store, &expected)?;
        if !validation.all_match() {
            warn!("Store row counts differ from the processed snapshot");
        }

        let elapsed_ms = start.elapsed().as_millis() as u64;
        info!(elapsed_ms, "Run finished");

        Ok(RunReport {
            run_id,
            summary,
            load,
            validation,
            elapsed_ms,
        })
    }
}

impl fmt::Display for ProcessingSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<14} {:>8} {:>10} {:>10} {:>8} {:>10} {:>8}",
            "table", "read", "exact_dup", "conflicts", "orphans", "processed", "loaded"
        )?;
        for e in &self.entities {
            let loaded = e
                .loaded
                .map(|n| n.to_string())
                .unwrap_or_else(|| "-".to_string());
            writeln!(
                f,
                "{:<14} {:>8} {:>10} {:>10} {:>8} {:>10} {:>8}",
                e.table.name(),
                e.read,
                e.exact_duplicates,
                e.identity_conflicts,
                e.orphans_dropped,
                e.processed,
                loaded
            )?;
        }
        writeln!(
            f,
            "order lines merged: {} duplicate rows across {} keys",
            self.duplicate_line_rows, self.merged_line_keys
        )?;
        write!(f, "orders with null date: {}", self.invalid_dates)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "run {}", self.run_id)?;
        writeln!(f, "{}", self.summary)?;

        let batches: Vec<String> = self
            .load
            .inserted
            .iter()
            .map(|t| format!("{} {}", t.table, t.batches))
            .collect();
        writeln!(f, "insert batches: {}", batches.join(", "))?;

        if self.validation.all_match() {
            writeln!(f, "validation: all row counts match")?;
        } else {
            for m in self.validation.mismatches() {
                writeln!(
                    f,
                    "validation: {} expected {} rows, found {}",
                    m.table, m.expected, m.actual
                )?;
            }
        }
        write!(f, "elapsed: {} ms", self.elapsed_ms)
    }
}
