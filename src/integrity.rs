//! Referential completeness of a processed snapshot.
//!
//! Runs before any store mutation: every order must name a customer in the
//! snapshot and every order line must name an order and a product in it.

use std::collections::HashSet;
use tracing::warn;

use crate::config::OrphanPolicy;
use crate::entity::Snapshot;
use crate::error::{EtlError, Result};

/// Orphans found (and, under [`OrphanPolicy::Drop`], removed).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrityReport {
    pub orphan_orders: usize,
    pub orphan_lines: usize,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.orphan_orders == 0 && self.orphan_lines == 0
    }
}

const SAMPLE: usize = 5;

fn sample<T: std::fmt::Debug>(keys: &[T]) -> String {
    let shown: Vec<String> = keys.iter().take(SAMPLE).map(|k| format!("{:?}", k)).collect();
    if keys.len() > SAMPLE {
        format!("{}, ...", shown.join(", "))
    } else {
        shown.join(", ")
    }
}

/// Check the snapshot's foreign keys and apply `policy` to any orphans.
///
/// Under `Drop`, orders are pruned first so that lines pointing at a
/// pruned order are caught as orphans too.
pub fn enforce(snapshot: &mut Snapshot, policy: OrphanPolicy) -> Result<IntegrityReport> {
    let customer_ids: HashSet<i64> = snapshot.customers.iter().map(|c| c.customer_id).collect();
    let orphan_orders: Vec<(i64, i64)> = snapshot
        .orders
        .iter()
        .filter(|o| !customer_ids.contains(&o.customer_id))
        .map(|o| (o.order_id, o.customer_id))
        .collect();

    if !orphan_orders.is_empty() && policy == OrphanPolicy::Abort {
        return Err(EtlError::Integrity(format!(
            "{} order(s) reference a CustomerID not in customers; (OrderID, CustomerID): {}",
            orphan_orders.len(),
            sample(&orphan_orders)
        )));
    }
    snapshot
        .orders
        .retain(|o| customer_ids.contains(&o.customer_id));

    let order_ids: HashSet<i64> = snapshot.orders.iter().map(|o| o.order_id).collect();
    let product_ids: HashSet<i64> = snapshot.products.iter().map(|p| p.product_id).collect();
    let is_linked = |order_id: i64, product_id: i64| {
        order_ids.contains(&order_id) && product_ids.contains(&product_id)
    };
    let orphan_lines: Vec<(i64, i64)> = snapshot
        .order_lines
        .iter()
        .filter(|l| !is_linked(l.order_id, l.product_id))
        .map(|l| (l.order_id, l.product_id))
        .collect();

    if !orphan_lines.is_empty() && policy == OrphanPolicy::Abort {
        return Err(EtlError::Integrity(format!(
            "{} order line(s) reference an OrderID or ProductID not loaded; (OrderID, ProductID): {}",
            orphan_lines.len(),
            sample(&orphan_lines)
        )));
    }
    snapshot
        .order_lines
        .retain(|l| is_linked(l.order_id, l.product_id));

    let report = IntegrityReport {
        orphan_orders: orphan_orders.len(),
        orphan_lines: orphan_lines.len(),
    };
    if !report.is_clean() {
        warn!(
            orphan_orders = report.orphan_orders,
            orphan_lines = report.orphan_lines,
            "Dropped rows with dangling references"
        );
    }

    Ok(report)
}
