//! Merging order-detail rows that share a natural key.
//!
//! Rows are grouped by (OrderID, ProductID) and folded into one
//! [`OrderLine`] whose Quantity and TotalPrice are the sums over the group.
//! A missing Quantity or TotalPrice contributes zero; this is a policy
//! choice, so a single row with a missing amount is loaded as zero rather
//! than null.

use bigdecimal::{BigDecimal, Zero};
use indexmap::IndexMap;
use tracing::{debug, info};

use crate::entity::{LineItem, OrderLine};
use crate::error::{EtlError, Result};

/// Outcome of reconciling one order-detail row set.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    /// One row per natural key, in first-seen order.
    pub lines: Vec<OrderLine>,
    /// Input rows whose natural key occurs more than once.
    pub duplicate_rows: usize,
    /// Natural keys that had more than one row and were merged.
    pub merged_keys: usize,
}

#[derive(Debug)]
struct Accumulator {
    rows: usize,
    quantity: i64,
    total_price: BigDecimal,
}

impl Accumulator {
    fn new() -> Self {
        Self {
            rows: 0,
            quantity: 0,
            total_price: BigDecimal::zero(),
        }
    }
}

/// Group `items` by natural key and sum their amounts.
pub fn reconcile(items: Vec<LineItem>) -> Result<Reconciliation> {
    let mut groups: IndexMap<(i64, i64), Accumulator> = IndexMap::with_capacity(items.len());

    for item in items {
        let acc = groups
            .entry((item.order_id, item.product_id))
            .or_insert_with(Accumulator::new);

        acc.rows += 1;
        acc.quantity = acc
            .quantity
            .checked_add(item.quantity.unwrap_or(0))
            .ok_or(EtlError::QuantityOverflow {
                order_id: item.order_id,
                product_id: item.product_id,
            })?;
        if let Some(price) = item.total_price {
            acc.total_price += price;
        }
    }

    let mut duplicate_rows = 0;
    let mut merged_keys = 0;
    for ((order_id, product_id), acc) in &groups {
        if acc.rows > 1 {
            duplicate_rows += acc.rows;
            merged_keys += 1;
            debug!(order_id, product_id, rows = acc.rows, "Merging duplicate order line");
        }
    }

    info!(duplicate_rows, merged_keys, "Duplicate order lines found");

    let lines = groups
        .into_iter()
        .map(|((order_id, product_id), acc)| OrderLine {
            order_id,
            product_id,
            quantity: acc.quantity,
            total_price: acc.total_price,
        })
        .collect();

    Ok(Reconciliation {
        lines,
        duplicate_rows,
        merged_keys,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn item(order_id: i64, product_id: i64, quantity: Option<i64>, price: Option<&str>) -> LineItem {
        LineItem {
            order_id,
            product_id,
            quantity,
            total_price: price.map(dec),
        }
    }

    #[test]
    fn test_merges_duplicate_key() {
        let result = reconcile(vec![
            item(1, 5, Some(2), Some("20")),
            item(1, 5, Some(3), Some("30")),
        ])
        .unwrap();

        assert_eq!(
            result.lines,
            vec![OrderLine {
                order_id: 1,
                product_id: 5,
                quantity: 5,
                total_price: dec("50"),
            }]
        );
        assert_eq!(result.duplicate_rows, 2);
        assert_eq!(result.merged_keys, 1);
    }

    #[test]
    fn test_singletons_pass_through() {
        let result = reconcile(vec![
            item(1, 5, Some(2), Some("20.50")),
            item(1, 6, Some(1), Some("3.25")),
            item(2, 5, Some(4), Some("8")),
        ])
        .unwrap();

        assert_eq!(result.lines.len(), 3);
        assert_eq!(result.duplicate_rows, 0);
        assert_eq!(result.merged_keys, 0);
        assert_eq!(result.lines[0].total_price, dec("20.50"));
    }

    #[test]
    fn test_missing_amounts_count_as_zero() {
        let result = reconcile(vec![
            item(1, 5, None, Some("10.00")),
            item(1, 5, Some(4), None),
            item(1, 5, Some(1), Some("2.50")),
        ])
        .unwrap();

        assert_eq!(result.lines[0].quantity, 5);
        assert_eq!(result.lines[0].total_price, dec("12.50"));
        assert_eq!(result.duplicate_rows, 3);
    }

    #[test]
    fn test_single_row_with_missing_amounts_is_zero() {
        let result = reconcile(vec![item(3, 9, None, None)]).unwrap();

        assert_eq!(result.lines[0].quantity, 0);
        assert!(result.lines[0].total_price.is_zero());
    }

    #[test]
    fn test_sum_property_over_many_keys() {
        let mut items = Vec::new();
        for k in 0..20i64 {
            for i in 1..=(k % 4 + 1) {
                items.push(item(k / 5, k, Some(i), Some(&format!("{}.25", i))));
            }
        }

        let result = reconcile(items).unwrap();

        let keys: HashSet<_> = result.lines.iter().map(|l| (l.order_id, l.product_id)).collect();
        assert_eq!(keys.len(), result.lines.len());
        for line in &result.lines {
            let n = line.product_id % 4 + 1;
            assert_eq!(line.quantity, n * (n + 1) / 2);
            let expected = dec(&format!("{}", n * (n + 1) / 2)) + dec("0.25") * BigDecimal::from(n);
            assert_eq!(line.total_price, expected);
        }
    }

    #[test]
    fn test_quantity_overflow_is_error() {
        let err = reconcile(vec![
            item(1, 1, Some(i64::MAX), None),
            item(1, 1, Some(1), None),
        ])
        .unwrap_err();

        assert!(matches!(
            err,
            EtlError::QuantityOverflow {
                order_id: 1,
                product_id: 1
            }
        ));
    }

    #[test]
    fn test_empty_input() {
        let result = reconcile(Vec::new()).unwrap();
        assert!(result.lines.is_empty());
        assert_eq!(result.duplicate_rows, 0);
    }
}
