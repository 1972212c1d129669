//! Coercing raw extract rows into typed records.
//!
//! Identity and foreign-key columns must parse as integers or the run
//! aborts. Optional text columns get their defaults. Order dates that do
//! not parse become `None` and are counted, never rejected.

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::num::IntErrorKind;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::entity::{Customer, LineItem, Order, Product};
use crate::error::{EtlError, Result};
use crate::extract::{RawCustomer, RawOrder, RawOrderLine, RawProduct, Sourced};

/// Category given to products whose extract row has none.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Location of a value in an extract, for diagnostics.
#[derive(Debug, Clone, Copy)]
struct Field {
    extract: &'static str,
    line: u64,
    column: &'static str,
}

impl Field {
    fn malformed(&self, value: &str, reason: impl Into<String>) -> EtlError {
        EtlError::Malformed {
            extract: self.extract,
            line: self.line,
            column: self.column,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Largest decimal scale (or negative exponent) accepted in a numeric column.
const MAX_DECIMAL_SCALE: i64 = 64;

/// Parse an integer, accepting integral float spellings such as `"12.0"`.
///
/// Only `[+-]digits` optionally followed by `.` and zeros is accepted;
/// exponent notation is rejected.
fn parse_integer(field: Field, value: &str) -> Result<i64> {
    let (whole, fraction) = value.split_once('.').unwrap_or((value, ""));
    if !fraction.bytes().all(|b| b == b'0') {
        return Err(field.malformed(value, "is not a whole number"));
    }
    whole.parse::<i64>().map_err(|e| match e.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
            field.malformed(value, "is out of range")
        }
        _ => field.malformed(value, "is not an integer"),
    })
}

/// Parse an exact decimal whose scale stays within [`MAX_DECIMAL_SCALE`].
fn parse_decimal(field: Field, value: &str) -> Result<BigDecimal> {
    let decimal =
        BigDecimal::from_str(value).map_err(|_| field.malformed(value, "is not a number"))?;
    let (_, scale) = decimal.as_bigint_and_exponent();
    if scale.abs() > MAX_DECIMAL_SCALE {
        return Err(field.malformed(value, "has an exponent out of range"));
    }
    Ok(decimal)
}

/// A required integer column. Missing or empty is malformed.
fn required_id(field: Field, value: Option<&str>) -> Result<i64> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => parse_integer(field, v),
        None => Err(field.malformed("", "is required")),
    }
}

/// An optional integer column. Missing or empty is `None`.
fn optional_integer(field: Field, value: Option<&str>) -> Result<Option<i64>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => parse_integer(field, v).map(Some),
        None => Ok(None),
    }
}

/// An optional decimal column. Missing or empty is `None`.
fn optional_decimal(field: Field, value: Option<&str>) -> Result<Option<BigDecimal>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => parse_decimal(field, v).map(Some),
        None => Ok(None),
    }
}

fn text_or(value: Option<String>, default: &str) -> String {
    value
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Parse an order date. Anything unrecognised yields `None`.
pub fn parse_order_date(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}

pub fn normalize_customers(rows: Vec<Sourced<RawCustomer>>) -> Result<Vec<Customer>> {
    rows.into_iter()
        .map(|Sourced { line, row }| -> Result<Customer> {
            let field = |column: &'static str| Field {
                extract: "customers",
                line,
                column,
            };
            Ok(Customer {
                customer_id: required_id(field("CustomerID"), row.customer_id.as_deref())?,
                name: row.name.filter(|v| !v.is_empty()),
                email: text_or(row.email, ""),
                phone: text_or(row.phone, ""),
            })
        })
        .collect()
}

pub fn normalize_products(rows: Vec<Sourced<RawProduct>>) -> Result<Vec<Product>> {
    rows.into_iter()
        .map(|Sourced { line, row }| -> Result<Product> {
            let field = |column: &'static str| Field {
                extract: "products",
                line,
                column,
            };
            Ok(Product {
                product_id: required_id(field("ProductID"), row.product_id.as_deref())?,
                product_name: row.product_name.filter(|v| !v.is_empty()),
                category: text_or(row.category, UNKNOWN_CATEGORY),
                price: optional_decimal(field("Price"), row.price.as_deref())?,
            })
        })
        .collect()
}

/// Normalized orders plus the number of dates that could not be parsed.
pub fn normalize_orders(rows: Vec<Sourced<RawOrder>>) -> Result<(Vec<Order>, usize)> {
    let mut invalid_dates = 0;
    let mut orders = Vec::with_capacity(rows.len());

    for Sourced { line, row } in rows {
        let field = |column: &'static str| Field {
            extract: "orders",
            line,
            column,
        };
        let order_date = match row.order_date.as_deref() {
            Some(raw) => {
                let parsed = parse_order_date(raw);
                if parsed.is_none() {
                    invalid_dates += 1;
                    debug!(line, value = raw, "Unparseable OrderDate stored as null");
                }
                parsed
            }
            None => {
                invalid_dates += 1;
                None
            }
        };
        orders.push(Order {
            order_id: required_id(field("OrderID"), row.order_id.as_deref())?,
            customer_id: required_id(field("CustomerID"), row.customer_id.as_deref())?,
            order_date,
        });
    }

    if invalid_dates > 0 {
        warn!(invalid_dates, "Orders with missing or unparseable OrderDate");
    }

    Ok((orders, invalid_dates))
}

pub fn normalize_order_lines(rows: Vec<Sourced<RawOrderLine>>) -> Result<Vec<LineItem>> {
    rows.into_iter()
        .map(|Sourced { line, row }| -> Result<LineItem> {
            let field = |column: &'static str| Field {
                extract: "order_details",
                line,
                column,
            };
            Ok(LineItem {
                order_id: required_id(field("OrderID"), row.order_id.as_deref())?,
                product_id: required_id(field("ProductID"), row.product_id.as_deref())?,
                quantity: optional_integer(field("Quantity"), row.quantity.as_deref())?,
                total_price: optional_decimal(field("TotalPrice"), row.total_price.as_deref())?,
            })
        })
        .collect()
}
