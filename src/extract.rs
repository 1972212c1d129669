//! Reading the four CSV extracts.
//!
//! Every field is read as optional text; typing and defaulting happen in
//! [`crate::normalize`] so malformed values can be reported with the line
//! they came from. Columns the row types do not name are ignored, and an
//! optional column may be absent from the header altogether.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

use crate::config::SourceConfig;
use crate::error::{EtlError, Phase, Result};

/// A raw row together with the 1-based line it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct Sourced<T> {
    pub line: u64,
    pub row: T,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawCustomer {
    #[serde(rename = "CustomerID", default)]
    pub customer_id: Option<String>,
    #[serde(rename = "Name", default)]
    pub name: Option<String>,
    #[serde(rename = "Email", default)]
    pub email: Option<String>,
    #[serde(rename = "Phone", default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawProduct {
    #[serde(rename = "ProductID", default)]
    pub product_id: Option<String>,
    #[serde(rename = "ProductName", default)]
    pub product_name: Option<String>,
    #[serde(rename = "Category", default)]
    pub category: Option<String>,
    #[serde(rename = "Price", default)]
    pub price: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawOrder {
    #[serde(rename = "OrderID", default)]
    pub order_id: Option<String>,
    #[serde(rename = "CustomerID", default)]
    pub customer_id: Option<String>,
    #[serde(rename = "OrderDate", default)]
    pub order_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawOrderLine {
    #[serde(rename = "OrderID", default)]
    pub order_id: Option<String>,
    #[serde(rename = "ProductID", default)]
    pub product_id: Option<String>,
    #[serde(rename = "Quantity", default)]
    pub quantity: Option<String>,
    #[serde(rename = "TotalPrice", default)]
    pub total_price: Option<String>,
}

/// The four extracts of one snapshot, unprocessed.
#[derive(Debug, Clone, Default)]
pub struct Extracts {
    pub customers: Vec<Sourced<RawCustomer>>,
    pub products: Vec<Sourced<RawProduct>>,
    pub orders: Vec<Sourced<RawOrder>>,
    pub order_details: Vec<Sourced<RawOrderLine>>,
}

/// Read all four extracts named by `source`.
pub fn read_extracts(source: &SourceConfig, delimiter: u8) -> Result<Extracts> {
    let extracts = Extracts {
        customers: read_extract(&source.customers_path(), delimiter)?,
        products: read_extract(&source.products_path(), delimiter)?,
        orders: read_extract(&source.orders_path(), delimiter)?,
        order_details: read_extract(&source.order_details_path(), delimiter)?,
    };

    info!(
        customers = extracts.customers.len(),
        products = extracts.products.len(),
        orders = extracts.orders.len(),
        order_details = extracts.order_details.len(),
        "Read extracts"
    );

    Ok(extracts)
}

/// Read one extract file.
pub fn read_extract<T: DeserializeOwned>(path: &Path, delimiter: u8) -> Result<Vec<Sourced<T>>> {
    let file = File::open(path).map_err(|source| EtlError::Io {
        phase: Phase::Extract,
        path: path.to_path_buf(),
        source,
    })?;
    let rows = read_rows(file, delimiter, path)?;
    debug!(path = %path.display(), rows = rows.len(), "Read extract");
    Ok(rows)
}

/// Read rows from any reader; `path` is only used in diagnostics.
pub fn read_rows<T, R>(reader: R, delimiter: u8, path: &Path) -> Result<Vec<Sourced<T>>>
where
    T: DeserializeOwned,
    R: Read,
{
    let csv_error = |source| EtlError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader.headers().map_err(csv_error)?.clone();
    let mut rows = Vec::new();
    let mut record = csv::StringRecord::new();

    while reader.read_record(&mut record).map_err(csv_error)? {
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let row: T = record.deserialize(Some(&headers)).map_err(csv_error)?;
        rows.push(Sourced { line, row });
    }

    Ok(rows)
}
