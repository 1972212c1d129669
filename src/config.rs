//! Run configuration.
//!
//! Loaded from YAML, then overlaid with environment variables. Every field
//! has a default, so an empty document (or no file at all) is a valid
//! configuration.
//!
//! ```yaml
//! source:
//!   data_dir: data
//!   delimiter: ","
//! database:
//!   url: mysql://root@localhost/sales_db
//! load:
//!   batch_size: 10000
//!   transaction_scope: separate
//! policy:
//!   identity_conflicts: keep_first
//!   orphans: abort
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::diesel_runtime::{max_batch_size, DatabaseConfig};
use crate::error::{EtlError, Result};

/// Environment variable holding the database URL.
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// Environment variable overriding `load.batch_size`.
pub const BATCH_SIZE_ENV: &str = "SALESLOAD_BATCH_SIZE";

/// Rows per multi-row INSERT unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub source: SourceConfig,
    pub database: DatabaseSettings,
    pub load: LoadConfig,
    pub policy: PolicyConfig,
}

/// Where the four extracts live and how they are delimited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    pub data_dir: PathBuf,
    pub customers: String,
    pub products: String,
    pub orders: String,
    pub order_details: String,
    pub delimiter: char,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            customers: "customers.csv".to_string(),
            products: "products.csv".to_string(),
            orders: "orders.csv".to_string(),
            order_details: "order_details.csv".to_string(),
            delimiter: ',',
        }
    }
}

impl SourceConfig {
    pub fn customers_path(&self) -> PathBuf {
        self.data_dir.join(&self.customers)
    }

    pub fn products_path(&self) -> PathBuf {
        self.data_dir.join(&self.products)
    }

    pub fn orders_path(&self) -> PathBuf {
        self.data_dir.join(&self.orders)
    }

    pub fn order_details_path(&self) -> PathBuf {
        self.data_dir.join(&self.order_details)
    }
}

/// Connection endpoint plus pool tuning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    #[serde(flatten)]
    pub pool: DatabaseConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoadConfig {
    pub batch_size: usize,
    pub transaction_scope: TransactionScope,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            transaction_scope: TransactionScope::default(),
        }
    }
}

/// How the delete and insert phases are wrapped in transactions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionScope {
    /// Delete phase and insert phase each commit on their own.
    #[default]
    Separate,
    /// One transaction covers both phases.
    Single,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyConfig {
    pub identity_conflicts: IdentityConflictPolicy,
    pub orphans: OrphanPolicy,
}

/// What to do with rows that share an identity but differ in other columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityConflictPolicy {
    #[default]
    KeepFirst,
    Abort,
}

/// What to do with rows whose foreign keys point outside the snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrphanPolicy {
    #[default]
    Abort,
    Drop,
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            EtlError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), "Loaded configuration file");
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty document deserializes as unit, not as an empty map.
        if yaml.trim().is_empty() {
            return Ok(Config::default());
        }
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay `DATABASE_URL` and `SALESLOAD_BATCH_SIZE` from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(
            std::env::var(DATABASE_URL_ENV).ok(),
            std::env::var(BATCH_SIZE_ENV).ok(),
        )
    }

    /// Overlay externally supplied values. A URL only fills in a missing one;
    /// a batch size always wins.
    pub fn apply_overrides(
        &mut self,
        database_url: Option<String>,
        batch_size: Option<String>,
    ) -> Result<()> {
        if self.database.url.is_none() {
            self.database.url = database_url.filter(|url| !url.trim().is_empty());
        }
        if let Some(raw) = batch_size {
            self.load.batch_size = raw.trim().parse().map_err(|_| {
                EtlError::Config(format!("{} must be a positive integer, got {:?}", BATCH_SIZE_ENV, raw))
            })?;
        }
        self.validate()
    }

    /// The configured database URL, or a configuration error naming where to set it.
    pub fn database_url(&self) -> Result<&str> {
        self.database.url.as_deref().ok_or_else(|| {
            EtlError::Config(format!(
                "no database URL: set database.url, {} or --database-url",
                DATABASE_URL_ENV
            ))
        })
    }

    /// The delimiter as the single byte the CSV reader expects.
    pub fn delimiter_byte(&self) -> Result<u8> {
        let c = self.source.delimiter;
        if c.is_ascii() {
            Ok(c as u8)
        } else {
            Err(EtlError::Config(format!(
                "delimiter must be a single ASCII character, got {:?}",
                c
            )))
        }
    }

    pub fn validate(&self) -> Result<()> {
        let max = max_batch_size();
        if self.load.batch_size == 0 || self.load.batch_size > max {
            return Err(EtlError::Config(format!(
                "load.batch_size must be between 1 and {}, got {}",
                max, self.load.batch_size
            )));
        }
        self.delimiter_byte()?;
        if matches!(self.source.delimiter, '"' | '\n' | '\r') {
            return Err(EtlError::Config(format!(
                "delimiter {:?} is not usable",
                self.source.delimiter
            )));
        }
        if self.database.pool.max_connections == 0 {
            return Err(EtlError::Config(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        if self.database.pool.min_idle > self.database.pool.max_connections {
            return Err(EtlError::Config(
                "database.min_idle cannot exceed database.max_connections".to_string(),
            ));
        }
        Ok(())
    }
}
