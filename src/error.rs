//! Error types for the sales load pipeline.
//!
//! Every fatal error carries the [`Phase`] it happened in so the top-level
//! diagnostic always names where the run stopped.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::warehouse::Table;

/// Pipeline phase a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Extract,
    Normalize,
    Deduplicate,
    Reconcile,
    Integrity,
    Delete,
    Insert,
    Validate,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Extract => "extract",
            Phase::Normalize => "normalize",
            Phase::Deduplicate => "deduplicate",
            Phase::Reconcile => "reconcile",
            Phase::Integrity => "integrity",
            Phase::Delete => "delete",
            Phase::Insert => "insert",
            Phase::Validate => "validate",
        };
        f.write_str(name)
    }
}

/// Main error type for load runs.
#[derive(Error, Debug)]
pub enum EtlError {
    /// Invalid or inconsistent configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Extract file could not be opened or read
    #[error("[{phase}] failed to read {}: {source}", path.display())]
    Io {
        phase: Phase,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Structurally broken CSV (bad quoting, wrong field count, ...)
    #[error("[extract] malformed CSV in {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// A required field could not be coerced to its declared type
    #[error("[normalize] {extract} line {line}: column '{column}' value {value:?} {reason}")]
    Malformed {
        extract: &'static str,
        line: u64,
        column: &'static str,
        value: String,
        reason: String,
    },

    /// Rows share an identity but differ elsewhere and the policy is to abort
    #[error("[deduplicate] {entity}: {count} row(s) share an identity with a different earlier row (first conflicting key: {sample})")]
    IdentityConflict {
        entity: &'static str,
        count: usize,
        sample: String,
    },

    /// Summed quantity for one order line no longer fits the column type
    #[error("[reconcile] quantity overflow merging order {order_id} product {product_id}")]
    QuantityOverflow { order_id: i64, product_id: i64 },

    /// Foreign-key references that point at rows absent from the snapshot
    #[error("[integrity] {0}")]
    Integrity(String),

    /// Store failure while deleting, inserting or counting
    #[error("[{phase}] store error on table {table}: {source}")]
    Store {
        phase: Phase,
        table: Table,
        #[source]
        source: diesel::result::Error,
    },

    /// Store failure outside of a single table (begin/commit)
    #[error("[{phase}] transaction error: {source}")]
    Transaction {
        phase: Phase,
        #[source]
        source: diesel::result::Error,
    },

    /// Connection pool could not hand out a connection
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// YAML configuration could not be parsed
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Report serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EtlError {
    /// Store error attributed to a phase and table.
    pub fn store(phase: Phase, table: Table, source: diesel::result::Error) -> Self {
        EtlError::Store {
            phase,
            table,
            source,
        }
    }

    /// Phase the error belongs to, if it is attributable to one.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            EtlError::Io { phase, .. }
            | EtlError::Store { phase, .. }
            | EtlError::Transaction { phase, .. } => Some(*phase),
            EtlError::Csv { .. } => Some(Phase::Extract),
            EtlError::Malformed { .. } => Some(Phase::Normalize),
            EtlError::IdentityConflict { .. } => Some(Phase::Deduplicate),
            EtlError::QuantityOverflow { .. } => Some(Phase::Reconcile),
            EtlError::Integrity(_) => Some(Phase::Integrity),
            EtlError::Config(_)
            | EtlError::Pool(_)
            | EtlError::Yaml(_)
            | EtlError::Json(_) => None,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, EtlError>;
