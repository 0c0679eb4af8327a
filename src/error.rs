//! Error taxonomy for table lookups, table loading, policy validation and
//! engine cross-checks
//!
//! Degenerate inputs to present-value functions (non-positive durations,
//! unsupported payment frequencies) are deliberately absent: they resolve to
//! sentinel values instead of errors.

use std::path::PathBuf;

use thiserror::Error;

use crate::mortality::{Sex, TableId};

/// A table query could not be answered
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LookupError {
    #[error("age {age} outside [0, {omega}] for table {table}")]
    AgeOutOfRange { age: i64, omega: u32, table: TableId },

    #[error("mortality table {0} is not loaded")]
    TableNotLoaded(TableId),

    #[error("unknown mortality table identifier '{0}'")]
    UnknownTable(String),

    #[error("unknown sex '{0}' (expected 'M' or 'F')")]
    UnknownSex(String),
}

/// A mortality table could not be made available
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read mortality table file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path} line {line}: {reason}")]
    MalformedRow {
        path: PathBuf,
        line: u64,
        reason: String,
    },

    #[error("table {table} has no row for age {age}")]
    MissingAge { table: TableId, age: u32 },

    #[error("table {table} ({sex}) age {age}: probability {qx} outside [0, 1]")]
    ProbabilityOutOfRange {
        table: TableId,
        sex: Sex,
        age: u32,
        qx: f64,
    },

    #[error("table {table} ({sex}): terminal qx must be exactly 1, found {qx}")]
    TerminalNotCertain { table: TableId, sex: Sex, qx: f64 },

    #[error("table {table} ({sex}): expected {expected} rates, found {found}")]
    WrongLength {
        table: TableId,
        sex: Sex,
        expected: usize,
        found: usize,
    },
}

/// Contract parameters rejected at the policy boundary
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolicyError {
    #[error("entry age {age} must lie strictly between 0 and {omega}")]
    EntryAge { age: u32, omega: u32 },

    #[error("contract term must not be negative, got {0}")]
    Term(i32),

    #[error("premium term {premium_term} must lie in [0, {term}]")]
    PremiumTerm { premium_term: i32, term: i32 },

    #[error("interest rate must be a finite non-negative number, got {0}")]
    Rate(f64),

    #[error("unsupported payment frequency {0} (expected 1, 2, 4 or 12)")]
    Frequency(u32),
}

/// The direct and commutation engines disagree beyond tolerance
#[derive(Debug, Clone, PartialEq, Error)]
#[error(
    "{function}({arguments}) diverges: direct {direct:.12}, commutation {commutation:.12}, relative error {relative_error:.3e}"
)]
pub struct EngineDivergence {
    pub function: &'static str,
    pub arguments: String,
    pub direct: f64,
    pub commutation: f64,
    pub relative_error: f64,
}

/// Umbrella error for valuation runs
#[derive(Debug, Error)]
pub enum ValuationError {
    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Divergence(#[from] EngineDivergence),

    #[error("cannot read configuration {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T, E = ValuationError> = std::result::Result<T, E>;
