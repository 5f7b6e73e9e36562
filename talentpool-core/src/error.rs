//! Error types for loading and reporting
//!
//! Every variant is a guarded halt: the current report run stops and the
//! message is surfaced to the user. `NoMatchingRows` is the one expected,
//! informational halt; callers report it as a warning.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for core operations
pub type Result<T> = std::result::Result<T, DashboardError>;

#[derive(Error, Debug)]
pub enum DashboardError {
    /// Source export does not exist
    #[error("data file not found: {}", .0.display())]
    MissingFile(PathBuf),

    /// Source export could not be read
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV framing or encoding error
    #[error("failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    /// Header row lacks a column every report depends on
    #[error("required column missing from export: {0}")]
    MissingColumn(&'static str),

    /// File parsed but held no data rows
    #[error("the data file is empty or could not be processed")]
    EmptyTable,

    /// No INVITATIONDT value survived date coercion
    #[error("no valid INVITATIONDT values available in the data")]
    NoValidDates,

    /// Filters removed every row
    #[error("no data matches the current filter criteria")]
    NoMatchingRows,

    /// Filter parameters are inconsistent
    #[error("invalid filter: {0}")]
    InvalidFilter(String),
}

impl DashboardError {
    /// True for halts that should be reported as a warning rather than a failure
    pub fn is_informational(&self) -> bool {
        matches!(self, DashboardError::NoMatchingRows)
    }
}
