//! Unified error types for the cdf workspace
//!
//! [`CdfError`] carries the failure taxonomy shared by the feature pipeline and
//! the aggregation query layer. Pipeline stages abort the whole run on any of
//! these; the query layer turns them into a structured error payload at its
//! boundary.
//!
//! Division by zero in ratio metrics has no variant here: it resolves to a
//! `NaN` sentinel.
//!
//! # Example
//!
//! ```ignore
//! use cdf_core::{CdfError, CdfResult};
//!
//! fn check_window(w: usize) -> CdfResult<()> {
//!     if w == 0 {
//!         return Err(CdfError::Config("window must be positive".into()));
//!     }
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Unified error type for all cdf operations.
#[derive(Error, Debug)]
pub enum CdfError {
    /// A row could not be assigned to a (region, resource_type) series.
    #[error("partition error: row {row} has a null {column}")]
    Partition { row: usize, column: &'static str },

    /// Windowing input was structurally invalid or non-numeric.
    #[error("feature computation error in partition {partition}: {message}")]
    FeatureComputation { partition: String, message: String },

    /// Unknown field or statistic in a query, or a malformed filter.
    #[error("aggregation error: {0}")]
    Aggregation(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// I/O errors (file access, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using CdfError.
pub type CdfResult<T> = Result<T, CdfError>;

impl CdfError {
    pub fn feature(partition: impl Into<String>, message: impl Into<String>) -> Self {
        CdfError::FeatureComputation {
            partition: partition.into(),
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for CdfError {
    fn from(err: anyhow::Error) -> Self {
        // Keep typed errors intact when they were wrapped with context upstream.
        match err.downcast::<CdfError>() {
            Ok(inner) => inner,
            Err(other) => CdfError::Other(format!("{other:#}")),
        }
    }
}

impl From<serde_json::Error> for CdfError {
    fn from(err: serde_json::Error) -> Self {
        CdfError::Parse(err.to_string())
    }
}

impl From<toml::de::Error> for CdfError {
    fn from(err: toml::de::Error) -> Self {
        CdfError::Parse(err.to_string())
    }
}

impl From<toml::ser::Error> for CdfError {
    fn from(err: toml::ser::Error) -> Self {
        CdfError::Other(err.to_string())
    }
}
