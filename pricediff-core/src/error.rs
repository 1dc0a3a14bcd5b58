//! Error types for the pricediff core library.
//!
//! Uses `thiserror` for public API error types with structured variants
//! covering model fitting, CSV input, and configuration.

use std::path::PathBuf;

/// Top-level error type for pricediff.
#[derive(Debug, thiserror::Error)]
pub enum PricediffError {
    #[error("Fit error: {0}")]
    Fit(#[from] FitError),

    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from validating a table and fitting the DiD model.
#[derive(Debug, thiserror::Error)]
pub enum FitError {
    #[error("No input table supplied")]
    MissingInput,

    #[error("Column '{column}' not found (available: {})", .available.join(", "))]
    InvalidColumn {
        column: String,
        available: Vec<String>,
    },

    #[error("Invalid schema: {reason}")]
    InvalidSchema { reason: String },

    #[error("Computation failed: {message}")]
    Computation { message: String },
}

impl FitError {
    pub fn schema(reason: impl Into<String>) -> Self {
        Self::InvalidSchema {
            reason: reason.into(),
        }
    }

    pub fn computation(message: impl Into<String>) -> Self {
        Self::Computation {
            message: message.into(),
        }
    }
}

/// Errors from reading tabular input.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Input has no header row")]
    EmptyInput,

    #[error("Row {line} has {found} cells, header has {expected}")]
    RaggedRow {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("Duplicate column name: {name}")]
    DuplicateColumn { name: String },
}

/// Errors from loading or writing configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Convenience result type for pricediff operations.
pub type Result<T> = std::result::Result<T, PricediffError>;
