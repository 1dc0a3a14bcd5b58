//! # pricediff Core
//!
//! Shared foundation for the pricediff workspace: layered configuration,
//! the error taxonomy, and the observation table with its schema checks.

pub mod config;
pub mod data;
pub mod error;

// Re-export commonly used types at the crate root.
pub use config::{PricediffConfig, ReportFormat, load_config};
pub use data::{DataTable, DidFrame, Observation, SchemaOptions};
pub use error::{ConfigError, DataError, FitError, PricediffError, Result};
