//! Tabular input: CSV loading, schema validation, typed projection.

pub mod schema;
pub mod table;

pub use schema::{
    DATE_COLUMN, DidFrame, Observation, POST_COLUMN, SchemaOptions, TREATMENT_COLUMN,
    min_table_date, outcome_candidates,
};
pub use table::DataTable;
