//! Schema validation and projection of a table onto one outcome column.

use crate::data::table::DataTable;
use crate::error::FitError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DATE_COLUMN: &str = "date";
pub const TREATMENT_COLUMN: &str = "treatment";
pub const POST_COLUMN: &str = "post";

/// Cell values read as a missing outcome.
const MISSING_TOKENS: &[&str] = &["", "NA", "N/A", "NaN", "nan", "null", "NULL", "None"];

/// One typed row of the analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub treatment: bool,
    pub post: bool,
    pub outcome: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// How to read the structural columns of a table.
#[derive(Debug, Clone)]
pub struct SchemaOptions {
    pub unit_column: String,
    pub date_formats: Vec<String>,
}

impl Default for SchemaOptions {
    fn default() -> Self {
        let analysis = crate::config::AnalysisConfig::default();
        Self {
            unit_column: analysis.unit_column,
            date_formats: analysis.date_formats,
        }
    }
}

impl From<&crate::config::AnalysisConfig> for SchemaOptions {
    fn from(config: &crate::config::AnalysisConfig) -> Self {
        Self {
            unit_column: config.unit_column.clone(),
            date_formats: config.date_formats.clone(),
        }
    }
}

impl SchemaOptions {
    /// Columns that can never be chosen as the outcome.
    pub fn reserved_columns(&self) -> [&str; 4] {
        [
            TREATMENT_COLUMN,
            POST_COLUMN,
            DATE_COLUMN,
            self.unit_column.as_str(),
        ]
    }

    pub fn is_reserved(&self, column: &str) -> bool {
        self.reserved_columns().contains(&column)
    }
}

/// A table validated and typed for one outcome column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DidFrame {
    outcome: String,
    observations: Vec<Observation>,
    dropped_rows: usize,
}

impl DidFrame {
    /// Validate `table` and project it onto `outcome`.
    ///
    /// Rows whose outcome cell is a missing-value token are dropped and
    /// counted. Every other problem is an error.
    pub fn from_table(
        table: &DataTable,
        outcome: &str,
        options: &SchemaOptions,
    ) -> Result<Self, FitError> {
        let date_idx = require_column(table, DATE_COLUMN)?;
        let treatment_idx = require_column(table, TREATMENT_COLUMN)?;
        let post_idx = require_column(table, POST_COLUMN)?;

        let outcome_idx = table
            .column_index(outcome)
            .ok_or_else(|| FitError::InvalidColumn {
                column: outcome.to_string(),
                available: table.columns().to_vec(),
            })?;
        if options.is_reserved(outcome) {
            return Err(FitError::schema(format!(
                "'{outcome}' is a structural column and cannot be the outcome"
            )));
        }

        let unit_idx = table.column_index(&options.unit_column);
        let mut observations = Vec::with_capacity(table.row_count());
        let mut dropped_rows = 0usize;

        for (idx, row) in table.rows().iter().enumerate() {
            let line = idx + 2;
            let date = parse_date(&row[date_idx], &options.date_formats).ok_or_else(|| {
                FitError::schema(format!(
                    "line {line}: '{}' in column '{DATE_COLUMN}' is not a date",
                    row[date_idx]
                ))
            })?;
            let treatment = parse_binary(&row[treatment_idx]).ok_or_else(|| {
                FitError::schema(format!(
                    "line {line}: '{}' in column '{TREATMENT_COLUMN}' is not 0 or 1",
                    row[treatment_idx]
                ))
            })?;
            let post = parse_binary(&row[post_idx]).ok_or_else(|| {
                FitError::schema(format!(
                    "line {line}: '{}' in column '{POST_COLUMN}' is not 0 or 1",
                    row[post_idx]
                ))
            })?;

            let cell = row[outcome_idx].as_str();
            if is_missing(cell) {
                dropped_rows += 1;
                continue;
            }
            let value = parse_number(cell).ok_or_else(|| {
                FitError::schema(format!(
                    "line {line}: '{cell}' in outcome column '{outcome}' is not numeric"
                ))
            })?;

            let unit = unit_idx
                .map(|i| row[i].clone())
                .filter(|u| !u.is_empty());
            observations.push(Observation {
                date,
                treatment,
                post,
                outcome: value,
                unit,
            });
        }

        if observations.is_empty() {
            return Err(FitError::schema(format!(
                "no rows with a value in outcome column '{outcome}'"
            )));
        }
        check_unit_consistency(&observations)?;

        if dropped_rows > 0 {
            tracing::warn!(
                outcome,
                dropped_rows,
                "dropped rows with missing outcome values"
            );
        }

        Ok(Self {
            outcome: outcome.to_string(),
            observations,
            dropped_rows,
        })
    }

    /// Build a frame directly from typed observations.
    pub fn from_observations(
        outcome: impl Into<String>,
        observations: Vec<Observation>,
    ) -> Result<Self, FitError> {
        if observations.is_empty() {
            return Err(FitError::schema("no observations"));
        }
        if let Some(bad) = observations.iter().find(|o| !o.outcome.is_finite()) {
            return Err(FitError::schema(format!(
                "outcome value {} on {} is not finite",
                bad.outcome, bad.date
            )));
        }
        check_unit_consistency(&observations)?;
        Ok(Self {
            outcome: outcome.into(),
            observations,
            dropped_rows: 0,
        })
    }

    pub fn outcome(&self) -> &str {
        &self.outcome
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn dropped_rows(&self) -> usize {
        self.dropped_rows
    }

    /// Earliest date present; the default intervention date.
    pub fn min_date(&self) -> Option<NaiveDate> {
        self.observations.iter().map(|o| o.date).min()
    }

    pub fn max_date(&self) -> Option<NaiveDate> {
        self.observations.iter().map(|o| o.date).max()
    }
}

/// Columns offered as outcome candidates, in table order.
pub fn outcome_candidates(table: &DataTable, options: &SchemaOptions) -> Vec<String> {
    table
        .columns()
        .iter()
        .filter(|c| !options.is_reserved(c))
        .cloned()
        .collect()
}

/// Earliest parseable value of the `date` column, if any.
pub fn min_table_date(table: &DataTable, options: &SchemaOptions) -> Option<NaiveDate> {
    let idx = table.column_index(DATE_COLUMN)?;
    table
        .column_values(idx)
        .filter_map(|v| parse_date(v, &options.date_formats))
        .min()
}

fn require_column(table: &DataTable, name: &str) -> Result<usize, FitError> {
    table.column_index(name).ok_or_else(|| {
        FitError::schema(format!(
            "required column '{name}' is missing (found: {})",
            table.columns().join(", ")
        ))
    })
}

/// Two rows for the same unit and date must agree on group and period.
fn check_unit_consistency(observations: &[Observation]) -> Result<(), FitError> {
    let mut seen: HashMap<(&str, NaiveDate), (bool, bool)> = HashMap::new();
    for obs in observations {
        let Some(unit) = obs.unit.as_deref() else {
            continue;
        };
        let flags = (obs.treatment, obs.post);
        if let Some(previous) = seen.insert((unit, obs.date), flags) {
            if previous != flags {
                return Err(FitError::schema(format!(
                    "unit '{unit}' has conflicting treatment/post values on {}",
                    obs.date
                )));
            }
        }
    }
    Ok(())
}

pub fn is_missing(cell: &str) -> bool {
    MISSING_TOKENS.contains(&cell.trim())
}

/// Parse a 0/1 indicator. Accepts integer, float and boolean spellings.
pub fn parse_binary(cell: &str) -> Option<bool> {
    let cell = cell.trim();
    if cell.eq_ignore_ascii_case("true") {
        return Some(true);
    }
    if cell.eq_ignore_ascii_case("false") {
        return Some(false);
    }
    match cell.parse::<f64>() {
        Ok(v) if v == 0.0 => Some(false),
        Ok(v) if v == 1.0 => Some(true),
        _ => None,
    }
}

/// Parse a finite number.
pub fn parse_number(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a calendar date with the given formats, then RFC 3339.
pub fn parse_date(cell: &str, formats: &[String]) -> Option<NaiveDate> {
    let cell = cell.trim();
    if cell.is_empty() {
        return None;
    }
    for fmt in formats {
        if let Ok(d) = NaiveDate::parse_from_str(cell, fmt) {
            return Some(d);
        }
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(cell, fmt) {
            return Some(dt.date());
        }
    }
    chrono::DateTime::parse_from_rfc3339(cell)
        .ok()
        .map(|dt| dt.date_naive())
}
