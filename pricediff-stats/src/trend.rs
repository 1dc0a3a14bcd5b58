//! Pre-intervention trend aggregation for the parallel-trends check.
//!
//! The check is visual: this module only averages the outcome per
//! (date, group) before the intervention date. No smoothing, no test.

use chrono::NaiveDate;
use pricediff_core::data::DidFrame;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mean outcome for one (date, group) pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub treatment: bool,
    pub mean_outcome: f64,
    /// Rows averaged into this point.
    pub count: usize,
}

/// Pre-period series, ordered by date then group (control first).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSeries {
    pub outcome: String,
    pub cutoff: NaiveDate,
    pub points: Vec<TrendPoint>,
}

impl TrendSeries {
    /// Points of one group, in date order.
    pub fn group(&self, treatment: bool) -> impl Iterator<Item = &TrendPoint> {
        self.points.iter().filter(move |p| p.treatment == treatment)
    }

    /// Distinct dates covered by the series.
    pub fn dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self.points.iter().map(|p| p.date).collect();
        dates.dedup();
        dates
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Result of [`TrendInspector::aggregate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TrendOutcome {
    Series(TrendSeries),
    /// No row precedes the cutoff; skip the chart and warn.
    Empty { cutoff: NaiveDate },
}

impl TrendOutcome {
    pub fn series(&self) -> Option<&TrendSeries> {
        match self {
            TrendOutcome::Series(s) => Some(s),
            TrendOutcome::Empty { .. } => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, TrendOutcome::Empty { .. })
    }
}

/// Averages pre-intervention outcomes per date and group.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrendInspector;

impl TrendInspector {
    pub fn new() -> Self {
        Self
    }

    /// Keep rows with `date < cutoff` and average the outcome per (date, group).
    pub fn aggregate(&self, frame: &DidFrame, cutoff: NaiveDate) -> TrendOutcome {
        let mut cells: BTreeMap<(NaiveDate, bool), (f64, usize)> = BTreeMap::new();
        for obs in frame.observations().iter().filter(|o| o.date < cutoff) {
            let cell = cells.entry((obs.date, obs.treatment)).or_insert((0.0, 0));
            cell.0 += obs.outcome;
            cell.1 += 1;
        }

        if cells.is_empty() {
            tracing::warn!(%cutoff, outcome = frame.outcome(), "no rows before intervention date");
            return TrendOutcome::Empty { cutoff };
        }

        let points: Vec<TrendPoint> = cells
            .into_iter()
            .map(|((date, treatment), (sum, count))| TrendPoint {
                date,
                treatment,
                mean_outcome: sum / count as f64,
                count,
            })
            .collect();
        tracing::debug!(%cutoff, points = points.len(), "aggregated pre-period trend");

        TrendOutcome::Series(TrendSeries {
            outcome: frame.outcome().to_string(),
            cutoff,
            points,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use pricediff_core::data::Observation;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn obs(d: &str, treatment: bool, outcome: f64) -> Observation {
        Observation {
            date: date(d),
            treatment,
            post: d >= "2023-02-01",
            outcome,
            unit: None,
        }
    }

    fn frame() -> DidFrame {
        DidFrame::from_observations(
            "quantity_sold",
            vec![
                obs("2023-01-02", true, 9.0),
                obs("2023-01-01", false, 10.0),
                obs("2023-01-01", false, 12.0),
                obs("2023-01-01", true, 8.0),
                obs("2023-01-02", false, 11.0),
                obs("2023-02-01", false, 12.0),
                obs("2023-02-01", true, 14.0),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_cutoff_before_all_rows_is_empty() {
        let outcome = TrendInspector::new().aggregate(&frame(), date("2022-12-31"));
        assert!(outcome.is_empty());
        assert!(outcome.series().is_none());
        // Cutoff equal to the first date is still empty: the filter is strict.
        let outcome = TrendInspector::new().aggregate(&frame(), date("2023-01-01"));
        assert_eq!(
            outcome,
            TrendOutcome::Empty {
                cutoff: date("2023-01-01")
            }
        );
    }

    #[test]
    fn test_cutoff_after_all_rows_covers_every_pair() {
        let outcome = TrendInspector::new().aggregate(&frame(), date("2024-01-01"));
        let series = outcome.series().unwrap();
        // (01-01, C), (01-01, T), (01-02, C), (01-02, T), (02-01, C), (02-01, T)
        assert_eq!(series.len(), 6);
        assert_eq!(series.dates().len(), 3);
    }

    #[test]
    fn test_means_and_ordering() {
        let outcome = TrendInspector::new().aggregate(&frame(), date("2023-02-01"));
        let series = outcome.series().unwrap();
        let summary: Vec<(NaiveDate, bool, f64, usize)> = series
            .points
            .iter()
            .map(|p| (p.date, p.treatment, p.mean_outcome, p.count))
            .collect();
        assert_eq!(
            summary,
            vec![
                (date("2023-01-01"), false, 11.0, 2),
                (date("2023-01-01"), true, 8.0, 1),
                (date("2023-01-02"), false, 11.0, 1),
                (date("2023-01-02"), true, 9.0, 1),
            ]
        );
        assert_eq!(series.outcome, "quantity_sold");
        let treated: Vec<f64> = series.group(true).map(|p| p.mean_outcome).collect();
        assert_eq!(treated, vec![8.0, 9.0]);
    }
}
