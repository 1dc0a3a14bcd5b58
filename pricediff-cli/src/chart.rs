//! Pre-treatment trend artifacts: a Vega-Lite chart spec and a CSV export.

use std::path::Path;

use pricediff_core::{DataError, PricediffError};
use pricediff_stats::TrendSeries;
use serde::Serialize;

const VEGA_LITE_SCHEMA: &str = "https://vega.github.io/schema/vega-lite/v5.json";

/// Vega-Lite line chart of mean outcome per date, one line per group.
#[derive(Debug, Clone, Serialize)]
pub struct TrendChart {
    #[serde(rename = "$schema")]
    pub schema: String,
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub data: ChartData,
    pub mark: ChartMark,
    pub encoding: ChartEncoding,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartData {
    pub values: Vec<ChartPoint>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartPoint {
    pub date: String,
    pub treatment: u8,
    pub mean: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartMark {
    #[serde(rename = "type")]
    pub kind: String,
    pub point: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartEncoding {
    pub x: Channel,
    pub y: Channel,
    pub color: Channel,
}

#[derive(Debug, Clone, Serialize)]
pub struct Channel {
    pub field: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
}

impl TrendChart {
    pub fn from_series(series: &TrendSeries) -> Self {
        let outcome = &series.outcome;
        let values = series
            .points
            .iter()
            .map(|p| ChartPoint {
                date: p.date.to_string(),
                treatment: u8::from(p.treatment),
                mean: p.mean_outcome,
                count: p.count,
            })
            .collect();
        Self {
            schema: VEGA_LITE_SCHEMA.to_string(),
            title: format!("Average {outcome} Over Time (Pre-Treatment)"),
            width: 600,
            height: 300,
            data: ChartData { values },
            mark: ChartMark {
                kind: "line".into(),
                point: true,
            },
            encoding: ChartEncoding {
                x: Channel {
                    field: "date".into(),
                    kind: "temporal".into(),
                    title: "Date".into(),
                },
                y: Channel {
                    field: "mean".into(),
                    kind: "quantitative".into(),
                    title: format!("Avg {outcome}"),
                },
                color: Channel {
                    field: "treatment".into(),
                    kind: "nominal".into(),
                    title: "treatment".into(),
                },
            },
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, PricediffError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write(&self, path: &Path) -> Result<(), PricediffError> {
        std::fs::write(path, self.to_json_pretty()?)?;
        Ok(())
    }
}

/// Write the series as `date,treatment,<outcome>,count`.
pub fn write_trend_csv<W: std::io::Write>(series: &TrendSeries, writer: W) -> Result<(), DataError> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(["date", "treatment", series.outcome.as_str(), "count"])?;
    for p in &series.points {
        out.write_record([
            p.date.to_string(),
            u8::from(p.treatment).to_string(),
            p.mean_outcome.to_string(),
            p.count.to_string(),
        ])?;
    }
    out.flush().map_err(csv::Error::from)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use pricediff_stats::TrendPoint;

    fn series() -> TrendSeries {
        let d = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        TrendSeries {
            outcome: "quantity_sold".into(),
            cutoff: d("2023-02-01"),
            points: vec![
                TrendPoint {
                    date: d("2023-01-01"),
                    treatment: false,
                    mean_outcome: 10.5,
                    count: 2,
                },
                TrendPoint {
                    date: d("2023-01-01"),
                    treatment: true,
                    mean_outcome: 8.0,
                    count: 1,
                },
            ],
        }
    }

    #[test]
    fn test_chart_titles() {
        let chart = TrendChart::from_series(&series());
        let json: serde_json::Value =
            serde_json::from_str(&chart.to_json_pretty().unwrap()).unwrap();
        assert_eq!(json["title"], "Average quantity_sold Over Time (Pre-Treatment)");
        assert_eq!(json["encoding"]["x"]["title"], "Date");
        assert_eq!(json["encoding"]["y"]["title"], "Avg quantity_sold");
        assert_eq!(json["encoding"]["color"]["field"], "treatment");
        assert_eq!(json["mark"]["type"], "line");
        assert_eq!(json["$schema"], VEGA_LITE_SCHEMA);
        assert_eq!(json["data"]["values"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_trend_csv() {
        let mut buf = Vec::new();
        write_trend_csv(&series(), &mut buf).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "date,treatment,quantity_sold,count\n2023-01-01,0,10.5,2\n2023-01-01,1,8,1\n"
        );
    }

    #[test]
    fn test_chart_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chart.json");
        TrendChart::from_series(&series()).write(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"$schema\""));
    }
}
