//! End-to-end ingest: CSV on disk to a validated frame.

use std::io::Write;

use pretty_assertions::assert_eq;
use pricediff_core::config::{init_workspace_config, load_config, workspace_config_path};
use pricediff_core::data::{DataTable, DidFrame, SchemaOptions, min_table_date, outcome_candidates};
use pricediff_core::{DataError, FitError, ReportFormat};

const SALES: &str = "\
date,product_id,treatment,post,quantity_sold,revenue
2023-01-01,P1,1,0,10,100.0
2023-01-01,P2,0,0,12,110.5
2023-01-02,P1,1,0,NA,98.0
2023-02-01,P1,1,1,15,140.0
2023-02-01,P2,0,1,13,120.0
";

fn write_csv(dir: &tempfile::TempDir, name: &str, body: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(body.as_bytes()).unwrap();
    path
}

#[test]
fn load_sales_file_and_project_outcomes() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(&dir, "sales.csv", SALES);
    let table = DataTable::load(&path).unwrap();
    let options = SchemaOptions::default();

    assert_eq!(table.row_count(), 5);
    assert_eq!(
        outcome_candidates(&table, &options),
        vec!["quantity_sold".to_string(), "revenue".to_string()]
    );
    assert_eq!(
        min_table_date(&table, &options).map(|d| d.to_string()),
        Some("2023-01-01".to_string())
    );

    let quantity = DidFrame::from_table(&table, "quantity_sold", &options).unwrap();
    assert_eq!(quantity.len(), 4);
    assert_eq!(quantity.dropped_rows(), 1);

    let revenue = DidFrame::from_table(&table, "revenue", &options).unwrap();
    assert_eq!(revenue.len(), 5);
    assert_eq!(revenue.dropped_rows(), 0);
    assert_eq!(revenue.observations()[0].unit.as_deref(), Some("P1"));
}

#[test]
fn missing_file_is_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = DataTable::load(&dir.path().join("nope.csv")).unwrap_err();
    assert!(matches!(err, DataError::Read { .. }));
    assert!(err.to_string().contains("nope.csv"));
}

#[test]
fn header_only_file_cannot_be_fitted() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(&dir, "empty.csv", "date,treatment,post,y\n");
    let table = DataTable::load(&path).unwrap();
    assert!(table.is_empty());
    let err = DidFrame::from_table(&table, "y", &SchemaOptions::default()).unwrap_err();
    assert!(matches!(err, FitError::InvalidSchema { .. }));
}

#[test]
fn conflicting_unit_rows_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(
        &dir,
        "conflict.csv",
        "date,product_id,treatment,post,y\n2023-01-01,P1,1,0,3\n2023-01-01,P1,0,0,4\n",
    );
    let table = DataTable::load(&path).unwrap();
    let err = DidFrame::from_table(&table, "y", &SchemaOptions::default()).unwrap_err();
    assert!(err.to_string().contains("conflicting"));
}

#[test]
fn workspace_config_feeds_schema_options() {
    let dir = tempfile::tempdir().unwrap();
    let written = init_workspace_config(dir.path()).unwrap();
    assert_eq!(written, Some(workspace_config_path(dir.path())));

    std::fs::write(
        workspace_config_path(dir.path()),
        "[analysis]\nunit_column = \"store\"\ndate_formats = [\"%d.%m.%Y\"]\n\n[report]\nformat = \"markdown\"\n",
    )
    .unwrap();
    let config = load_config(Some(dir.path()), None, None).unwrap();
    assert_eq!(config.report.format, ReportFormat::Markdown);

    let options = SchemaOptions::from(&config.analysis);
    let path = write_csv(
        &dir,
        "stores.csv",
        "date,store,treatment,post,sales\n01.01.2023,S1,0,0,5\n01.02.2023,S1,0,1,6\n",
    );
    let table = DataTable::load(&path).unwrap();
    assert_eq!(outcome_candidates(&table, &options), vec!["sales".to_string()]);
    let frame = DidFrame::from_table(&table, "sales", &options).unwrap();
    assert_eq!(frame.min_date().map(|d| d.to_string()), Some("2023-01-01".to_string()));
}
