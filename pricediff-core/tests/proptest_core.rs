//! Property-based tests for table ingest and schema parsing.

use proptest::prelude::*;

use pricediff_core::data::schema::{is_missing, parse_binary, parse_date, parse_number};
use pricediff_core::data::{DataTable, DidFrame, SchemaOptions};

// --- Cell parsing properties ---

proptest! {
    #[test]
    fn finite_numbers_round_trip_through_text(v in -1e12f64..1e12) {
        let parsed = parse_number(&v.to_string()).unwrap();
        prop_assert_eq!(parsed, v);
        prop_assert!(!is_missing(&v.to_string()));
    }

    #[test]
    fn only_zero_and_one_are_binary(n in -100i64..100) {
        let parsed = parse_binary(&n.to_string());
        match n {
            0 => prop_assert_eq!(parsed, Some(false)),
            1 => prop_assert_eq!(parsed, Some(true)),
            _ => prop_assert_eq!(parsed, None),
        }
    }

    #[test]
    fn iso_dates_parse_with_default_formats(y in 1990i32..2100, m in 1u32..13, d in 1u32..29) {
        let formats = SchemaOptions::default().date_formats;
        let text = format!("{y:04}-{m:02}-{d:02}");
        let parsed = parse_date(&text, &formats).unwrap();
        prop_assert_eq!(parsed.to_string(), text);
    }
}

// --- Frame properties ---

proptest! {
    #[test]
    fn dropped_plus_kept_equals_rows(
        cells in prop::collection::vec(prop_oneof![
            (-1000i32..1000).prop_map(|v| v.to_string()),
            Just("NA".to_string()),
            Just(String::new()),
        ], 1..40)
    ) {
        let mut csv = String::from("date,treatment,post,y\n");
        for (i, cell) in cells.iter().enumerate() {
            csv.push_str(&format!("2023-01-{:02},{},{},{cell}\n", i % 28 + 1, i % 2, (i / 2) % 2));
        }
        let table = DataTable::from_reader(csv.as_bytes()).unwrap();
        let present = cells.iter().filter(|c| !is_missing(c)).count();
        match DidFrame::from_table(&table, "y", &SchemaOptions::default()) {
            Ok(frame) => {
                prop_assert_eq!(frame.len(), present);
                prop_assert_eq!(frame.len() + frame.dropped_rows(), table.row_count());
            }
            Err(_) => prop_assert_eq!(present, 0),
        }
    }
}
