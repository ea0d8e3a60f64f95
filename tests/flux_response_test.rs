//! Tests for Flux CSV response parsing.
//!
//! Run with: cargo test --test flux_response_test

use traffic_db::error::AppError;
use traffic_db::influx::response::{flatten, parse_flux_csv};

#[test]
fn splits_rows_into_tables() {
    let body = "\
,result,table,canton,_value\r
,_result,0,BE,3\r
,_result,1,ZH,5\r
,_result,1,ZH,2\r
";
    let tables = parse_flux_csv(body).unwrap();

    assert_eq!(tables.len(), 2);
    assert_eq!(tables[0].id, 0);
    assert_eq!(tables[0].records.len(), 1);
    assert_eq!(tables[1].records.len(), 2);
    assert_eq!(tables[0].records[0].get("canton"), Some("BE"));
    assert_eq!(tables[1].records[1].get_i64("_value"), Some(2));
    assert_eq!(flatten(&tables).len(), 3);
}

#[test]
fn handles_schema_changes_and_blank_lines() {
    let body = "\
,result,table,_time,stationId,_value\r
,_result,0,2024-03-01T10:00:00Z,CH:0002,1.5\r
\r
,result,table,_time,canton,value\r
,_result,1,2024-03-01T10:10:00Z,BE,4\r
";
    let tables = parse_flux_csv(body).unwrap();

    assert_eq!(tables.len(), 2);
    assert_eq!(tables[0].records[0].get_f64("_value"), Some(1.5));
    assert_eq!(tables[1].records[0].get("stationId"), None);
    assert_eq!(tables[1].records[0].get_i64("value"), Some(4));
    assert_eq!(
        tables[1].records[0].get_time("_time").unwrap().to_rfc3339(),
        "2024-03-01T10:10:00+00:00"
    );
}

#[test]
fn empty_body_has_no_tables() {
    assert!(parse_flux_csv("").unwrap().is_empty());
    assert!(parse_flux_csv("\r\n").unwrap().is_empty());
}

#[test]
fn annotation_rows_are_skipped() {
    let body = "\
#datatype,string,long,string,long\r
,result,table,canton,_value\r
,_result,0,BE,3\r
";
    let tables = parse_flux_csv(body).unwrap();
    assert_eq!(tables[0].records[0].get_i64("_value"), Some(3));
}

#[test]
fn in_band_error_is_a_store_error() {
    let body = ",error,reference\r\n,failed to initialize execute state,897\r\n";
    let err = parse_flux_csv(body).unwrap_err();
    assert!(matches!(err, AppError::Store(msg) if msg.contains("failed to initialize")));
}

#[test]
fn error_after_a_table_is_not_data() {
    let body = "\
,result,table,canton,_value\r
,_result,0,BE,3\r
\r
,error,reference\r
,panic: runtime error,897\r
";
    let err = parse_flux_csv(body).unwrap_err();
    assert!(matches!(err, AppError::Store(msg) if msg.contains("panic: runtime error")));
}

#[test]
fn data_before_header_is_rejected() {
    let err = parse_flux_csv(",_result,0,BE,3\r\n").unwrap_err();
    assert!(matches!(err, AppError::Store(_)));
}
