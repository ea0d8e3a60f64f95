//! Flux query responses in the plain (non-annotated) CSV dialect.
//!
//! A response is a sequence of tables. Each schema change is introduced by a
//! header row (`,result,table,...`); every data row carries its table id.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FluxRecord {
    pub table: usize,
    pub values: HashMap<String, String>,
}

impl FluxRecord {
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&str> {
        self.values.get(column).map(String::as_str)
    }

    #[must_use]
    pub fn get_i64(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(|v| v.parse().ok())
    }

    #[must_use]
    pub fn get_f64(&self, column: &str) -> Option<f64> {
        self.get(column).and_then(|v| v.parse().ok())
    }

    #[must_use]
    pub fn get_time(&self, column: &str) -> Option<DateTime<Utc>> {
        self.get(column)
            .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
            .map(|t| t.with_timezone(&Utc))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FluxTable {
    pub id: usize,
    pub records: Vec<FluxRecord>,
}

/// Flatten tables into a single row stream, preserving order.
#[must_use]
pub fn flatten(tables: &[FluxTable]) -> Vec<&FluxRecord> {
    tables.iter().flat_map(|t| t.records.iter()).collect()
}

/// Parse a Flux CSV response body into tables.
///
/// # Errors
///
/// Returns `AppError::Store` if the body is not valid CSV or reports a query error.
pub fn parse_flux_csv(body: &str) -> AppResult<Vec<FluxTable>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(body.as_bytes());

    let mut tables: Vec<FluxTable> = Vec::new();
    let mut header: Option<Vec<String>> = None;
    let mut error_header = false;

    for row in reader.records() {
        let row = row.map_err(|e| AppError::Store(format!("Invalid query response: {e}")))?;

        if row.get(0).is_some_and(|c| c.starts_with('#')) {
            continue;
        }
        // In-band errors: `,error,reference` followed by `,<message>,<code>`
        if row.get(1) == Some("error") {
            error_header = true;
            continue;
        }
        if error_header {
            return Err(AppError::Store(format!(
                "Query failed: {}",
                row.get(1).unwrap_or_default()
            )));
        }
        if row.get(1) == Some("result") && row.get(2) == Some("table") {
            header = Some(row.iter().map(str::to_string).collect());
            continue;
        }

        let Some(columns) = header.as_ref() else {
            return Err(AppError::Store("Query response has no header row".to_string()));
        };

        let values: HashMap<String, String> = columns
            .iter()
            .zip(row.iter())
            .filter(|(column, _)| !column.is_empty())
            .map(|(column, value)| (column.clone(), value.to_string()))
            .collect();

        let table = values
            .get("table")
            .and_then(|t| t.parse::<usize>().ok())
            .unwrap_or_default();

        let record = FluxRecord { table, values };
        match tables.last_mut() {
            Some(last) if last.id == table => last.records.push(record),
            _ => tables.push(FluxTable {
                id: table,
                records: vec![record],
            }),
        }
    }

    Ok(tables)
}
