//! Load stage records from JSON, CSV or spreadsheet exports. Falls back to the
//! bundled sample data when nothing usable is configured.

use std::path::Path;

use calamine::Reader;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::data::record::{normalize_header, normalize_row, SkippedRow, StageRecord};
use crate::data::sample::sample_records;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse JSON '{path}': {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
    #[error("failed to parse CSV '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("failed to open spreadsheet '{path}': {source}")]
    Spreadsheet {
        path: String,
        source: calamine::Error,
    },
    #[error("spreadsheet '{0}' has no worksheets")]
    NoWorksheet(String),
    #[error("unsupported stage-record format for '{0}' (expected .json, .csv, .xlsx, .xls or .ods)")]
    UnsupportedFormat(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Json,
    Csv,
    Spreadsheet,
}

impl SourceFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "json" => Some(Self::Json),
            "csv" => Some(Self::Csv),
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Some(Self::Spreadsheet),
            _ => None,
        }
    }
}

/// Records that survived normalization plus the rows that did not.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadReport {
    pub records: Vec<StageRecord>,
    pub skipped: Vec<SkippedRow>,
}

impl LoadReport {
    fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = Map<String, Value>>,
    {
        let mut report = Self::default();
        for (index, row) in rows.into_iter().enumerate() {
            match normalize_row(index + 1, &row) {
                Ok(record) => report.records.push(record),
                Err(skipped) => report.skipped.push(skipped),
            }
        }
        report
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RecordEnvelope {
    Rows(Vec<Value>),
    Records { records: Vec<Value> },
    Data { data: Vec<Value> },
}

pub fn load_stage_records(path: &Path) -> Result<LoadReport, SourceError> {
    let path_label = path.display().to_string();
    let report = match SourceFormat::from_path(path) {
        Some(SourceFormat::Json) => {
            let raw = std::fs::read_to_string(path).map_err(|source| SourceError::Read {
                path: path_label.clone(),
                source,
            })?;
            parse_json_records(&raw).map_err(|source| SourceError::Json {
                path: path_label.clone(),
                source,
            })?
        }
        Some(SourceFormat::Csv) => load_csv(path)?,
        Some(SourceFormat::Spreadsheet) => load_spreadsheet(path)?,
        None => return Err(SourceError::UnsupportedFormat(path_label)),
    };

    debug!(
        path = %path_label,
        records = report.records.len(),
        skipped = report.skipped.len(),
        "loaded stage records"
    );
    for skipped in &report.skipped {
        warn!(
            path = %path_label,
            row = skipped.row,
            reason = %skipped.reason,
            "skipped stage record"
        );
    }
    Ok(report)
}

/// Parse a JSON payload: a bare array, `{ "records": [...] }` or `{ "data": [...] }`.
pub fn parse_json_records(raw: &str) -> Result<LoadReport, serde_json::Error> {
    let rows = match serde_json::from_str::<RecordEnvelope>(raw)? {
        RecordEnvelope::Rows(rows) => rows,
        RecordEnvelope::Records { records } => records,
        RecordEnvelope::Data { data } => data,
    };

    let mut report = LoadReport::default();
    for (index, row) in rows.into_iter().enumerate() {
        let row_number = index + 1;
        let Value::Object(fields) = row else {
            report.skipped.push(SkippedRow {
                row: row_number,
                reason: "row is not an object".to_string(),
            });
            continue;
        };
        match normalize_row(row_number, &fields) {
            Ok(record) => report.records.push(record),
            Err(skipped) => report.skipped.push(skipped),
        }
    }
    Ok(report)
}

fn load_csv(path: &Path) -> Result<LoadReport, SourceError> {
    let csv_error = |source| SourceError::Csv {
        path: path.display().to_string(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(csv_error)?;
    let headers = reader.headers().map_err(csv_error)?.clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_error)?;
        let row: Map<String, Value> = headers
            .iter()
            .zip(record.iter())
            .map(|(header, cell)| (header.to_string(), Value::String(cell.to_string())))
            .collect();
        rows.push(row);
    }
    Ok(LoadReport::from_rows(rows))
}

fn cell_value(cell: &calamine::Data) -> Value {
    match cell {
        calamine::Data::Empty => Value::Null,
        calamine::Data::String(s) => Value::String(s.clone()),
        calamine::Data::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        calamine::Data::Int(i) => Value::from(*i),
        calamine::Data::Bool(b) => Value::Bool(*b),
        calamine::Data::DateTimeIso(s) | calamine::Data::DurationIso(s) => Value::String(s.clone()),
        other => Value::String(format!("{other:?}")),
    }
}

fn cell_header(cell: &calamine::Data) -> String {
    match cell_value(cell) {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Prefer a sheet named like "stages" or "funnel"; otherwise the first one.
fn pick_sheet(names: &[String]) -> Option<&String> {
    names
        .iter()
        .find(|name| {
            let normalized = normalize_header(name);
            normalized.contains("stage") || normalized.contains("funnel")
        })
        .or_else(|| names.first())
}

fn load_spreadsheet(path: &Path) -> Result<LoadReport, SourceError> {
    let path_label = path.display().to_string();
    let spreadsheet_error = |source| SourceError::Spreadsheet {
        path: path_label.clone(),
        source,
    };
    let mut workbook = calamine::open_workbook_auto(path).map_err(spreadsheet_error)?;
    let names = workbook.sheet_names();
    let sheet = pick_sheet(&names)
        .cloned()
        .ok_or_else(|| SourceError::NoWorksheet(path_label.clone()))?;
    let range = workbook.worksheet_range(&sheet).map_err(spreadsheet_error)?;

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Ok(LoadReport::default());
    };
    let headers: Vec<String> = header_row.iter().map(cell_header).collect();

    let body: Vec<Map<String, Value>> = rows
        .filter(|cells| cells.iter().any(|cell| !matches!(cell, calamine::Data::Empty)))
        .map(|cells| {
            headers
                .iter()
                .zip(cells.iter())
                .filter(|(header, _)| !header.is_empty())
                .map(|(header, cell)| (header.clone(), cell_value(cell)))
                .collect()
        })
        .collect();
    Ok(LoadReport::from_rows(body))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordOrigin {
    File { path: String },
    Sample { reason: Option<String> },
}

/// The record set the rest of the application computes against.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordSnapshot {
    pub origin: RecordOrigin,
    pub loaded_at: String,
    pub records: Vec<StageRecord>,
    pub skipped: Vec<SkippedRow>,
}

impl RecordSnapshot {
    pub fn sample(reason: Option<String>) -> Self {
        Self {
            origin: RecordOrigin::Sample { reason },
            loaded_at: now_stamp(),
            records: sample_records(),
            skipped: Vec::new(),
        }
    }

    pub fn from_report(path: impl Into<String>, report: LoadReport) -> Self {
        Self {
            origin: RecordOrigin::File { path: path.into() },
            loaded_at: now_stamp(),
            records: report.records,
            skipped: report.skipped,
        }
    }
}

fn now_stamp() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Load `path` if given; fall back to the sample records when the path is
/// absent, unreadable or yields no usable record.
pub fn load_snapshot(path: Option<&str>) -> RecordSnapshot {
    let Some(path) = path.filter(|p| !p.trim().is_empty()) else {
        info!("no stage-record source configured; using sample data");
        return RecordSnapshot::sample(None);
    };

    match load_stage_records(Path::new(path)) {
        Ok(report) if !report.records.is_empty() => {
            info!(path, records = report.records.len(), "stage records loaded");
            RecordSnapshot::from_report(path, report)
        }
        Ok(report) => {
            let reason = format!(
                "'{path}' contained no usable stage records ({} skipped)",
                report.skipped.len()
            );
            warn!(%reason, "falling back to sample data");
            RecordSnapshot::sample(Some(reason))
        }
        Err(err) => {
            warn!(error = %err, "falling back to sample data");
            RecordSnapshot::sample(Some(err.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_follows_extension() {
        assert_eq!(
            SourceFormat::from_path(Path::new("stages.JSON")),
            Some(SourceFormat::Json)
        );
        assert_eq!(
            SourceFormat::from_path(Path::new("a/b/stages.csv")),
            Some(SourceFormat::Csv)
        );
        assert_eq!(
            SourceFormat::from_path(Path::new("funnel.xlsx")),
            Some(SourceFormat::Spreadsheet)
        );
        assert_eq!(SourceFormat::from_path(Path::new("stages.txt")), None);
        assert_eq!(SourceFormat::from_path(Path::new("stages")), None);
    }

    #[test]
    fn parse_json_records_accepts_all_envelopes() {
        let row = r#"{"function":"Sales","level":"L2","country":"US","source":"Inbound","stage":"Screen","order":1,"ptr":0.5}"#;
        for raw in [
            format!("[{row}]"),
            format!("{{\"records\":[{row}]}}"),
            format!("{{\"data\":[{row}]}}"),
        ] {
            let report = parse_json_records(&raw).expect("envelope should parse");
            assert_eq!(report.records.len(), 1, "payload: {raw}");
            assert_eq!(report.records[0].period, "");
        }
    }

    #[test]
    fn parse_json_records_skips_non_objects() {
        let report = parse_json_records(r#"[1, {"stage":"Screen","order":1,"ptr":0.5}]"#)
            .expect("array should parse");
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].row, 1);
    }

    #[test]
    fn pick_sheet_prefers_stage_sheets() {
        let names = vec!["Readme".to_string(), "Funnel Stages".to_string()];
        assert_eq!(pick_sheet(&names).map(String::as_str), Some("Funnel Stages"));
        let names = vec!["Sheet1".to_string()];
        assert_eq!(pick_sheet(&names).map(String::as_str), Some("Sheet1"));
        assert_eq!(pick_sheet(&[]), None);
    }

    #[test]
    fn load_snapshot_without_path_uses_sample() {
        let snapshot = load_snapshot(None);
        assert_eq!(snapshot.origin, RecordOrigin::Sample { reason: None });
        assert!(!snapshot.records.is_empty());
    }

    #[test]
    fn load_snapshot_with_missing_file_falls_back() {
        let snapshot = load_snapshot(Some("definitely/not/here.csv"));
        match snapshot.origin {
            RecordOrigin::Sample { reason: Some(reason) } => {
                assert!(reason.contains("definitely/not/here.csv"))
            }
            other => panic!("expected sample fallback, got {other:?}"),
        }
    }
}
