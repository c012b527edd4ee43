//! Stage records as delivered by the spreadsheet-backed source, and row
//! normalization shared by every loader.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::funnel::StageDefinition;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub function: String,
    pub level: String,
    pub country: String,
    pub source: String,
    #[serde(default)]
    pub period: String,
    pub stage: String,
    pub order: u32,
    pub ptr: f64,
}

impl StageRecord {
    pub fn to_definition(&self) -> StageDefinition {
        StageDefinition::new(self.stage.clone(), self.order, self.ptr)
    }
}

/// Why a source row could not become a [StageRecord].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRow {
    pub row: usize,
    pub reason: String,
}

/// Lowercase and drop spaces, underscores and dashes so `Stage Name`,
/// `stage_name` and `stageName` compare equal.
pub(crate) fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

const STAGE_HEADERS: &[&str] = &["stage", "stagename", "name"];
const ORDER_HEADERS: &[&str] = &["order", "stageorder", "step"];
const PTR_HEADERS: &[&str] = &["ptr", "passthroughrate", "passthrough", "rate"];

fn field<'a>(row: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    row.iter()
        .find(|(key, _)| names.contains(&normalize_header(key).as_str()))
        .map(|(_, value)| value)
}

fn text_field(row: &Map<String, Value>, names: &[&str]) -> String {
    match field(row, names) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Numbers, numeric strings and percent strings (`"45%"` -> 0.45).
pub(crate) fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if let Some(percent) = trimmed.strip_suffix('%') {
                percent.trim().parse::<f64>().ok().map(|p| p / 100.0)
            } else {
                trimmed.parse::<f64>().ok()
            }
        }
        _ => None,
    }
}

/// Turn one loosely-typed source row into a [StageRecord]. `row` is the
/// 1-based row number used in diagnostics.
pub fn normalize_row(row: usize, fields: &Map<String, Value>) -> Result<StageRecord, SkippedRow> {
    let skip = |reason: String| SkippedRow { row, reason };

    let stage = text_field(fields, STAGE_HEADERS);
    if stage.is_empty() {
        return Err(skip("missing stage name".to_string()));
    }

    let order = match field(fields, ORDER_HEADERS).and_then(numeric_value) {
        Some(order) if order >= 1.0 && order.fract() == 0.0 && order <= f64::from(u32::MAX) => {
            order as u32
        }
        Some(order) => return Err(skip(format!("order {order} is not an integer >= 1"))),
        None => return Err(skip("missing or non-numeric order".to_string())),
    };

    let ptr = match field(fields, PTR_HEADERS).and_then(numeric_value) {
        Some(ptr) if ptr.is_finite() && ptr >= 0.0 => ptr,
        Some(ptr) => return Err(skip(format!("ptr {ptr} is not a finite value >= 0"))),
        None => return Err(skip("missing or non-numeric ptr".to_string())),
    };

    Ok(StageRecord {
        function: text_field(fields, &["function"]),
        level: text_field(fields, &["level"]),
        country: text_field(fields, &["country"]),
        source: text_field(fields, &["source"]),
        period: text_field(fields, &["period"]),
        stage,
        order,
        ptr,
    })
}
