use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::SimulationDefaults;
use crate::data::{
    filter_options, stage_definitions, FilterOptions, FilterSelection, RecordSnapshot,
};
use crate::funnel::{
    parse_numeric_input, sanitize_start, simulate, FunnelOutcome, ParseModeError,
    SimulationMode, SimulationParams, StageAdjustments, StageKey,
};
use crate::report::{simulate_all_combinations, CombinationSummary};

/// Everything a request handler reads: the record snapshot and the defaults
/// for omitted parameters.
#[derive(Debug, Clone)]
pub struct ApiContext {
    pub snapshot: RecordSnapshot,
    pub defaults: SimulationDefaults,
}

impl ApiContext {
    pub fn new(snapshot: RecordSnapshot, defaults: SimulationDefaults) -> Self {
        Self { snapshot, defaults }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid request body: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{0}")]
    Validation(String),
    #[error("failed to serialize response: {0}")]
    Serialize(serde_json::Error),
}

/// One override or sum edit as sent by the front-end. `value` is whatever the
/// input field held; non-numeric values mean "no value".
#[derive(Debug, Clone, Deserialize)]
pub struct StageEdit {
    pub order: u32,
    pub stage: String,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SimulateRequest {
    #[serde(default)]
    pub selection: FilterSelection,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub overrides: Vec<StageEdit>,
    #[serde(default)]
    pub sums: Vec<StageEdit>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulateResponse {
    pub status: &'static str,
    pub selection: FilterSelection,
    pub value: f64,
    #[serde(flatten)]
    pub outcome: FunnelOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct OptionsResponse {
    pub selection: FilterSelection,
    pub resolved: FilterSelection,
    pub options: FilterOptions,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportResponse {
    pub mode: SimulationMode,
    pub value: f64,
    pub combinations: Vec<CombinationSummary>,
}

/// Numbers and numeric strings; everything else is "no value".
pub fn json_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => parse_numeric_input(s),
        _ => None,
    }
}

fn edits_to_adjustments(edits: &[StageEdit]) -> StageAdjustments {
    edits
        .iter()
        .filter_map(|edit| {
            let key = StageKey::new(edit.order, edit.stage.clone());
            json_number(&edit.value).map(|value| (key, value))
        })
        .collect()
}

fn parse_mode(raw: Option<&str>, fallback: SimulationMode) -> Result<SimulationMode, ApiError> {
    match raw.map(str::trim).filter(|m| !m.is_empty()) {
        Some(mode) => mode
            .parse()
            .map_err(|err: ParseModeError| ApiError::Validation(err.to_string())),
        None => Ok(fallback),
    }
}

fn selection_from_query(query: &HashMap<String, String>) -> FilterSelection {
    let get = |key: &str| {
        query
            .get(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };
    FilterSelection {
        function: get("function"),
        level: get("level"),
        country: get("country"),
        source: get("source"),
    }
}

pub fn health_payload() -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&serde_json::json!({
        "status": "ok",
        "service": "funnelsim-api",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub fn records_payload(ctx: &ApiContext) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&ctx.snapshot)
}

pub fn options_payload(
    ctx: &ApiContext,
    query: &HashMap<String, String>,
) -> Result<String, serde_json::Error> {
    let records = &ctx.snapshot.records;
    let selection = selection_from_query(query);
    let resolved = selection.complete(records);
    let options = filter_options(records, &selection);
    serde_json::to_string_pretty(&OptionsResponse {
        selection,
        resolved,
        options,
    })
}

pub fn simulate_payload(ctx: &ApiContext, body: &str) -> Result<String, ApiError> {
    let request: SimulateRequest = if body.trim().is_empty() {
        SimulateRequest::default()
    } else {
        serde_json::from_str(body)?
    };

    let mode = parse_mode(request.mode.as_deref(), ctx.defaults.mode)?;
    let value = match request.value.as_ref() {
        None | Some(Value::Null) => ctx.defaults.value_for(mode),
        Some(raw) => json_number(raw).ok_or_else(|| {
            ApiError::Validation(format!("value must be numeric, got {raw}"))
        })?,
    };
    let value = sanitize_start(value);

    let records = &ctx.snapshot.records;
    let selection = request.selection.complete(records);
    let stages = stage_definitions(records, &selection);
    let overrides = edits_to_adjustments(&request.overrides);
    let sums = edits_to_adjustments(&request.sums);
    let outcome = simulate(&stages, SimulationParams::new(mode, value), &overrides, &sums);

    serde_json::to_string_pretty(&SimulateResponse {
        status: "ok",
        selection,
        value,
        outcome,
    })
    .map_err(ApiError::Serialize)
}

pub fn report_payload(
    ctx: &ApiContext,
    query: &HashMap<String, String>,
) -> Result<String, ApiError> {
    let mode = parse_mode(query.get("mode").map(String::as_str), ctx.defaults.mode)?;
    let value = match query.get("value").map(|v| v.trim()).filter(|v| !v.is_empty()) {
        Some(raw) => parse_numeric_input(raw).ok_or_else(|| {
            ApiError::Validation(format!("value must be numeric, got '{raw}'"))
        })?,
        None => ctx.defaults.value_for(mode),
    };
    let value = sanitize_start(value);

    let combinations =
        simulate_all_combinations(&ctx.snapshot.records, SimulationParams::new(mode, value));
    serde_json::to_string_pretty(&ReportResponse {
        mode,
        value,
        combinations,
    })
    .map_err(ApiError::Serialize)
}
