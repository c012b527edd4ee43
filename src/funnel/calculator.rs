//! Funnel derivation: forward from a starting candidate pool (top-down) or
//! backward from a hiring target (bottom-up).
//!
//! The calculator is a pure function of its inputs. Overrides replace the
//! headline value at a stage; sum adjustments only feed the parallel `sum`
//! track and never change `candidates` or `result`.
//!
//! Sum accumulation is asymmetric between modes: top-down compounds the sum
//! track through every later PTR, bottom-up reports each stage's own result
//! plus its own adjustment.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::funnel::adjustments::StageAdjustments;
use crate::funnel::stage::{build_stage_list, StageDefinition};
use crate::funnel::warning::FunnelWarning;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SimulationMode {
    #[default]
    TopDown,
    BottomUp,
}

impl SimulationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TopDown => "top-down",
            Self::BottomUp => "bottom-up",
        }
    }
}

impl fmt::Display for SimulationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown simulation mode '{0}' (expected top-down or bottom-up)")]
pub struct ParseModeError(pub String);

impl FromStr for SimulationMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        match normalized.as_str() {
            "topdown" => Ok(Self::TopDown),
            "bottomup" => Ok(Self::BottomUp),
            _ => Err(ParseModeError(s.to_string())),
        }
    }
}

/// Mode plus its starting parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimulationParams {
    TopDown { starting_candidates: f64 },
    BottomUp { target_hires: f64 },
}

impl SimulationParams {
    pub fn new(mode: SimulationMode, value: f64) -> Self {
        match mode {
            SimulationMode::TopDown => Self::TopDown {
                starting_candidates: value,
            },
            SimulationMode::BottomUp => Self::BottomUp {
                target_hires: value,
            },
        }
    }

    pub fn mode(&self) -> SimulationMode {
        match self {
            Self::TopDown { .. } => SimulationMode::TopDown,
            Self::BottomUp { .. } => SimulationMode::BottomUp,
        }
    }

    pub fn value(&self) -> f64 {
        match self {
            Self::TopDown {
                starting_candidates,
            } => *starting_candidates,
            Self::BottomUp { target_hires } => *target_hires,
        }
    }
}

/// Per-stage output. `None` marks a value that cannot be derived (zero PTR on
/// a backward path, or a value past the `f64` range); it serializes as `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageResult {
    pub stage: String,
    pub order: u32,
    pub ptr: f64,
    pub candidates: Option<f64>,
    pub result: Option<f64>,
    pub is_override: bool,
    pub sum: Option<f64>,
}

impl StageResult {
    fn new(
        definition: &StageDefinition,
        candidates: Option<f64>,
        result: Option<f64>,
        is_override: bool,
        sum: Option<f64>,
    ) -> Self {
        Self {
            stage: definition.stage.clone(),
            order: definition.order,
            ptr: definition.ptr,
            candidates: candidates.map(round2),
            result: result.map(round2),
            is_override,
            sum: sum.map(round2),
        }
    }

    pub fn is_undefined(&self) -> bool {
        self.candidates.is_none() || self.result.is_none() || self.sum.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunnelOutcome {
    pub mode: SimulationMode,
    pub stages: Vec<StageResult>,
    /// Hires at the end of the funnel (top-down) or candidates required at
    /// its entrance (bottom-up).
    pub total: Option<f64>,
    /// Total of the per-stage `sum` column.
    pub grand_sum: Option<f64>,
    pub warnings: Vec<FunnelWarning>,
}

impl FunnelOutcome {
    pub fn empty(mode: SimulationMode) -> Self {
        Self {
            mode,
            stages: Vec::new(),
            total: None,
            grand_sum: None,
            warnings: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

/// Round to two decimals, the precision every displayed value carries.
/// Values too large to scale are returned unchanged.
pub fn round2(value: f64) -> f64 {
    let scaled = value * 100.0;
    if scaled.is_finite() {
        scaled.round() / 100.0
    } else {
        value
    }
}

/// Derive the funnel for `stages` under `params`.
///
/// `stages` is expected ascending by order without duplicate orders; other
/// input is normalized the same way [build_stage_list] does.
pub fn simulate(
    stages: &[StageDefinition],
    params: SimulationParams,
    overrides: &StageAdjustments,
    sums: &StageAdjustments,
) -> FunnelOutcome {
    let mode = params.mode();
    if stages.is_empty() {
        return FunnelOutcome::empty(mode);
    }

    let mut warnings = Vec::new();
    let stages = normalized_stages(stages, &mut warnings);
    let start = sanitize_start(params.value());

    let results = match mode {
        SimulationMode::TopDown => {
            let mut results = Vec::with_capacity(stages.len());
            forward_pass(
                &stages,
                Some(round2(start)),
                Some(start),
                overrides,
                sums,
                &mut results,
                &mut warnings,
            );
            results
        }
        SimulationMode::BottomUp => match overrides.first_applied(&stages) {
            None => backward_pass(&stages, Some(start), sums, &mut warnings),
            Some((anchor, value)) => {
                anchored_pass(&stages, anchor, value, overrides, sums, &mut warnings)
            }
        },
    };

    warnings.sort_by_key(FunnelWarning::order);
    finish(mode, results, warnings)
}

/// Starting pool or target; negative and non-finite values count as 0.
pub fn sanitize_start(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

fn normalized_stages<'a>(
    stages: &'a [StageDefinition],
    warnings: &mut Vec<FunnelWarning>,
) -> Cow<'a, [StageDefinition]> {
    let ordered = stages.windows(2).all(|pair| pair[0].order < pair[1].order);
    let finite = stages.iter().all(|definition| definition.ptr.is_finite());
    if ordered && finite {
        return Cow::Borrowed(stages);
    }

    let mut list = build_stage_list(stages.iter().cloned());
    for definition in &mut list {
        if !definition.ptr.is_finite() {
            warnings.push(FunnelWarning::NonFinitePassThroughRate {
                order: definition.order,
                stage: definition.stage.clone(),
            });
            definition.ptr = 0.0;
        }
    }
    Cow::Owned(list)
}

/// Drop non-finite values, warning once for the stage when any was dropped.
fn keep_finite<const N: usize>(
    definition: &StageDefinition,
    values: [Option<f64>; N],
    warnings: &mut Vec<FunnelWarning>,
) -> [Option<f64>; N] {
    if values.iter().flatten().any(|value| !value.is_finite()) {
        warnings.push(FunnelWarning::ValueOverflow {
            order: definition.order,
            stage: definition.stage.clone(),
        });
    }
    values.map(|value| value.filter(|v| v.is_finite()))
}

/// Top-down rule. `current` is the headline pool (rounded at assignment and
/// fed forward rounded); `current_sum` is the sum track, which keeps
/// compounding through PTRs and is only reset by an override. An undefined
/// value stays undefined until the next override.
fn forward_pass(
    stages: &[StageDefinition],
    mut current: Option<f64>,
    mut current_sum: Option<f64>,
    overrides: &StageAdjustments,
    sums: &StageAdjustments,
    results: &mut Vec<StageResult>,
    warnings: &mut Vec<FunnelWarning>,
) {
    for definition in stages {
        let adjustment = sums.value_for(definition).unwrap_or(0.0);
        let entering = current;
        let (result, sum, is_override) = match overrides.value_for(definition) {
            Some(value) => (Some(value), Some(value + adjustment), true),
            None => (
                current.map(|value| value * definition.ptr),
                current_sum.map(|value| value * definition.ptr + adjustment),
                false,
            ),
        };
        let [result, sum] = keep_finite(definition, [result, sum], warnings);
        current = result.map(round2);
        current_sum = sum;
        results.push(StageResult::new(definition, entering, result, is_override, sum));
    }
}

/// Bottom-up rule: walk backward from `target` as the last stage's result.
/// Returns results in ascending order.
fn backward_pass(
    stages: &[StageDefinition],
    target: Option<f64>,
    sums: &StageAdjustments,
    warnings: &mut Vec<FunnelWarning>,
) -> Vec<StageResult> {
    let mut results = Vec::with_capacity(stages.len() + 1);
    let mut target = target;
    for definition in stages.iter().rev() {
        let adjustment = sums.value_for(definition).unwrap_or(0.0);
        let needed = target.and_then(|value| required_candidates(definition, value, warnings));
        let [needed, sum] = keep_finite(
            definition,
            [needed, target.map(|value| value + adjustment)],
            warnings,
        );
        results.push(StageResult::new(definition, needed, target, false, sum));
        target = needed;
    }
    results.reverse();
    results
}

/// Bottom-up with overrides: the earliest override, `value` at
/// `anchor_index`, anchors the funnel. Stages before it are derived backward
/// from the anchor, stages after it forward.
fn anchored_pass(
    stages: &[StageDefinition],
    anchor_index: usize,
    value: f64,
    overrides: &StageAdjustments,
    sums: &StageAdjustments,
    warnings: &mut Vec<FunnelWarning>,
) -> Vec<StageResult> {
    let anchor = &stages[anchor_index];
    let adjustment = sums.value_for(anchor).unwrap_or(0.0);
    let entering = required_candidates(anchor, value, warnings);
    let [entering, sum] = keep_finite(anchor, [entering, Some(value + adjustment)], warnings);

    let mut results = backward_pass(&stages[..anchor_index], entering, sums, warnings);
    results.push(StageResult::new(anchor, entering, Some(value), true, sum));
    forward_pass(
        &stages[anchor_index + 1..],
        Some(round2(value)),
        sum,
        overrides,
        sums,
        &mut results,
        warnings,
    );
    results
}

/// Candidates needed to yield `target` at this stage. May be non-finite for
/// tiny PTRs; callers filter through [keep_finite].
fn required_candidates(
    definition: &StageDefinition,
    target: f64,
    warnings: &mut Vec<FunnelWarning>,
) -> Option<f64> {
    if definition.ptr == 0.0 {
        warnings.push(FunnelWarning::ZeroPassThroughRate {
            order: definition.order,
            stage: definition.stage.clone(),
        });
        return None;
    }
    Some(target / definition.ptr)
}

fn finish(
    mode: SimulationMode,
    stages: Vec<StageResult>,
    mut warnings: Vec<FunnelWarning>,
) -> FunnelOutcome {
    let total = match mode {
        SimulationMode::TopDown => stages.last().and_then(|stage| stage.result),
        SimulationMode::BottomUp => stages.first().and_then(|stage| stage.candidates),
    };
    let mut grand_sum = stages.iter().map(|stage| stage.sum).sum::<Option<f64>>();
    if grand_sum.is_some_and(|value| !value.is_finite()) {
        warnings.push(FunnelWarning::GrandSumOverflow);
        grand_sum = None;
    }

    FunnelOutcome {
        mode,
        stages,
        total,
        grand_sum: grand_sum.map(round2),
        warnings,
    }
}
