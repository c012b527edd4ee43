//! State owned by the presentation layer and threaded into the calculator on
//! every recomputation: filter selection, mode, starting parameters and the
//! override/sum maps.

use serde::Serialize;

use crate::data::{stage_definitions, FilterLevel, FilterSelection, StageRecord};
use crate::funnel::{
    parse_numeric_input, simulate, FunnelOutcome, SimulationMode, SimulationParams,
    StageAdjustments, StageKey,
};

pub const DEFAULT_STARTING_CANDIDATES: f64 = 100.0;
pub const DEFAULT_TARGET_HIRES: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationSession {
    selection: FilterSelection,
    mode: SimulationMode,
    starting_candidates: f64,
    target_hires: f64,
    overrides: StageAdjustments,
    sums: StageAdjustments,
}

impl Default for SimulationSession {
    fn default() -> Self {
        Self::new(
            SimulationMode::TopDown,
            DEFAULT_STARTING_CANDIDATES,
            DEFAULT_TARGET_HIRES,
        )
    }
}

impl SimulationSession {
    pub fn new(mode: SimulationMode, starting_candidates: f64, target_hires: f64) -> Self {
        Self {
            selection: FilterSelection::default(),
            mode,
            starting_candidates,
            target_hires,
            overrides: StageAdjustments::new(),
            sums: StageAdjustments::new(),
        }
    }

    pub fn mode(&self) -> SimulationMode {
        self.mode
    }

    pub fn selection(&self) -> &FilterSelection {
        &self.selection
    }

    pub fn overrides(&self) -> &StageAdjustments {
        &self.overrides
    }

    pub fn sums(&self) -> &StageAdjustments {
        &self.sums
    }

    pub fn starting_candidates(&self) -> f64 {
        self.starting_candidates
    }

    pub fn target_hires(&self) -> f64 {
        self.target_hires
    }

    /// Overrides and sums are mode-scoped: switching mode drops both.
    pub fn set_mode(&mut self, mode: SimulationMode) {
        if self.mode != mode {
            self.mode = mode;
            self.overrides.clear_all();
            self.sums.clear_all();
        }
    }

    /// Returns false and keeps the previous value when `raw` is not a number.
    pub fn set_starting_candidates(&mut self, raw: &str) -> bool {
        match parse_numeric_input(raw) {
            Some(value) => {
                self.starting_candidates = value;
                true
            }
            None => false,
        }
    }

    /// Returns false and keeps the previous value when `raw` is not a number.
    pub fn set_target_hires(&mut self, raw: &str) -> bool {
        match parse_numeric_input(raw) {
            Some(value) => {
                self.target_hires = value;
                true
            }
            None => false,
        }
    }

    pub fn edit_override(&mut self, key: StageKey, raw: &str) -> Option<f64> {
        self.overrides.apply_edit(key, raw)
    }

    pub fn edit_sum(&mut self, key: StageKey, raw: &str) -> Option<f64> {
        self.sums.apply_edit(key, raw)
    }

    pub fn select_filter(&mut self, level: FilterLevel, value: Option<&str>) {
        self.selection.select(level, value);
    }

    pub fn params(&self) -> SimulationParams {
        match self.mode {
            SimulationMode::TopDown => SimulationParams::TopDown {
                starting_candidates: self.starting_candidates,
            },
            SimulationMode::BottomUp => SimulationParams::BottomUp {
                target_hires: self.target_hires,
            },
        }
    }

    /// Compute against the given record snapshot. Unset filter levels
    /// resolve to their first available option.
    pub fn recompute(&self, records: &[StageRecord]) -> FunnelOutcome {
        let selection = self.selection.complete(records);
        let stages = stage_definitions(records, &selection);
        simulate(&stages, self.params(), &self.overrides, &self.sums)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sample_records;

    #[test]
    fn mode_switch_clears_overrides_and_sums() {
        let mut session = SimulationSession::default();
        session.edit_override(StageKey::new(2, "Recruiter Screen"), "30");
        session.edit_sum(StageKey::new(3, "Onsite"), "5");
        assert_eq!(session.overrides().len(), 1);

        session.set_mode(SimulationMode::TopDown);
        assert_eq!(session.overrides().len(), 1, "same mode keeps state");

        session.set_mode(SimulationMode::BottomUp);
        assert!(session.overrides().is_empty());
        assert!(session.sums().is_empty());
    }

    #[test]
    fn clearing_override_keeps_sum_for_same_key() {
        let mut session = SimulationSession::default();
        let key = StageKey::new(1, "Application Review");
        session.edit_override(key.clone(), "40");
        session.edit_sum(key.clone(), "3");

        session.edit_override(key.clone(), "");
        assert_eq!(session.overrides().get(&key), None);
        assert_eq!(session.sums().get(&key), Some(3.0));

        session.edit_sum(key.clone(), "not a number");
        assert_eq!(session.sums().get(&key), None);
    }

    #[test]
    fn invalid_parameter_text_keeps_previous_value() {
        let mut session = SimulationSession::default();
        assert!(session.set_starting_candidates("250"));
        assert!(!session.set_starting_candidates("lots"));
        assert_eq!(session.starting_candidates(), 250.0);
        assert!(!session.set_target_hires(""));
        assert_eq!(session.target_hires(), DEFAULT_TARGET_HIRES);
    }

    #[test]
    fn recompute_uses_first_options_for_unset_filters() {
        let records = sample_records();
        let session = SimulationSession::default();
        let outcome = session.recompute(&records);

        assert_eq!(outcome.stages.len(), 6);
        assert_eq!(outcome.stages[0].candidates, Some(100.0));
        // Engineering / L3 / Germany / Inbound: first stage PTR 0.35.
        assert_eq!(outcome.stages[0].result, Some(35.0));
    }

    #[test]
    fn recompute_is_stateless_across_snapshots() {
        let mut session = SimulationSession::default();
        session.select_filter(FilterLevel::Function, Some("Sales"));
        let full = session.recompute(&sample_records());
        let empty = session.recompute(&[]);
        let again = session.recompute(&sample_records());

        assert!(empty.is_empty());
        assert_eq!(full, again);
    }
}
