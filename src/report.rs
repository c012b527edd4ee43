//! Batch report: every function/level/country/source combination in a record
//! set, simulated with the same parameters and no adjustments.

use std::collections::BTreeSet;

use rayon::prelude::*;
use serde::Serialize;

use crate::data::{stage_definitions, FilterSelection, StageRecord};
use crate::funnel::{simulate, FunnelWarning, SimulationParams, StageAdjustments};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinationSummary {
    pub function: String,
    pub level: String,
    pub country: String,
    pub source: String,
    pub stage_count: usize,
    pub total: Option<f64>,
    pub grand_sum: Option<f64>,
    pub warnings: Vec<FunnelWarning>,
}

/// Distinct (function, level, country, source) tuples, sorted.
pub fn combinations(records: &[StageRecord]) -> Vec<FilterSelection> {
    records
        .iter()
        .map(|record| {
            (
                record.function.as_str(),
                record.level.as_str(),
                record.country.as_str(),
                record.source.as_str(),
            )
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(|(function, level, country, source)| FilterSelection {
            function: Some(function.to_string()),
            level: Some(level.to_string()),
            country: Some(country.to_string()),
            source: Some(source.to_string()),
        })
        .collect()
}

/// One task per combination; output keeps the sorted combination order.
pub fn simulate_all_combinations(
    records: &[StageRecord],
    params: SimulationParams,
) -> Vec<CombinationSummary> {
    let empty = StageAdjustments::new();
    combinations(records)
        .into_par_iter()
        .map(|selection| {
            let stages = stage_definitions(records, &selection);
            let outcome = simulate(&stages, params, &empty, &empty);
            CombinationSummary {
                function: selection.function.unwrap_or_default(),
                level: selection.level.unwrap_or_default(),
                country: selection.country.unwrap_or_default(),
                source: selection.source.unwrap_or_default(),
                stage_count: outcome.stages.len(),
                total: outcome.total,
                grand_sum: outcome.grand_sum,
                warnings: outcome.warnings,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sample_records;
    use crate::funnel::SimulationMode;

    #[test]
    fn combinations_are_distinct_and_sorted() {
        let records = sample_records();
        let combos = combinations(&records);
        assert_eq!(combos.len(), 8);
        assert_eq!(combos[0].function.as_deref(), Some("Engineering"));
        assert_eq!(combos[7].function.as_deref(), Some("Sales"));
    }

    #[test]
    fn report_matches_individual_simulation() {
        let records = sample_records();
        let params = SimulationParams::new(SimulationMode::BottomUp, 5.0);
        let report = simulate_all_combinations(&records, params);
        assert_eq!(report.len(), 8);

        let first = &combinations(&records)[0];
        let empty = StageAdjustments::new();
        let direct = simulate(&stage_definitions(&records, first), params, &empty, &empty);
        assert_eq!(report[0].total, direct.total);
        assert_eq!(report[0].stage_count, 6);
        assert!(report.iter().all(|entry| entry.warnings.is_empty()));
    }
}
