//! Cascading filter selection over stage records.
//!
//! Levels cascade Function -> Level -> Country -> Source. The options offered
//! for a level come only from records matching every upstream selection, and
//! changing a level resets everything downstream of it.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::record::StageRecord;
use crate::funnel::{build_stage_list, StageDefinition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterLevel {
    Function,
    Level,
    Country,
    Source,
}

impl FilterLevel {
    pub const CASCADE: [FilterLevel; 4] = [
        FilterLevel::Function,
        FilterLevel::Level,
        FilterLevel::Country,
        FilterLevel::Source,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Level => "level",
            Self::Country => "country",
            Self::Source => "source",
        }
    }

    fn value_of<'a>(&self, record: &'a StageRecord) -> &'a str {
        match self {
            Self::Function => &record.function,
            Self::Level => &record.level,
            Self::Country => &record.country,
            Self::Source => &record.source,
        }
    }

    fn upstream(&self) -> &'static [FilterLevel] {
        match self {
            Self::Function => &[],
            Self::Level => &[Self::Function],
            Self::Country => &[Self::Function, Self::Level],
            Self::Source => &[Self::Function, Self::Level, Self::Country],
        }
    }
}

impl fmt::Display for FilterLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown filter level '{0}'")]
pub struct ParseFilterLevelError(pub String);

impl FromStr for FilterLevel {
    type Err = ParseFilterLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "function" => Ok(Self::Function),
            "level" => Ok(Self::Level),
            "country" => Ok(Self::Country),
            "source" => Ok(Self::Source),
            _ => Err(ParseFilterLevelError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSelection {
    #[serde(default)]
    pub function: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

impl FilterSelection {
    pub fn get(&self, level: FilterLevel) -> Option<&str> {
        match level {
            FilterLevel::Function => self.function.as_deref(),
            FilterLevel::Level => self.level.as_deref(),
            FilterLevel::Country => self.country.as_deref(),
            FilterLevel::Source => self.source.as_deref(),
        }
    }

    fn slot(&mut self, level: FilterLevel) -> &mut Option<String> {
        match level {
            FilterLevel::Function => &mut self.function,
            FilterLevel::Level => &mut self.level,
            FilterLevel::Country => &mut self.country,
            FilterLevel::Source => &mut self.source,
        }
    }

    /// Set `level` and reset every level downstream of it. Blank values clear
    /// the level.
    pub fn select(&mut self, level: FilterLevel, value: Option<&str>) {
        let value = value.map(str::trim).filter(|v| !v.is_empty());
        *self.slot(level) = value.map(str::to_string);
        for downstream in FilterLevel::CASCADE.iter().filter(|l| **l > level) {
            *self.slot(*downstream) = None;
        }
    }

    pub fn is_complete(&self) -> bool {
        FilterLevel::CASCADE.iter().all(|level| self.get(*level).is_some())
    }

    /// A record matches when it equals every selected level; unset levels
    /// match anything.
    pub fn matches(&self, record: &StageRecord) -> bool {
        self.matches_levels(record, &FilterLevel::CASCADE)
    }

    fn matches_levels(&self, record: &StageRecord, levels: &[FilterLevel]) -> bool {
        levels.iter().all(|level| {
            self.get(*level)
                .map_or(true, |selected| level.value_of(record) == selected)
        })
    }

    /// Fill unset levels top to bottom with the first available option.
    /// Selected values that no longer exist are replaced the same way.
    pub fn complete(&self, records: &[StageRecord]) -> FilterSelection {
        let mut resolved = FilterSelection::default();
        for level in FilterLevel::CASCADE {
            let options = options_for_level(records, &resolved, level);
            let chosen = self
                .get(level)
                .filter(|selected| options.iter().any(|option| option == selected))
                .map(str::to_string)
                .or_else(|| options.into_iter().next());
            *resolved.slot(level) = chosen;
        }
        resolved
    }
}

/// Distinct sorted values offered at every level given the current selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterOptions {
    pub function: Vec<String>,
    pub level: Vec<String>,
    pub country: Vec<String>,
    pub source: Vec<String>,
}

fn options_for_level(
    records: &[StageRecord],
    selection: &FilterSelection,
    level: FilterLevel,
) -> Vec<String> {
    let upstream = level.upstream();
    records
        .iter()
        .filter(|record| selection.matches_levels(record, upstream))
        .map(|record| level.value_of(record))
        .filter(|value| !value.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

pub fn filter_options(records: &[StageRecord], selection: &FilterSelection) -> FilterOptions {
    FilterOptions {
        function: options_for_level(records, selection, FilterLevel::Function),
        level: options_for_level(records, selection, FilterLevel::Level),
        country: options_for_level(records, selection, FilterLevel::Country),
        source: options_for_level(records, selection, FilterLevel::Source),
    }
}

pub fn filter_records<'a>(
    records: &'a [StageRecord],
    selection: &'a FilterSelection,
) -> impl Iterator<Item = &'a StageRecord> + 'a {
    records.iter().filter(move |record| selection.matches(record))
}

/// Ordered, order-deduplicated stage list for one selection.
pub fn stage_definitions(
    records: &[StageRecord],
    selection: &FilterSelection,
) -> Vec<StageDefinition> {
    build_stage_list(filter_records(records, selection).map(StageRecord::to_definition))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(function: &str, level: &str, country: &str, source: &str, order: u32) -> StageRecord {
        StageRecord {
            function: function.to_string(),
            level: level.to_string(),
            country: country.to_string(),
            source: source.to_string(),
            period: String::new(),
            stage: format!("Stage {order}"),
            order,
            ptr: 0.5,
        }
    }

    fn records() -> Vec<StageRecord> {
        vec![
            record("Sales", "L2", "Brazil", "Sourced", 1),
            record("Engineering", "L5", "US", "Referral", 1),
            record("Engineering", "L3", "Germany", "Inbound", 1),
            record("Engineering", "L3", "Germany", "Referral", 1),
            record("Engineering", "L3", "US", "Agency", 1),
        ]
    }

    #[test]
    fn options_cascade_from_upstream_selection() {
        let records = records();
        let mut selection = FilterSelection::default();
        selection.select(FilterLevel::Function, Some("Engineering"));
        selection.select(FilterLevel::Level, Some("L3"));

        let options = filter_options(&records, &selection);
        assert_eq!(options.function, vec!["Engineering", "Sales"]);
        assert_eq!(options.level, vec!["L3", "L5"]);
        assert_eq!(options.country, vec!["Germany", "US"]);
        assert_eq!(options.source, vec!["Agency", "Inbound", "Referral"]);
    }

    #[test]
    fn select_resets_downstream_levels() {
        let mut selection = FilterSelection {
            function: Some("Engineering".to_string()),
            level: Some("L3".to_string()),
            country: Some("Germany".to_string()),
            source: Some("Inbound".to_string()),
        };
        selection.select(FilterLevel::Level, Some("L5"));
        assert_eq!(selection.function.as_deref(), Some("Engineering"));
        assert_eq!(selection.level.as_deref(), Some("L5"));
        assert_eq!(selection.country, None);
        assert_eq!(selection.source, None);

        selection.select(FilterLevel::Function, Some("  "));
        assert_eq!(selection, FilterSelection::default());
    }

    #[test]
    fn complete_fills_first_options_and_replaces_stale_values() {
        let records = records();
        let partial = FilterSelection {
            function: Some("Engineering".to_string()),
            level: None,
            country: Some("Atlantis".to_string()),
            source: None,
        };
        let resolved = partial.complete(&records);
        assert_eq!(resolved.function.as_deref(), Some("Engineering"));
        assert_eq!(resolved.level.as_deref(), Some("L3"));
        assert_eq!(resolved.country.as_deref(), Some("Germany"));
        assert_eq!(resolved.source.as_deref(), Some("Inbound"));
        assert!(resolved.is_complete());
    }

    #[test]
    fn complete_on_empty_records_stays_unset() {
        let resolved = FilterSelection::default().complete(&[]);
        assert!(!resolved.is_complete());
        assert_eq!(resolved, FilterSelection::default());
    }

    #[test]
    fn filter_level_parses() {
        assert_eq!("Country".parse(), Ok(FilterLevel::Country));
        assert!("period".parse::<FilterLevel>().is_err());
    }
}
