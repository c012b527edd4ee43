use std::fmt;

use serde::{Deserialize, Serialize};

/// One step of a hiring funnel: candidates entering it are multiplied by `ptr`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDefinition {
    pub stage: String,
    pub order: u32,
    pub ptr: f64,
}

impl StageDefinition {
    pub fn new(stage: impl Into<String>, order: u32, ptr: f64) -> Self {
        Self {
            stage: stage.into(),
            order,
            ptr,
        }
    }

    pub fn key(&self) -> StageKey {
        StageKey::new(self.order, self.stage.clone())
    }
}

/// Address of a stage for overrides and sum adjustments: `(order, stage name)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StageKey {
    pub order: u32,
    pub stage: String,
}

impl StageKey {
    pub fn new(order: u32, stage: impl Into<String>) -> Self {
        Self {
            order,
            stage: stage.into(),
        }
    }
}

impl fmt::Display for StageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.order, self.stage)
    }
}

/// Sort stages ascending by `order` and collapse duplicate orders to the
/// first-seen entry.
pub fn build_stage_list<I>(stages: I) -> Vec<StageDefinition>
where
    I: IntoIterator<Item = StageDefinition>,
{
    let mut list: Vec<StageDefinition> = stages.into_iter().collect();
    // Stable sort keeps input order among equal `order` values.
    list.sort_by_key(|definition| definition.order);
    list.dedup_by_key(|definition| definition.order);
    list
}
