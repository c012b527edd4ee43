//! Per-stage value maps supplied by the caller: overrides and sum adjustments.
//!
//! Both maps share the [StageKey] addressing and are edited independently.
//! Values are always finite; anything else is treated as "no value".

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::funnel::stage::{StageDefinition, StageKey};

/// Serialized as a list of entries; JSON object keys cannot carry a
/// [StageKey].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<AdjustmentEntry>", into = "Vec<AdjustmentEntry>")]
pub struct StageAdjustments {
    values: BTreeMap<StageKey, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentEntry {
    pub order: u32,
    pub stage: String,
    pub value: f64,
}

impl From<Vec<AdjustmentEntry>> for StageAdjustments {
    fn from(entries: Vec<AdjustmentEntry>) -> Self {
        entries
            .into_iter()
            .map(|entry| (StageKey::new(entry.order, entry.stage), entry.value))
            .collect()
    }
}

impl From<StageAdjustments> for Vec<AdjustmentEntry> {
    fn from(adjustments: StageAdjustments) -> Self {
        adjustments
            .values
            .into_iter()
            .map(|(key, value)| AdjustmentEntry {
                order: key.order,
                stage: key.stage,
                value,
            })
            .collect()
    }
}

impl StageAdjustments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &StageKey) -> Option<f64> {
        self.values.get(key).copied()
    }

    pub fn value_for(&self, definition: &StageDefinition) -> Option<f64> {
        self.get(&definition.key())
    }

    /// Store `value` for `key`; non-finite values clear the key instead.
    pub fn set(&mut self, key: StageKey, value: f64) {
        if value.is_finite() {
            self.values.insert(key, value);
        } else {
            self.values.remove(&key);
        }
    }

    pub fn clear_all(&mut self) {
        self.values.clear();
    }

    /// Apply a raw edit from an input field. Blank or non-numeric text clears
    /// the key. Returns the stored value, if any.
    pub fn apply_edit(&mut self, key: StageKey, raw: &str) -> Option<f64> {
        match parse_numeric_input(raw) {
            Some(value) => {
                self.values.insert(key, value);
                Some(value)
            }
            None => {
                self.values.remove(&key);
                None
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Index and value of the first stage (ascending order) that carries a
    /// value.
    pub fn first_applied(&self, stages: &[StageDefinition]) -> Option<(usize, f64)> {
        if self.values.is_empty() {
            return None;
        }
        stages
            .iter()
            .enumerate()
            .find_map(|(index, definition)| {
                self.value_for(definition).map(|value| (index, value))
            })
    }
}

impl FromIterator<(StageKey, f64)> for StageAdjustments {
    fn from_iter<T: IntoIterator<Item = (StageKey, f64)>>(iter: T) -> Self {
        let mut adjustments = Self::new();
        for (key, value) in iter {
            adjustments.set(key, value);
        }
        adjustments
    }
}

/// Parse user-entered numeric text. Returns `None` for blank, non-numeric or
/// non-finite input.
pub fn parse_numeric_input(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|value| value.is_finite())
}
