//! Application configuration: `funnelsim.yaml` (or `FUNNELSIM_CONFIG`), then
//! environment overrides.

use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::funnel::SimulationMode;
use crate::session::{DEFAULT_STARTING_CANDIDATES, DEFAULT_TARGET_HIRES};

pub const DEFAULT_CONFIG_PATH: &str = "funnelsim.yaml";
pub const DEFAULT_BIND: &str = "127.0.0.1:3000";
pub const DEFAULT_STATIC_DIR: &str = "frontend/dist";

pub const CONFIG_ENV: &str = "FUNNELSIM_CONFIG";
pub const BIND_ENV: &str = "FUNNELSIM_BIND";
pub const DATA_ENV: &str = "FUNNELSIM_DATA";
pub const LOG_ENV: &str = "FUNNELSIM_LOG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config '{path}': {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationDefaults {
    pub mode: SimulationMode,
    pub starting_candidates: f64,
    pub target_hires: f64,
}

impl Default for SimulationDefaults {
    fn default() -> Self {
        Self {
            mode: SimulationMode::TopDown,
            starting_candidates: DEFAULT_STARTING_CANDIDATES,
            target_hires: DEFAULT_TARGET_HIRES,
        }
    }
}

impl SimulationDefaults {
    pub fn value_for(&self, mode: SimulationMode) -> f64 {
        match mode {
            SimulationMode::TopDown => self.starting_candidates,
            SimulationMode::BottomUp => self.target_hires,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub bind: String,
    /// Stage-record source (.json, .csv, .xlsx...). `None` uses sample data.
    pub data_path: Option<String>,
    pub static_dir: String,
    pub log_filter: String,
    pub defaults: SimulationDefaults,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            data_path: None,
            static_dir: DEFAULT_STATIC_DIR.to_string(),
            log_filter: "info".to_string(),
            defaults: SimulationDefaults::default(),
        }
    }
}

impl AppConfig {
    /// Parse a YAML file. A missing file yields the defaults.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        if !Path::new(path).exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_yaml(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
    }

    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    /// Config file named by `FUNNELSIM_CONFIG` (default `funnelsim.yaml`),
    /// then `FUNNELSIM_BIND` / `FUNNELSIM_DATA` / `FUNNELSIM_LOG`.
    pub fn load() -> Result<Self, ConfigError> {
        let path = env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::from_file(&path)?;
        config.apply_env(|key| env::var(key).ok());
        Ok(config)
    }

    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        if let Some(bind) = lookup(BIND_ENV) {
            self.bind = bind;
        }
        if let Some(data_path) = lookup(DATA_ENV) {
            self.data_path = Some(data_path);
        }
        if let Some(filter) = lookup(LOG_ENV) {
            self.log_filter = filter;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = AppConfig::from_yaml(
            "data_path: data/stages.csv\ndefaults:\n  mode: bottom-up\n  target_hires: 4\n",
        )
        .expect("yaml should parse");
        assert_eq!(config.bind, DEFAULT_BIND);
        assert_eq!(config.data_path.as_deref(), Some("data/stages.csv"));
        assert_eq!(config.defaults.mode, SimulationMode::BottomUp);
        assert_eq!(config.defaults.target_hires, 4.0);
        assert_eq!(config.defaults.starting_candidates, DEFAULT_STARTING_CANDIDATES);
    }

    #[test]
    fn empty_yaml_is_default() {
        assert_eq!(AppConfig::from_yaml("  \n").ok(), Some(AppConfig::default()));
    }

    #[test]
    fn invalid_mode_is_a_parse_error() {
        assert!(AppConfig::from_yaml("defaults:\n  mode: sideways\n").is_err());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = AppConfig::from_file("does/not/exist/funnelsim.yaml").expect("defaults");
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn env_overrides_win_and_blank_values_are_ignored() {
        let env: HashMap<&str, &str> = [
            (BIND_ENV, "0.0.0.0:8080"),
            (DATA_ENV, "  "),
            (LOG_ENV, "funnelsim=debug"),
        ]
        .into_iter()
        .collect();
        let mut config = AppConfig::default();
        config.apply_env(|key| env.get(key).map(|value| value.to_string()));

        assert_eq!(config.bind, "0.0.0.0:8080");
        assert_eq!(config.data_path, None);
        assert_eq!(config.log_filter, "funnelsim=debug");
    }
}
