use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;
use crate::paths::Paths;
use crate::types::Scenario;

/// Engine tunables: timeout budgeting and optional concurrency cap.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Workflow timeout = max(sum of call timeouts, max call timeout) * multiplier.
    #[serde(default = "default_safety_multiplier")]
    pub safety_multiplier: f64,
    /// Upper bound for any workflow timeout, regardless of mode.
    #[serde(default = "default_workflow_timeout_ceiling_ms")]
    pub workflow_timeout_ceiling_ms: u64,
    /// Process-wide cap on concurrent capability calls. None = unbounded.
    #[serde(default)]
    pub max_in_flight_calls: Option<usize>,
}

fn default_safety_multiplier() -> f64 {
    1.5
}

fn default_workflow_timeout_ceiling_ms() -> u64 {
    30_000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            safety_multiplier: default_safety_multiplier(),
            workflow_timeout_ceiling_ms: default_workflow_timeout_ceiling_ms(),
            max_in_flight_calls: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchConfig {
    #[serde(default = "default_search_api_base")]
    pub api_base: String,
    #[serde(default = "default_search_max_results")]
    pub max_results: usize,
}

fn default_search_api_base() -> String {
    "https://api.duckduckgo.com".to_string()
}

fn default_search_max_results() -> usize {
    5
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_base: default_search_api_base(),
            max_results: default_search_max_results(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherConfig {
    #[serde(default = "default_weather_api_base")]
    pub api_base: String,
    /// Fallback coordinates when the request carries none.
    #[serde(default = "default_latitude")]
    pub latitude: f64,
    #[serde(default = "default_longitude")]
    pub longitude: f64,
}

fn default_weather_api_base() -> String {
    "https://api.open-meteo.com/v1/forecast".to_string()
}

fn default_latitude() -> f64 {
    37.7749
}

fn default_longitude() -> f64 {
    -122.4194
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_base: default_weather_api_base(),
            latitude: default_latitude(),
            longitude: default_longitude(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CapabilitiesConfig {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub capabilities: CapabilitiesConfig,
    /// Operator-defined scenarios. A scenario whose name matches a built-in
    /// one replaces it; others are appended to the table.
    #[serde(default)]
    pub scenarios: Vec<Scenario>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn load_or_default(paths: &Paths) -> Result<Self> {
        let config_path = paths.config_file();
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }
}
