//! Settings sections. Field names serialize as camelCase; every section
//! fills missing keys from its `Default`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SherlockSettings {
    pub llm: LlmSettings,
    pub database: DatabaseSettings,
    pub pipeline: PipelineSettings,
    pub chart: ChartSettings,
    pub logging: LoggingSettings,
}

/// Completion Service endpoint and call policy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key. The key itself
    /// is never stored in the settings file.
    pub api_key_env: String,
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o".into(),
            api_key_env: "OPENAI_API_KEY".into(),
            timeout_ms: 60_000,
            max_retries: 1,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseSettings {
    pub path: String,
    pub descriptions_path: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: "database/chinook.db".into(),
            descriptions_path: "prompts/schema_descriptions.yaml".into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineSettings {
    /// Generation attempts per turn before the run gives up.
    pub max_generation_attempts: u32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_generation_attempts: 3,
        }
    }
}

pub const CHART_MIN_SIDE: u32 = 100;
pub const CHART_MAX_SIDE: u32 = 4096;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChartSettings {
    pub width: u32,
    pub height: u32,
}

impl Default for ChartSettings {
    fn default() -> Self {
        Self {
            width: 800,
            height: 500,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    pub level: String,
    pub json: bool,
    /// Per-module overrides, e.g. `{"sherlock_llm": "debug"}`.
    pub module_levels: BTreeMap<String, String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            module_levels: BTreeMap::new(),
        }
    }
}

impl SherlockSettings {
    /// Reject values that would make the pipeline unusable.
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.max_generation_attempts == 0 {
            return Err(SettingsError::InvalidValue(
                "pipeline.maxGenerationAttempts must be at least 1".into(),
            ));
        }
        let sides = CHART_MIN_SIDE..=CHART_MAX_SIDE;
        if !sides.contains(&self.chart.width) || !sides.contains(&self.chart.height) {
            return Err(SettingsError::InvalidValue(format!(
                "chart size {}x{} must be {CHART_MIN_SIDE}..={CHART_MAX_SIDE} per side",
                self.chart.width, self.chart.height
            )));
        }
        if self.llm.timeout_ms == 0 {
            return Err(SettingsError::InvalidValue("llm.timeoutMs must be positive".into()));
        }
        Ok(())
    }
}
