//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`SherlockSettings::default()`]
//! 2. If `~/.sherlock/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `SHERLOCK_*` environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::SherlockSettings;

/// Resolve the path to the settings file (`~/.sherlock/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".sherlock").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<SherlockSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<SherlockSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

fn load_file_layer(path: &Path) -> Result<SherlockSettings> {
    let defaults = serde_json::to_value(SherlockSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply overrides from the process environment.
pub fn apply_env_overrides(settings: &mut SherlockSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides from any key lookup. Invalid values are ignored with a
/// warning, leaving the file/default value in place.
pub fn apply_overrides_from<F>(settings: &mut SherlockSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let string = |name: &str| lookup(name).filter(|v| !v.is_empty());

    if let Some(v) = string("SHERLOCK_DB_PATH") {
        settings.database.path = v;
    }
    if let Some(v) = string("SHERLOCK_DESCRIPTIONS_PATH") {
        settings.database.descriptions_path = v;
    }
    if let Some(v) = string("SHERLOCK_MODEL") {
        settings.llm.model = v;
    }
    if let Some(v) = string("SHERLOCK_LLM_BASE_URL") {
        settings.llm.base_url = v;
    }
    if let Some(raw) = string("SHERLOCK_LLM_TIMEOUT_MS") {
        match parse_u64_range(&raw, 1_000, 600_000) {
            Some(v) => settings.llm.timeout_ms = v,
            None => {
                let key = "SHERLOCK_LLM_TIMEOUT_MS";
                warn!(key, value = %raw, "invalid u64 env var, ignoring")
            }
        }
    }
    if let Some(raw) = string("SHERLOCK_MAX_ATTEMPTS") {
        match parse_u32_range(&raw, 1, 20) {
            Some(v) => settings.pipeline.max_generation_attempts = v,
            None => {
                warn!(key = "SHERLOCK_MAX_ATTEMPTS", value = %raw, "invalid u32 env var, ignoring")
            }
        }
    }
    if let Some(v) = string("SHERLOCK_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(raw) = string("SHERLOCK_LOG_JSON") {
        match parse_bool(&raw) {
            Some(v) => settings.logging.json = v,
            None => {
                warn!(key = "SHERLOCK_LOG_JSON", value = %raw, "invalid boolean env var, ignoring")
            }
        }
    }
}

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn parse_u32_range(val: &str, min: u32, max: u32) -> Option<u32> {
    let n: u32 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}
