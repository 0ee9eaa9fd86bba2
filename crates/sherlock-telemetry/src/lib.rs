use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("invalid log level {0:?}")]
    InvalidLevel(String),

    #[error("invalid log filter: {0}")]
    InvalidFilter(String),

    #[error("a global tracing subscriber is already installed: {0}")]
    AlreadyInitialized(String),
}

/// Configuration for the telemetry subsystem.
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Default log level. Overridden by RUST_LOG env var.
    pub log_level: Level,
    /// Per-module level overrides (e.g. "sherlock_llm" => DEBUG).
    pub module_levels: Vec<(String, Level)>,
    /// JSON lines instead of the compact human format.
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            module_levels: Vec::new(),
            json: false,
        }
    }
}

impl TelemetryConfig {
    /// Build from the string levels found in settings files.
    pub fn from_names<I, K, V>(
        level: &str,
        module_levels: I,
        json: bool,
    ) -> Result<Self, TelemetryError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let modules = module_levels
            .into_iter()
            .map(|(module, lvl)| Ok((module.into(), parse_level(lvl.as_ref())?)))
            .collect::<Result<Vec<_>, TelemetryError>>()?;
        Ok(Self {
            log_level: parse_level(level)?,
            module_levels: modules,
            json,
        })
    }

    /// `EnvFilter` directive string, e.g. `info,sherlock_llm=debug`.
    pub fn filter_directives(&self) -> String {
        let mut filter = self.log_level.to_string().to_lowercase();
        for (module, level) in &self.module_levels {
            filter.push_str(&format!(",{}={}", module, level.to_string().to_lowercase()));
        }
        filter
    }
}

pub fn parse_level(raw: &str) -> Result<Level, TelemetryError> {
    Level::from_str(raw.trim()).map_err(|_| TelemetryError::InvalidLevel(raw.to_string()))
}

/// Install the global subscriber. Call once at startup. Logs go to stderr so
/// stdout carries only answers.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(config.filter_directives())
            .map_err(|e| TelemetryError::InvalidFilter(e.to_string()))?,
    };

    let (json_layer, compact_layer) = if config.json {
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_span_list(true)
            .with_writer(std::io::stderr);
        (Some(layer), None)
    } else {
        let layer = tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_writer(std::io::stderr);
        (None, Some(layer))
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(compact_layer)
        .try_init()
        .map_err(|e| TelemetryError::AlreadyInitialized(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_include_module_overrides() {
        let config = TelemetryConfig::from_names(
            "warn",
            [("sherlock_engine", "debug"), ("sherlock_llm", "TRACE")],
            false,
        )
        .unwrap();
        assert_eq!(
            config.filter_directives(),
            "warn,sherlock_engine=debug,sherlock_llm=trace"
        );
    }

    #[test]
    fn default_is_info() {
        assert_eq!(TelemetryConfig::default().filter_directives(), "info");
    }

    #[test]
    fn rejects_unknown_level() {
        let err = TelemetryConfig::from_names("loud", Vec::<(String, String)>::new(), false)
            .unwrap_err();
        assert!(matches!(err, TelemetryError::InvalidLevel(ref l) if l == "loud"));
    }

    #[test]
    fn second_init_reports_error() {
        let config = TelemetryConfig::default();
        let _ = init_telemetry(&config);
        assert!(matches!(
            init_telemetry(&config),
            Err(TelemetryError::AlreadyInitialized(_))
        ));
    }
}
