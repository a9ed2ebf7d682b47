//! Configuration loading for the engine and CLI.
//!
//! Loads from `./raildiag.toml` (or `$RAILDIAG_CONFIG_PATH`). Environment
//! variables override file values; file values override defaults.
//!
//! Precedence: env vars > config file > defaults.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Top-level configuration loaded from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RaildiagConfig {
    /// Engine tuning (`[engine]`).
    pub engine: EngineConfig,
    /// Pattern catalog selection (`[catalog]`).
    pub catalog: CatalogConfig,
    /// Logging (`[logging]`).
    pub logging: LoggingConfig,
}

/// Engine tuning knobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Classifier memoization cache capacity.
    pub classifier_cache_capacity: usize,
    /// Causal-analyzer result cache capacity.
    pub analyzer_cache_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            classifier_cache_capacity: 1024,
            analyzer_cache_capacity: 256,
        }
    }
}

/// Where the pattern catalog comes from.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Path to a TOML catalog. `None` means the built-in catalog.
    pub path: Option<String>,
}

/// Logging defaults (overridable via `RUST_LOG`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level filter when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
        }
    }
}

impl RaildiagConfig {
    /// Load configuration with precedence env vars > TOML file > defaults.
    ///
    /// Config file path: `$RAILDIAG_CONFIG_PATH` or `./raildiag.toml`.
    /// A missing file is not an error; defaults apply.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_file()?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from the TOML file only, no env overrides.
    fn load_from_file() -> Result<Self> {
        let path = Self::config_path_with(|key| std::env::var(key).ok());
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                tracing::info!(path = %path.display(), "loading config from file");
                let config: RaildiagConfig =
                    toml::from_str(&contents).context("failed to parse config TOML")?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(RaildiagConfig::default()),
            Err(e) => Err(anyhow::anyhow!("failed to read config file: {e}")),
        }
    }

    /// Resolve the config path using a custom env resolver (for testing).
    fn config_path_with(env: impl Fn(&str) -> Option<String>) -> PathBuf {
        match env("RAILDIAG_CONFIG_PATH") {
            Some(p) => PathBuf::from(p),
            None => PathBuf::from("raildiag.toml"),
        }
    }

    /// Apply environment variable overrides.
    ///
    /// Takes a resolver function for testability.
    fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("RAILDIAG_CLASSIFIER_CACHE") {
            match v.parse() {
                Ok(n) => self.engine.classifier_cache_capacity = n,
                Err(_) => tracing::warn!(
                    var = "RAILDIAG_CLASSIFIER_CACHE",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }
        if let Some(v) = env("RAILDIAG_ANALYZER_CACHE") {
            match v.parse() {
                Ok(n) => self.engine.analyzer_cache_capacity = n,
                Err(_) => tracing::warn!(
                    var = "RAILDIAG_ANALYZER_CACHE",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }
        if let Some(v) = env("RAILDIAG_CATALOG_PATH") {
            self.catalog.path = Some(v);
        }
        if let Some(v) = env("RAILDIAG_LOG_LEVEL") {
            self.logging.level = v;
        }
    }
}
