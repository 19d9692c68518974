//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs. Every
//! section and field is optional: anything unset falls back to the defaults
//! defined next to the component that owns it, and unknown keys are ignored.
//! A missing or malformed file is not an error; the caller gets the full
//! default configuration and a warning in the log.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::backtest::tuner::TunerConfig;
use crate::strategy::bankroll::BankrollConfig;
use crate::strategy::ev::EvConfig;
use crate::strategy::regime::RegimeConfig;

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV: &str = "RUGS_CONFIG";

/// Default config file location.
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub ev: EvConfig,
    pub regime: RegimeConfig,
    pub bankroll: BankrollConfig,
    pub tuner: TunerConfig,
    pub paths: PathsConfig,
}

/// File locations for history input and persisted outputs.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PathsConfig {
    /// JSON array of historical rounds (with ticks).
    pub history: PathBuf,
    /// Bankroll state file.
    pub bankroll: PathBuf,
    /// Directory holding per-regime threshold records and the active alias.
    pub thresholds_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            history: PathBuf::from("data/rounds.json"),
            bankroll: PathBuf::from("data/bankroll.json"),
            thresholds_dir: PathBuf::from("data"),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file, failing on I/O or parse errors.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Load configuration, falling back to defaults when the file is
    /// missing or cannot be parsed.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            warn!(path = %path.display(), "Config file not found, using defaults");
            return Self::default();
        }
        match Self::load(path) {
            Ok(cfg) => {
                info!(path = %path.display(), "Configuration loaded");
                cfg
            }
            Err(e) => {
                warn!(path = %path.display(), error = %format!("{e:#}"), "Config unreadable, using defaults");
                Self::default()
            }
        }
    }

    /// Config path from an explicit argument, then `RUGS_CONFIG`, then the
    /// default file name.
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        std::env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE))
    }
}
