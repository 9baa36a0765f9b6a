//! Configuration loading
//!
//! Database path resolution follows a priority order:
//! 1. Explicit argument (highest priority, e.g. a CLI flag)
//! 2. `LEADRANK_DB` environment variable
//! 3. `leadrank.toml` config file (`database_path` key)
//! 4. Compiled default (`leadrank.db` in the working directory)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Optional settings read from `leadrank.toml`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub database_path: Option<String>,
    pub default_threshold: Option<f64>,
}

/// Resolved runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: PathBuf,
    pub default_threshold: f64,
}

impl Config {
    /// Resolve configuration from the priority chain.
    ///
    /// `cli_db_path` wins over the environment, which wins over the TOML
    /// file at `config_file` (or `./leadrank.toml` when not given).
    pub fn resolve(cli_db_path: Option<&str>, config_file: Option<&Path>) -> Result<Self> {
        let toml_config = load_toml_config(config_file)?;

        // Priority 1: explicit argument
        let database_path = if let Some(path) = cli_db_path {
            PathBuf::from(path)
        }
        // Priority 2: environment variable
        else if let Ok(path) = std::env::var("LEADRANK_DB") {
            PathBuf::from(path)
        }
        // Priority 3: TOML config file
        else if let Some(path) = toml_config.database_path.as_deref() {
            PathBuf::from(path)
        }
        // Priority 4: compiled default
        else {
            PathBuf::from("leadrank.db")
        };

        let default_threshold = toml_config
            .default_threshold
            .unwrap_or(crate::db::thresholds::DEFAULT_THRESHOLD);
        if !(0.0..=1.0).contains(&default_threshold) {
            return Err(Error::Config(format!(
                "default_threshold must be within [0,1], got {default_threshold}"
            )));
        }

        Ok(Config {
            database_path,
            default_threshold,
        })
    }
}

/// Read the TOML config file when present; a missing file is not an error.
fn load_toml_config(config_file: Option<&Path>) -> Result<TomlConfig> {
    let path = config_file
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("leadrank.toml"));

    if !path.exists() {
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(&path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {e}", path.display())))
}
