//! Application configuration.
//!
//! Resolution order (highest priority first):
//! 1. Environment variables (`IMMOPRIX_DATA`, `IMMOPRIX_MODEL_DIR`)
//! 2. TOML file passed with `--config`
//! 3. Compiled defaults

use crate::dataset::{CleaningConfig, IngestConfig};
use crate::error::{EstimatorError, Result};
use crate::trainer::TrainingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DATA_ENV: &str = "IMMOPRIX_DATA";
pub const MODEL_DIR_ENV: &str = "IMMOPRIX_MODEL_DIR";

/// File locations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Raw DVF export.
    pub raw_data: PathBuf,
    /// Cleaned transactions, input of training.
    pub data: PathBuf,
    /// Model bundle directory.
    pub model_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_data: PathBuf::from("data/dvf.csv"),
            data: PathBuf::from("data/dvf_clean.csv"),
            model_dir: PathBuf::from("model"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub paths: PathsConfig,
    pub ingest: IngestConfig,
    pub cleaning: CleaningConfig,
    pub training: TrainingConfig,
}

impl AppConfig {
    /// Defaults, overlaid with `path` when given, then with the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    EstimatorError::Config(format!("cannot read {}: {e}", path.display()))
                })?;
                debug!(path = %path.display(), "configuration file read");
                Self::from_toml(&content)?
            }
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Override paths from variables returned by `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(data) = lookup(DATA_ENV).filter(|v| !v.is_empty()) {
            self.paths.data = PathBuf::from(data);
        }
        if let Some(dir) = lookup(MODEL_DIR_ENV).filter(|v| !v.is_empty()) {
            self.paths.model_dir = PathBuf::from(dir);
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.ingest.validate()?;
        self.cleaning.validate()?;
        self.training.validate()
    }
}
