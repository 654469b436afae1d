//! Layered configuration.
//!
//! Sources, highest priority first:
//! 1. Environment variables (`RUSTY_QUANT_*`, `__` separates sections,
//!    e.g. `RUSTY_QUANT_STORAGE__ROOT`)
//! 2. `rusty-quant.toml` in the working directory, or an explicit file
//! 3. Built-in defaults

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::regression::WeightingFactor;

pub const CONFIG_FILE: &str = "rusty-quant.toml";
pub const ENV_PREFIX: &str = "RUSTY_QUANT_";

fn default_root() -> PathBuf {
    PathBuf::from("runs")
}

fn default_filter() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Directory holding `<project>/<run>.json` documents.
    #[serde(default = "default_root")]
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RegressionConfig {
    /// Weighting label that overrides the one declared in the export.
    #[serde(default)]
    pub weighting: Option<String>,
}

impl RegressionConfig {
    pub fn weighting_factor(&self) -> Result<Option<WeightingFactor>, ConfigError> {
        self.weighting
            .as_deref()
            .map(|label| {
                label
                    .parse::<WeightingFactor>()
                    .map_err(|e| ConfigError::InvalidValue {
                        field: "regression.weighting".to_string(),
                        reason: e.to_string(),
                    })
            })
            .transpose()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogConfig {
    /// `env_logger` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct QuantConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub regression: RegressionConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl QuantConfig {
    /// Load from defaults, `rusty-quant.toml` and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load with an explicit config file in place of `rusty-quant.toml`.
    pub fn load_from(file: Option<&Path>) -> Result<Self, ConfigError> {
        let config: Self = Self::figment(file).extract()?;
        // Surface a bad weighting label at startup rather than mid-run.
        config.regression.weighting_factor()?;
        Ok(config)
    }

    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        let path = file.map_or_else(|| PathBuf::from(CONFIG_FILE), Path::to_path_buf);
        if path.exists() {
            figment = figment.merge(Toml::file(path));
        }

        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_correct() {
        let config = QuantConfig::default();
        assert_eq!(config.storage.root, PathBuf::from("runs"));
        assert_eq!(config.log.filter, "info");
        assert_eq!(config.regression.weighting_factor().unwrap(), None);
    }

    #[test]
    fn weighting_label_is_resolved() {
        let config = RegressionConfig {
            weighting: Some("1 / (x * x)".to_string()),
        };
        assert_eq!(
            config.weighting_factor().unwrap(),
            Some(WeightingFactor::OneOverXSquared)
        );

        let bad = RegressionConfig {
            weighting: Some("log".to_string()),
        };
        assert!(matches!(
            bad.weighting_factor(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
