use crate::ml::{ParamGrid, TrainingConfig};
use crate::models::TARGET_COLUMN;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Model artifact configuration
    #[serde(default)]
    pub model: ModelConfig,

    /// Training and model selection configuration
    #[serde(default)]
    pub training: TrainingSettings,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/default.toml".to_string());

        config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                DEFAULT_CONFIG,
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(&config_path).required(false))
            // Override with environment variables (prefix: PM__)
            .add_source(
                config::Environment::with_prefix("PM")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Embedded defaults overlaid with a TOML document
    pub fn from_toml(overlay: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(
                DEFAULT_CONFIG,
                config::FileFormat::Toml,
            ))
            .add_source(config::File::from_str(overlay, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    /// Socket address the HTTP server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Directory holding `pipeline.bin` and `encoder.json`
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,

    /// Refuse to start the server without loadable artifacts
    #[serde(default = "default_true")]
    pub require_artifacts_at_startup: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            artifact_dir: default_artifact_dir(),
            require_artifacts_at_startup: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSettings {
    /// Seed for splitting and tree bootstrap
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Held-out fraction
    #[serde(default = "default_test_size")]
    pub test_size: f64,

    /// Cross-validation folds
    #[serde(default = "default_cv_folds")]
    pub cv_folds: usize,

    /// Label column name
    #[serde(default = "default_target_column")]
    pub target_column: String,

    /// Hyperparameter grid
    #[serde(default)]
    pub grid: GridSettings,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            test_size: default_test_size(),
            cv_folds: default_cv_folds(),
            target_column: default_target_column(),
            grid: GridSettings::default(),
        }
    }
}

impl TrainingSettings {
    pub fn to_training_config(&self) -> TrainingConfig {
        TrainingConfig {
            seed: self.seed,
            test_size: self.test_size,
            cv_folds: self.cv_folds,
            grid: self.grid.to_param_grid(),
        }
    }
}

/// Grid as written in configuration files.
///
/// TOML has no null, so a `max_depth` of 0 stands for unlimited depth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridSettings {
    #[serde(default = "default_n_estimators")]
    pub n_estimators: Vec<usize>,

    #[serde(default = "default_max_depth")]
    pub max_depth: Vec<usize>,

    #[serde(default = "default_min_samples_split")]
    pub min_samples_split: Vec<usize>,

    #[serde(default = "default_min_samples_leaf")]
    pub min_samples_leaf: Vec<usize>,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            n_estimators: default_n_estimators(),
            max_depth: default_max_depth(),
            min_samples_split: default_min_samples_split(),
            min_samples_leaf: default_min_samples_leaf(),
        }
    }
}

impl GridSettings {
    pub fn to_param_grid(&self) -> ParamGrid {
        ParamGrid {
            n_estimators: self.n_estimators.clone(),
            max_depth: self
                .max_depth
                .iter()
                .map(|&d| if d == 0 { None } else { Some(d) })
                .collect(),
            min_samples_split: self.min_samples_split.clone(),
            min_samples_leaf: self.min_samples_leaf.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,

    /// Service name
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            service_name: default_service_name(),
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_true() -> bool {
    true
}

fn default_seed() -> u64 {
    42
}

fn default_test_size() -> f64 {
    0.2
}

fn default_cv_folds() -> usize {
    5
}

fn default_target_column() -> String {
    TARGET_COLUMN.to_string()
}

fn default_n_estimators() -> Vec<usize> {
    vec![100, 200]
}

fn default_max_depth() -> Vec<usize> {
    vec![0, 10, 20]
}

fn default_min_samples_split() -> Vec<usize> {
    vec![2, 5]
}

fn default_min_samples_leaf() -> Vec<usize> {
    vec![1, 2]
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "vehicle-predictive-maintenance".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        assert_eq!(default_port(), 8000);
        assert_eq!(default_log_level(), "info");
        assert!(default_true());
    }

    #[test]
    fn test_embedded_defaults_parse() {
        let config = Config::from_toml("").unwrap();

        assert_eq!(config.server.port, 8000);
        assert_eq!(config.model.artifact_dir, PathBuf::from("models"));
        assert!(config.model.require_artifacts_at_startup);
        assert_eq!(config.training.target_column, "failure_risk");
        assert_eq!(config.training.to_training_config(), TrainingConfig::default());
    }

    #[test]
    fn test_overlay_overrides_defaults() {
        let config = Config::from_toml(
            r#"
            [server]
            port = 9100

            [training.grid]
            n_estimators = [25]
            max_depth = [0]
            "#,
        )
        .unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:9100");
        let grid = config.training.grid.to_param_grid();
        assert_eq!(grid.n_estimators, vec![25]);
        assert_eq!(grid.max_depth, vec![None]);
        assert_eq!(grid.min_samples_split, vec![2, 5]);
    }
}
