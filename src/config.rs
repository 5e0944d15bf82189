//! Application configuration loaded from YAML

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "configs/config.yaml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub project_name: String,
    /// Seed for the train/test split
    #[serde(default = "default_random_state")]
    pub random_state: u64,
    pub data: DataConfig,
    #[serde(default)]
    pub train: TrainConfig,
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
    pub business: BusinessConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Training dataset CSV
    pub path: String,
    /// Raw churn outcome column
    pub target: String,
    #[serde(default = "default_test_size")]
    pub test_size: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    pub dir: String,
    pub metrics_path: String,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            dir: "artifacts".to_string(),
            metrics_path: "artifacts/metrics.json".to_string(),
        }
    }
}

/// Retention offer economics consumed by the targeting engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessConfig {
    /// Cost of extending one offer
    pub retention_offer_cost: f64,
    /// Probability an extended offer retains the customer
    pub retention_success_prob: f64,
    /// Value of retaining a customer who would otherwise churn
    pub churn_value: f64,
}

impl BusinessConfig {
    pub fn validate(&self) -> crate::Result<()> {
        if !self.retention_offer_cost.is_finite() || self.retention_offer_cost <= 0.0 {
            anyhow::bail!(
                "business.retention_offer_cost must be a positive number, got {}",
                self.retention_offer_cost
            );
        }
        if !(0.0..=1.0).contains(&self.retention_success_prob) {
            anyhow::bail!(
                "business.retention_success_prob must be within [0, 1], got {}",
                self.retention_success_prob
            );
        }
        if !self.churn_value.is_finite() || self.churn_value < 0.0 {
            anyhow::bail!(
                "business.churn_value must be a non-negative number, got {}",
                self.churn_value
            );
        }
        Ok(())
    }
}

impl AppConfig {
    /// Read and validate a YAML config file
    pub fn load(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("Config file not found at {}", path.display());
        }
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_yaml(&raw)?;
        log::debug!("loaded config '{}' from {}", config.project_name, path.display());
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> crate::Result<Self> {
        let config: AppConfig = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if !(self.data.test_size > 0.0 && self.data.test_size < 1.0) {
            anyhow::bail!("data.test_size must be within (0, 1), got {}", self.data.test_size);
        }
        self.business.validate()
    }
}

fn default_random_state() -> u64 {
    42
}

fn default_test_size() -> f64 {
    0.2
}

fn default_max_iterations() -> u64 {
    4000
}
