//! Simulation settings, embedded in scenario files under `config:`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::geometry::CoverageModel;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default)]
    pub coverage: CoverageConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageConfig {
    #[serde(default)]
    pub model: CoverageModel,
    /// Radius granted per unit of tower height when a tower omits `radius`.
    #[serde(default = "default_meters_per_height_unit")]
    pub meters_per_height_unit: f64,
}

fn default_meters_per_height_unit() -> f64 {
    50.0
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            model: CoverageModel::default(),
            meters_per_height_unit: default_meters_per_height_unit(),
        }
    }
}

impl CoverageConfig {
    pub fn radius_for_height(&self, height: f64) -> f64 {
        height * self.meters_per_height_unit
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_initial_buckets")]
    pub initial_buckets: usize,
    #[serde(default = "default_max_load_factor")]
    pub max_load_factor: f64,
}

fn default_initial_buckets() -> usize {
    16
}

fn default_max_load_factor() -> f64 {
    0.75
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            initial_buckets: default_initial_buckets(),
            max_load_factor: default_max_load_factor(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl SimulationConfig {
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        fs::write(path.as_ref(), yaml)
            .with_context(|| format!("Failed to write {}", path.as_ref().display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SimulationConfig::default();
        assert_eq!(config.coverage.model, CoverageModel::Planar);
        assert_eq!(config.coverage.radius_for_height(2.0), 100.0);
        assert_eq!(config.registry.initial_buckets, 16);
        assert_eq!(config.registry.max_load_factor, 0.75);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config: SimulationConfig =
            serde_yaml::from_str("coverage:\n  model: height_adjusted\n").unwrap();
        assert_eq!(config.coverage.model, CoverageModel::HeightAdjusted);
        assert_eq!(config.coverage.meters_per_height_unit, 50.0);
        assert_eq!(config.registry, RegistryConfig::default());
    }

    #[test]
    fn test_config_serialization() {
        let mut config = SimulationConfig::default();
        config.registry.initial_buckets = 64;
        config.logging.level = "debug".into();

        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.yaml");
        config.to_yaml(&path).unwrap();

        let loaded = SimulationConfig::from_yaml(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
