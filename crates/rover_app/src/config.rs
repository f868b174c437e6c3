//! Simulation configuration.
//!
//! Every field has a default, so a config file only needs the values it
//! changes. Command-line flags are applied on top in `main`.

use std::path::Path;

use anyhow::{Context, Result, ensure};
use rover_component::DEFAULT_MAX_ENTITIES;
use rover_processor::{ProcessorConfig, ProcessorType};
use serde::{Deserialize, Serialize};

/// Settings for one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Simulated seconds per tick.
    pub dt: f32,
    /// Wall-clock ticks per second.
    pub tick_rate: f64,
    /// Ticks to run, 0 for unlimited.
    pub max_ticks: u64,
    /// Preferred backend.
    pub processor: ProcessorType,
    #[serde(flatten)]
    pub processors: ProcessorConfig,
    /// Use the host-emulated compute device. Without it the gpu backend
    /// falls back to serial.
    pub emulate_device: bool,
    pub max_entities: u32,
    /// Clones per robot prototype in the demo scene.
    pub clones: u32,
    /// Robot prototypes in the demo scene.
    pub robots: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            dt: 1.0 / 60.0,
            tick_rate: 60.0,
            max_ticks: 600,
            processor: ProcessorType::Serial,
            processors: ProcessorConfig::default(),
            emulate_device: true,
            max_entities: DEFAULT_MAX_ENTITIES,
            clones: 64,
            robots: 2,
        }
    }
}

impl SimConfig {
    /// Load from a JSON file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or is not a valid config.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Parse from JSON text.
    ///
    /// # Errors
    ///
    /// Fails on malformed JSON, a value of the wrong type, or settings
    /// rejected by [`validate`](Self::validate).
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check settings that serde cannot.
    ///
    /// # Errors
    ///
    /// Fails unless `tick_rate` and `dt` are finite and positive.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.tick_rate.is_finite() && self.tick_rate > 0.0,
            "tick_rate must be a positive number, got {}",
            self.tick_rate
        );
        ensure!(
            self.dt.is_finite() && self.dt > 0.0,
            "dt must be a positive number, got {}",
            self.dt
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_gives_defaults() {
        assert_eq!(SimConfig::from_json("{}").unwrap(), SimConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let config = SimConfig::from_json(
            r#"{ "processor": "cpu", "cpu_workers": 3, "gpu_block_size": 64, "clones": 5 }"#,
        )
        .unwrap();
        assert_eq!(config.processor, ProcessorType::Cpu);
        assert_eq!(config.processors.cpu_workers, 3);
        assert_eq!(config.processors.cpu_batch_size, 16);
        assert_eq!(config.processors.gpu_block_size, 64);
        assert_eq!(config.clones, 5);
        assert_eq!(config.tick_rate, 60.0);
    }

    #[test]
    fn test_bad_tick_rate_is_rejected() {
        assert!(SimConfig::from_json(r#"{ "tick_rate": 0 }"#).is_err());
        assert!(SimConfig::from_json(r#"{ "tick_rate": -30.0 }"#).is_err());
        assert!(SimConfig::from_json(r#"{ "dt": 0.0 }"#).is_err());
        let config = SimConfig {
            tick_rate: f64::INFINITY,
            ..SimConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(SimConfig::default().validate().is_ok());
    }

    #[test]
    fn test_unknown_processor_is_rejected() {
        assert!(SimConfig::from_json(r#"{ "processor": "quantum" }"#).is_err());
    }
}
