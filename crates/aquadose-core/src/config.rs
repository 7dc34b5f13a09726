//! Aquadose configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{DoseError, Result};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AquadoseConfig {
    #[serde(default)]
    pub pump: PumpConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

impl AquadoseConfig {
    /// Load config from the default path (~/.aquadose/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DoseError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| DoseError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| DoseError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Aquadose home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".aquadose")
    }
}

/// Pump and actuator timing configuration.
///
/// A trigger is one discrete relay actuation dispensing a fixed
/// calibrated volume. The spacing fields are hardware floors, not
/// conveniences: the planner refuses windows that cannot honor them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PumpConfig {
    /// Nominal volume per trigger in microliters.
    #[serde(default = "default_ul_per_trigger")]
    pub ul_per_trigger: f64,
    /// Calibration multiplier applied when quantizing volumes.
    #[serde(default = "default_calibration")]
    pub calibration_factor: f64,
    /// Minimum trigger count any quantized dose rounds up to.
    #[serde(default = "default_min_triggers")]
    pub min_triggers: u32,
    /// Maximum triggers the hardware fires in one burst.
    #[serde(default = "default_max_triggers_per_cycle")]
    pub max_triggers_per_cycle: u32,
    /// Minimum seconds between trigger actuations within a burst.
    #[serde(default = "default_trigger_interval")]
    pub trigger_interval_secs: f64,
    /// Minimum seconds between a subject's delivery cycles.
    #[serde(default = "default_min_cycle_spacing")]
    pub min_cycle_spacing_secs: f64,
}

fn default_ul_per_trigger() -> f64 { 50.0 }
fn default_calibration() -> f64 { 1.0 }
fn default_min_triggers() -> u32 { 1 }
fn default_max_triggers_per_cycle() -> u32 { 20 }
fn default_trigger_interval() -> f64 { 0.5 }
fn default_min_cycle_spacing() -> f64 { 300.0 }

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            ul_per_trigger: default_ul_per_trigger(),
            calibration_factor: default_calibration(),
            min_triggers: default_min_triggers(),
            max_triggers_per_cycle: default_max_triggers_per_cycle(),
            trigger_interval_secs: default_trigger_interval(),
            min_cycle_spacing_secs: default_min_cycle_spacing(),
        }
    }
}

/// Engine tick and retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between engine ticks.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,
    /// Backoff before retrying a failed delivery.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_secs: u64,
    /// Consecutive hardware failures for one subject before the whole
    /// schedule is failed.
    #[serde(default = "default_max_failures")]
    pub max_consecutive_failures: u32,
    /// Delay before retrying an instant deferred by the in-flight guard.
    #[serde(default = "default_contention_delay")]
    pub contention_delay_secs: u64,
}

fn default_tick_interval() -> u64 { 1 }
fn default_retry_backoff() -> u64 { 60 }
fn default_max_failures() -> u32 { 5 }
fn default_contention_delay() -> u64 { 5 }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval(),
            retry_backoff_secs: default_retry_backoff(),
            max_consecutive_failures: default_max_failures(),
            contention_delay_secs: default_contention_delay(),
        }
    }
}

/// Persistent store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database path.
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

fn default_db_path() -> String { "~/.aquadose/aquadose.db".into() }

impl Default for StoreConfig {
    fn default() -> Self {
        Self { db_path: default_db_path() }
    }
}

/// Notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NotifyConfig {
    /// Webhook URL for status notifications (empty = log only).
    #[serde(default)]
    pub webhook_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AquadoseConfig::default();
        assert_eq!(config.pump.ul_per_trigger, 50.0);
        assert_eq!(config.pump.calibration_factor, 1.0);
        assert_eq!(config.pump.min_triggers, 1);
        assert_eq!(config.scheduler.tick_interval_secs, 1);
        assert_eq!(config.scheduler.retry_backoff_secs, 60);
        assert!(config.notify.webhook_url.is_empty());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: AquadoseConfig = toml::from_str(
            r#"
            [pump]
            ul_per_trigger = 25.0

            [scheduler]
            retry_backoff_secs = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.pump.ul_per_trigger, 25.0);
        assert_eq!(config.pump.max_triggers_per_cycle, 20);
        assert_eq!(config.scheduler.retry_backoff_secs, 10);
        assert_eq!(config.scheduler.tick_interval_secs, 1);
    }

    #[test]
    fn test_roundtrip() {
        let config = AquadoseConfig::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        let back: AquadoseConfig = toml::from_str(&toml).unwrap();
        assert_eq!(back.pump.min_cycle_spacing_secs, config.pump.min_cycle_spacing_secs);
        assert_eq!(back.store.db_path, config.store.db_path);
    }
}
