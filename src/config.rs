//! Application configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_with::serde_as;
use tracing::warn;

use crate::errors::RadarHubError;
use crate::window::{utc_offset, DEFAULT_UTC_OFFSET_HOURS};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub store: StoreConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Directory holding the database file
    pub path: PathBuf,
    #[serde(default = "default_repair_indexes")]
    pub repair_indexes_on_start: bool,
}

fn default_repair_indexes() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScheduleConfig {
    /// Hours east of UTC that schedule windows are written in
    pub utc_offset_hours: i32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            utc_offset_hours: DEFAULT_UTC_OFFSET_HOURS,
        }
    }
}

#[serde_as]
#[derive(Debug, Deserialize, Clone)]
pub struct MonitorConfig {
    /// How often the binary logs station status
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub status_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            status_interval: Duration::from_secs(60),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(
                Environment::with_prefix("RADARHUB")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn validate(&self) -> Result<(), RadarHubError> {
        self.store.validate()?;
        self.schedule.validate()?;
        self.monitor.validate()
    }
}

impl StoreConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), RadarHubError> {
        self.validate_path()?;
        self.ensure_directory_exists(&self.path)?;
        Ok(())
    }

    fn validate_path(&self) -> Result<(), RadarHubError> {
        if self.path.as_os_str().is_empty() {
            return Err(RadarHubError::ConfigurationError {
                message: "Store path cannot be empty".to_string(),
            });
        }
        Ok(())
    }

    fn ensure_directory_exists(&self, dir: &Path) -> Result<(), RadarHubError> {
        if !dir.exists() {
            warn!("Store directory does not exist, attempting to create it");
            std::fs::create_dir_all(dir).map_err(|e| RadarHubError::ConfigurationError {
                message: format!("Could not create store directory: {}", e),
            })?;
        }
        Ok(())
    }
}

impl ScheduleConfig {
    pub fn validate(&self) -> Result<(), RadarHubError> {
        utc_offset(self.utc_offset_hours).map(|_| ())
    }
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<(), RadarHubError> {
        if self.status_interval.is_zero() {
            return Err(RadarHubError::ConfigurationError {
                message: "Status interval must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::tempdir;

    #[test]
    fn test_load_config() {
        env::set_var("RADARHUB__STORE__PATH", "/tmp/radar-hub");
        env::set_var("RADARHUB__STORE__REPAIR_INDEXES_ON_START", "false");
        env::set_var("RADARHUB__SCHEDULE__UTC_OFFSET_HOURS", "8");
        env::set_var("RADARHUB__MONITOR__STATUS_INTERVAL", "30");

        let config = AppConfig::load().unwrap();
        assert_eq!(config.store.path, PathBuf::from("/tmp/radar-hub"));
        assert!(!config.store.repair_indexes_on_start);
        assert_eq!(config.schedule.utc_offset_hours, 8);
        assert_eq!(config.monitor.status_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_defaults() {
        let config: AppConfig = serde_json::from_str(r#"{"store": {"path": "data"}}"#).unwrap();
        assert!(config.store.repair_indexes_on_start);
        assert_eq!(config.schedule.utc_offset_hours, 7);
        assert_eq!(config.monitor.status_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_store_config_validate_creates_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("data");
        let config = StoreConfig {
            path: path.clone(),
            repair_indexes_on_start: true,
        };

        assert!(config.validate().is_ok());
        assert!(path.is_dir());
    }

    #[test]
    fn test_store_config_validate_invalid_path() {
        let config = StoreConfig {
            path: PathBuf::from(""),
            repair_indexes_on_start: true,
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_schedule_config_validate_invalid_offset() {
        let config = ScheduleConfig {
            utc_offset_hours: 30,
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_monitor_config_validate_invalid_interval() {
        let config = MonitorConfig {
            status_interval: Duration::from_secs(0),
        };

        assert!(config.validate().is_err());
    }
}
