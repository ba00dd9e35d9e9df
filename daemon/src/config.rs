//! Configuration management (TOML)

use crate::error::ConfigError;
use crate::hysteresis::Thresholds;
use crate::monitor::MonitorSettings;
use crate::sampler::DEFAULT_LOAD_SOURCE;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub thresholds: ThresholdConfig,
    pub control: ControlConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub poll_interval_secs: u64,
    pub sample_timeout_ms: u64,
    pub load_source: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Suspend the workload when runnable processes exceed this.
    pub stop: u64,
    /// Resume the workload when runnable processes drop below this.
    pub start: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub start_command: String,
    pub stop_command: String,
    pub command_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            poll_interval_secs: 10,
            sample_timeout_ms: 1000,
            load_source: PathBuf::from(DEFAULT_LOAD_SOURCE),
        }
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        ThresholdConfig {
            stop: 35,
            start: 10,
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        ControlConfig {
            start_command: "boinccmd --set_run_mode always".to_string(),
            stop_command: "boinccmd --set_run_mode never".to_string(),
            command_timeout_secs: 30,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            format: LogFormat::Text,
            log_file: None,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `path` if it exists, otherwise fall back to defaults. The flag
    /// reports whether a file was read.
    pub fn load_or_default(path: &Path) -> Result<(Self, bool), ConfigError> {
        if path.exists() {
            Ok((Self::load(path)?, true))
        } else {
            Ok((Self::default(), false))
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        let write_err = |source: std::io::Error| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        fs::write(path, content).map_err(write_err)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        directories::ProjectDirs::from("", "", "loadgate")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Check every invariant the monitor loop relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.monitor_settings().map(|_| ())
    }

    /// Validated settings for the monitor loop.
    pub fn monitor_settings(&self) -> Result<MonitorSettings, ConfigError> {
        let thresholds = Thresholds::new(self.thresholds.stop, self.thresholds.start)?;
        if self.general.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_secs must be positive".into(),
            ));
        }
        if self.general.sample_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "sample_timeout_ms must be positive".into(),
            ));
        }
        if self.control.command_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "command_timeout_secs must be positive".into(),
            ));
        }
        if self.control.start_command.trim().is_empty() {
            return Err(ConfigError::Invalid("start_command is empty".into()));
        }
        if self.control.stop_command.trim().is_empty() {
            return Err(ConfigError::Invalid("stop_command is empty".into()));
        }
        Ok(MonitorSettings {
            thresholds,
            poll_interval: Duration::from_secs(self.general.poll_interval_secs),
            sample_timeout: Duration::from_millis(self.general.sample_timeout_ms),
        })
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.control.command_timeout_secs)
    }
}
