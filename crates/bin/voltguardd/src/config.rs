//! Daemon settings.
//!
//! Read from `voltguard.toml` (or the file named by `VOLTGUARD_CONFIG`), then
//! overridden by `VOLTGUARD_*` variables. A missing file means all defaults.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use voltguard_domain::device_config::DeviceConfig;
use voltguard_domain::id::DeviceId;
use voltguard_domain::telemetry::PhaseLayout;

const DEFAULT_PATH: &str = "voltguard.toml";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub automation: AutomationConfig,
    /// Simulated meters to automate.
    pub virtual_meters: Vec<VirtualMeterConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:voltguard.db?mode=rwc".to_string(),
            max_connections: 4,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "voltguardd=info,voltguard_app=info,voltguard_adapter_virtual=info".to_string(),
        }
    }
}

/// Cadence of the automation loops.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    /// Seconds between two telemetry sweeps.
    pub poll_interval_secs: u64,
    /// Seconds between two schedule and cooldown ticks. At most 60 so that
    /// no schedule minute is skipped.
    pub tick_interval_secs: u64,
    /// Upper bound on a single gateway call.
    pub command_timeout_ms: u64,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 10,
            tick_interval_secs: 20,
            command_timeout_ms: 5_000,
        }
    }
}

impl AutomationConfig {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

/// One simulated meter and, optionally, the configuration it starts with.
#[derive(Debug, Deserialize)]
pub struct VirtualMeterConfig {
    pub id: DeviceId,
    pub name: String,
    #[serde(default = "single_phase")]
    pub layout: PhaseLayout,
    pub voltage: f64,
    pub current: f64,
    #[serde(default)]
    pub temperature: Option<f64>,
    /// Stored only when the device has no configuration yet.
    #[serde(default)]
    pub config: Option<DeviceConfig>,
}

fn single_phase() -> PhaseLayout {
    PhaseLayout::Single
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed {}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("{var}={value:?} is not a valid value")]
    Env { var: &'static str, value: String },
    #[error("invalid configuration: {0}")]
    Validation(String),
}

impl Config {
    /// Read the file, apply environment overrides and validate the result.
    ///
    /// # Errors
    ///
    /// Fails on an unreadable or malformed file, an unparsable override, or
    /// settings the automation cannot run with.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var_os("VOLTGUARD_CONFIG")
            .map_or_else(|| PathBuf::from(DEFAULT_PATH), PathBuf::from);
        let mut config = Self::from_file(&path)?;
        config.apply_env_overrides(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `RUST_LOG` wins over `VOLTGUARD_LOG`.
    fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(url) = lookup("VOLTGUARD_DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(filter) = lookup("RUST_LOG").or_else(|| lookup("VOLTGUARD_LOG")) {
            self.logging.filter = filter;
        }
        parse_var(&lookup, "VOLTGUARD_POLL_SECS", &mut self.automation.poll_interval_secs)?;
        parse_var(&lookup, "VOLTGUARD_TICK_SECS", &mut self.automation.tick_interval_secs)?;
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| Err(ConfigError::Validation(reason.to_string()));
        let automation = &self.automation;
        if automation.poll_interval_secs == 0 {
            return invalid("poll interval must be non-zero");
        }
        if !(1..=60).contains(&automation.tick_interval_secs) {
            return invalid("tick interval must be within 1..=60 seconds");
        }
        if automation.command_timeout_ms == 0 {
            return invalid("command timeout must be non-zero");
        }
        if self.database.max_connections == 0 {
            return invalid("database needs at least one connection");
        }
        for meter in &self.virtual_meters {
            if let Some(config) = &meter.config {
                config.validate().map_err(|err| {
                    ConfigError::Validation(format!("virtual meter {}: {err}", meter.name))
                })?;
            }
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    target: &mut T,
) -> Result<(), ConfigError> {
    let Some(value) = lookup(var) else {
        return Ok(());
    };
    *target = value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Env { var, value })?;
    Ok(())
}
