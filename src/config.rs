use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::log::LogLevel;
use crate::{blog_debug, Error, Result};

/// Default interval between fan-in status checks.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Default capacity of the batch event channel.
pub const DEFAULT_EVENT_BUFFER: usize = 64;

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_event_buffer() -> usize {
    DEFAULT_EVENT_BUFFER
}

/// Runtime settings for batch orchestration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Upper bound on how long the fan-in wait sleeps between status checks
    /// when no sub-task pushes a change notification.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub debug: bool,
    /// Overrides the level implied by `debug` when set.
    pub log_level: Option<String>,
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            debug: false,
            log_level: None,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

impl BatchConfig {
    pub fn batchmode_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".batchmode"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::batchmode_dir()?.join("batchmode.toml"))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn effective_log_level(&self) -> LogLevel {
        self.log_level
            .as_deref()
            .and_then(LogLevel::parse)
            .unwrap_or(if self.debug {
                LogLevel::Debug
            } else {
                LogLevel::Info
            })
    }

    /// Start file logging in ~/.batchmode at the configured level.
    pub fn init_logging(&self) {
        crate::log::init(self.debug);
        crate::log::set_level(self.effective_log_level());
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(Error::Validation(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.event_buffer == 0 {
            return Err(Error::Validation(
                "event_buffer must be greater than zero".to_string(),
            ));
        }
        if let Some(level) = &self.log_level {
            if LogLevel::parse(level).is_none() {
                return Err(Error::Validation(format!("unknown log level '{}'", level)));
            }
        }
        Ok(())
    }

    /// Load from ~/.batchmode/batchmode.toml, falling back to defaults.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        blog_debug!("BatchConfig::load path={}", path.display());
        if !path.exists() {
            blog_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(path)?)?;
        config.validate()?;
        blog_debug!(
            "Config loaded: poll_interval_ms={}, debug={}, event_buffer={}",
            config.poll_interval_ms,
            config.debug,
            config.event_buffer
        );
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        blog_debug!("Config saved to {}", path.display());
        Ok(())
    }
}
