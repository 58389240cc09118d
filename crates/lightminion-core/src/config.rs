//! Minion configuration
//!
//! The configuration file is loaded before startup and written back on clean
//! shutdown, so an identity assigned by the hub on first run is reused on the
//! next one.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::light::ValueEncoding;
use crate::logging::LogConfig;
use crate::reconcile::ReconcilerConfig;
use crate::{error::CoreError, Result};

/// Kind reported to the hub when registering
pub const MINION_KIND: &str = "lighting";

/// DMX transmission protocol
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    ArtNet,
    Sacn,
}

/// Transmission sink settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub protocol: Protocol,
    /// Art-Net destination (`host:port`)
    pub target: String,
    /// sACN source name (up to 63 bytes are sent)
    pub source_name: String,
    /// sACN priority (0-200)
    pub priority: u8,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            protocol: Protocol::ArtNet,
            target: "255.255.255.255:6454".to_string(),
            source_name: "LightMinion".to_string(),
            priority: 100,
        }
    }
}

/// Persisted minion configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinionConfig {
    /// Hub base URL. `None` runs offline with the local clock.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    /// Identity assigned by the hub
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_resync_interval_ms")]
    pub resync_interval_ms: u64,
    #[serde(default)]
    pub value_encoding: ValueEncoding,
    #[serde(default = "default_require_settings")]
    pub require_settings: bool,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub log: LogConfig,
}

fn default_kind() -> String {
    MINION_KIND.to_string()
}

fn default_tick_interval_ms() -> u64 {
    20
}

fn default_resync_interval_ms() -> u64 {
    1000
}

fn default_require_settings() -> bool {
    true
}

impl Default for MinionConfig {
    fn default() -> Self {
        Self {
            server: None,
            id: None,
            kind: default_kind(),
            debug: false,
            tick_interval_ms: default_tick_interval_ms(),
            resync_interval_ms: default_resync_interval_ms(),
            value_encoding: ValueEncoding::default(),
            require_settings: default_require_settings(),
            output: OutputConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl MinionConfig {
    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty JSON.
    ///
    /// The file is written next to its destination and renamed into place.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=1000).contains(&self.tick_interval_ms) {
            return Err(CoreError::InvalidConfig(format!(
                "tick_interval_ms must be 1-1000, got {}",
                self.tick_interval_ms
            )));
        }
        if self.resync_interval_ms == 0 {
            return Err(CoreError::InvalidConfig(
                "resync_interval_ms must be positive".to_string(),
            ));
        }
        if self.output.priority > 200 {
            return Err(CoreError::InvalidConfig(format!(
                "output.priority must be 0-200, got {}",
                self.output.priority
            )));
        }
        if let Some(server) = &self.server {
            if server.trim().is_empty() {
                return Err(CoreError::InvalidConfig("server must not be empty".to_string()));
            }
        }
        if self.id.as_deref().is_some_and(|id| id.trim().is_empty()) {
            return Err(CoreError::InvalidConfig("id must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn identity(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn set_identity(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    /// Logging settings with the `debug` flag applied
    pub fn effective_log_config(&self) -> LogConfig {
        let mut log = self.log.clone();
        if self.debug {
            log.level = "debug".to_string();
        }
        log
    }

    pub fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            identity: self.id.clone(),
            encoding: self.value_encoding,
            require_settings: self.require_settings,
        }
    }
}
