//! Relay configuration
//!
//! Loaded from a TOML file; every field has a default so a partial (or
//! empty) file is valid. Command-line flags are applied on top in `main`.
//!
//! ```toml
//! bind = "0.0.0.0:3000"
//! allowed_origins = ["http://localhost:3001"]
//!
//! [retention]
//! completed_retention_secs = 300
//! abandoned_after_secs = 600
//!
//! [logging]
//! level = "info"
//! pretty = false
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use strokecast_core::GapDetectorConfig;
use strokecast_logging::{FileConfig, LogConfig, RotationStrategy};

use crate::error::ConfigError;

/// Top-level relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Address the HTTP/WebSocket server listens on
    pub bind: SocketAddr,
    /// Browser origins allowed to connect
    pub allowed_origins: Vec<String>,
    /// Accept any origin (development only)
    pub allow_any_origin: bool,
    /// Capacity of each participant's outbound queue
    pub outbound_buffer: usize,
    pub retention: RetentionConfig,
    pub logging: LoggingSection,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 3000)),
            allowed_origins: vec!["http://localhost:3001".to_string()],
            allow_any_origin: false,
            outbound_buffer: 256,
            retention: RetentionConfig::default(),
            logging: LoggingSection::default(),
        }
    }
}

/// How long the relay remembers strokes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub completed_retention_secs: u64,
    pub abandoned_after_secs: u64,
    pub max_strokes_per_session: usize,
    /// Interval of the eviction sweep
    pub maintenance_interval_secs: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            completed_retention_secs: 300,
            abandoned_after_secs: 600,
            max_strokes_per_session: 10_000,
            maintenance_interval_secs: 60,
        }
    }
}

/// Log output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    /// Human-readable console output instead of JSONL
    pub pretty: bool,
    /// Also write JSONL files in this directory
    pub dir: Option<PathBuf>,
    pub rotation: RotationStrategy,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            pretty: false,
            dir: None,
            rotation: RotationStrategy::Daily,
        }
    }
}

impl RelayConfig {
    /// Load a config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the relay cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.outbound_buffer == 0 {
            return Err(ConfigError::Invalid("outbound_buffer must be at least 1".into()));
        }
        if self.retention.maintenance_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "retention.maintenance_interval_secs must be at least 1".into(),
            ));
        }
        if self.retention.max_strokes_per_session == 0 {
            return Err(ConfigError::Invalid(
                "retention.max_strokes_per_session must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Gap detector settings for each session
    pub fn gap_config(&self) -> GapDetectorConfig {
        GapDetectorConfig {
            completed_retention: Duration::from_secs(self.retention.completed_retention_secs),
            abandoned_after: Duration::from_secs(self.retention.abandoned_after_secs),
            max_strokes: self.retention.max_strokes_per_session,
        }
    }

    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(self.retention.maintenance_interval_secs)
    }

    /// Whether a browser origin may connect
    pub fn origin_allowed(&self, origin: &str) -> bool {
        self.allow_any_origin || self.allowed_origins.iter().any(|o| o == origin)
    }

    /// Subscriber configuration for the logging section
    pub fn log_config(&self) -> LogConfig {
        let mut config = if self.logging.pretty {
            LogConfig::development()
        } else {
            LogConfig::default()
        };
        config.level = self.logging.level.clone();
        match &self.logging.dir {
            Some(dir) => config.with_file(FileConfig {
                directory: dir.clone(),
                prefix: "strokecast-relay".to_string(),
                rotation: self.logging.rotation,
            }),
            None => config,
        }
    }
}
