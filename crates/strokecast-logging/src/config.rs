//! What the subscriber writes and where

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Subscriber settings
///
/// Services log JSON lines to stdout by default so a collector can pick
/// them up unchanged; [`LogConfig::development`] switches to readable output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    pub console: ConsoleFormat,
    /// Colored console output; only applies to [`ConsoleFormat::Pretty`]
    pub ansi: bool,
    /// JSON lines are also appended here when set
    pub file: Option<FileConfig>,
    /// Record source file and line with every event
    pub source_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console: ConsoleFormat::Json,
            ansi: false,
            file: None,
            source_location: false,
        }
    }
}

impl LogConfig {
    /// Pretty, colored, verbose output for local runs
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            console: ConsoleFormat::Pretty,
            ansi: true,
            source_location: true,
            ..Self::default()
        }
    }

    pub fn with_file(mut self, file: FileConfig) -> Self {
        self.file = Some(file);
        self
    }
}

/// Console output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleFormat {
    Off,
    #[default]
    Json,
    Pretty,
}

/// Log file location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub directory: PathBuf,
    /// File names are `<prefix>.<date>.log`, or `<prefix>.log` without rotation
    pub prefix: String,
    pub rotation: RotationStrategy,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./logs"),
            prefix: "strokecast".to_string(),
            rotation: RotationStrategy::Daily,
        }
    }
}

/// When to start a new log file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationStrategy {
    #[default]
    Daily,
    Hourly,
    /// One file, truncated on start
    Never,
}
