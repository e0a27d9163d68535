//! Structured logging setup for strokecast services
//!
//! Library crates only emit `tracing` events; binaries call into this crate
//! once at startup to decide where those events go.
//!
//! # Features
//!
//! Console output is JSON lines by default or pretty for development. Files
//! always get JSON lines, rotated daily or hourly by `tracing-appender`.
//! `RUST_LOG` overrides the configured level.
//!
//! ```ignore
//! use strokecast_logging::{LogConfig, SubscriberBuilder};
//!
//! let _guard = SubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .try_init()?;
//! ```

pub mod config;

pub use config::{ConsoleFormat, FileConfig, LogConfig, RotationStrategy};
pub use tracing_appender::non_blocking::WorkerGuard;

use std::fs::{self, File};
use std::path::PathBuf;

use thiserror::Error;
use tracing_appender::non_blocking::NonBlocking;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Errors raised while installing the subscriber
#[derive(Debug, Error)]
pub enum LogError {
    #[error("Invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("Failed to open log file in {}: {reason}", path.display())]
    File { path: PathBuf, reason: String },

    #[error("A global subscriber is already set: {0}")]
    AlreadyInitialized(String),
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Builds and installs the global subscriber
pub struct SubscriberBuilder {
    config: LogConfig,
}

impl SubscriberBuilder {
    pub fn new() -> Self {
        Self {
            config: LogConfig::default(),
        }
    }

    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.level = level.into();
        self
    }

    pub fn with_console(mut self, format: ConsoleFormat) -> Self {
        self.config.console = format;
        self
    }

    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Install the subscriber globally
    ///
    /// Returns a guard that must be kept alive for the duration of the
    /// program when file output is enabled; dropping it flushes the file.
    pub fn try_init(self) -> Result<Option<WorkerGuard>, LogError> {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.config.level))
            .map_err(|e| LogError::InvalidFilter {
                filter: self.config.level.clone(),
                reason: e.to_string(),
            })?;

        let mut layers: Vec<BoxedLayer> = Vec::new();
        let mut guard = None;

        let location = self.config.source_location;
        match self.config.console {
            ConsoleFormat::Off => {}
            ConsoleFormat::Json => layers.push(json_layer(location, std::io::stdout)),
            ConsoleFormat::Pretty => layers.push(
                fmt::layer()
                    .with_ansi(self.config.ansi)
                    .with_file(location)
                    .with_line_number(location)
                    .boxed(),
            ),
        }

        if let Some(file_config) = &self.config.file {
            let (writer, file_guard) = create_file_writer(file_config)?;
            guard = Some(file_guard);
            layers.push(json_layer(location, writer));
        }

        Registry::default()
            .with(layers)
            .with(filter)
            .try_init()
            .map_err(|e| LogError::AlreadyInitialized(e.to_string()))?;

        Ok(guard)
    }
}

impl Default for SubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Event fields are flattened to the top level; the current span (which
/// carries the package key on instrumented calls) is kept as `span`
fn json_layer<W>(location: bool, writer: W) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    fmt::layer()
        .json()
        .flatten_event(true)
        .with_current_span(true)
        .with_span_list(false)
        .with_file(location)
        .with_line_number(location)
        .with_writer(writer)
        .boxed()
}

/// Truncates a single file for `Never`, appends to rolling files otherwise
fn create_file_writer(config: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LogError> {
    let file_error = |reason: String| LogError::File {
        path: config.directory.clone(),
        reason,
    };

    let rotation = match config.rotation {
        RotationStrategy::Never => {
            fs::create_dir_all(&config.directory).map_err(|e| file_error(e.to_string()))?;
            let path = config.directory.join(format!("{}.log", config.prefix));
            let file = File::create(&path).map_err(|e| file_error(e.to_string()))?;
            return Ok(tracing_appender::non_blocking(file));
        }
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
    };

    let appender = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(&config.prefix)
        .filename_suffix("log")
        .build(&config.directory)
        .map_err(|e| file_error(e.to_string()))?;
    Ok(tracing_appender::non_blocking(appender))
}
