//! Structured logging setup for modlog
//!
//! The storage crates only emit `tracing` events; binaries decide where they
//! go by installing a subscriber built here.
//!
//! # Features
//!
//! - **JSONL Output**: Structured JSON lines for log aggregation (default)
//! - **Pretty Console**: Human-readable output for development and CLIs
//! - **File Rotation**: Daily/hourly log rotation via tracing-appender
//! - **Per-target Filters**: `RUST_LOG` or configured directives
//!
//! # Quick Start
//!
//! ```ignore
//! use modlog_logging::{LogConfig, ModlogSubscriberBuilder};
//!
//! // Simple setup with defaults (JSONL to stderr)
//! let _guard = ModlogSubscriberBuilder::new().init()?;
//!
//! // Development mode with pretty human-readable output
//! let _guard = ModlogSubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .init()?;
//! ```
//!
//! Keep the returned guard alive while logging to a file; dropping it
//! flushes the background writer.

pub mod config;
pub mod layers;

pub use config::{ConsoleConfig, FileConfig, JsonlConfig, LogConfig, RotationStrategy};
pub use tracing_appender::non_blocking::WorkerGuard;

use thiserror::Error;
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Errors raised while installing the subscriber
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    #[error("Failed to open log file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to create log appender: {0}")]
    Appender(#[from] tracing_appender::rolling::InitError),

    #[error("Global subscriber already set: {0}")]
    AlreadyInitialized(#[from] tracing_subscriber::util::TryInitError),
}

/// Builder for configuring and initializing the modlog logging subscriber
///
/// By default, console output uses JSONL format. Use `LogConfig::development()`
/// or `LogConfig::cli()` for human-readable output.
#[derive(Debug, Clone, Default)]
pub struct ModlogSubscriberBuilder {
    config: LogConfig,
}

impl ModlogSubscriberBuilder {
    /// Create a new subscriber builder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.default_level = level.into();
        self
    }

    /// Override the level of one target
    pub fn with_target_level(mut self, target: impl Into<String>, level: impl Into<String>) -> Self {
        self.config.targets.insert(target.into(), level.into());
        self
    }

    /// Enable or disable console output
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    /// Configure file output
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    /// The configuration this builder will install
    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Build the level filter, preferring `RUST_LOG` when it is set
    pub fn env_filter(&self) -> Result<EnvFilter, LoggingError> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => Ok(EnvFilter::try_new(self.config.directives().join(","))?),
        }
    }

    /// Initialize the subscriber globally
    ///
    /// Returns the file writer's guard when file output is configured; it
    /// must be kept alive for the duration of the program.
    ///
    /// # Errors
    ///
    /// Fails if the filter is malformed, the log file cannot be opened, or
    /// a global subscriber has already been set.
    pub fn init(self) -> Result<Option<WorkerGuard>, LoggingError> {
        let filter = self.env_filter()?;
        let console = &self.config.console;
        let jsonl = &self.config.jsonl;

        let pretty_console = (console.enabled && console.pretty)
            .then(|| layers::pretty_layer(console.ansi));
        let jsonl_console = (console.enabled && !console.pretty)
            .then(|| layers::jsonl_console_layer(jsonl));

        let (file_layer, guard) = match &self.config.file {
            Some(file_config) => {
                let (writer, guard) = layers::file_writer(file_config)?;
                (Some(layers::jsonl_layer(writer, jsonl)), Some(guard))
            }
            None => (None, None),
        };

        Registry::default()
            .with(filter)
            .with(pretty_console)
            .with(jsonl_console)
            .with(file_layer)
            .try_init()?;

        Ok(guard)
    }
}

/// Initialize logging for testing (minimal output)
///
/// Safe to call from every test; only the first call installs a subscriber.
pub fn init_testing() {
    let _ = ModlogSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .init();
}
