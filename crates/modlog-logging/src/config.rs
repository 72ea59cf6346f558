//! Configuration types for the logging system

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where log events go and how much of them
///
/// Every field has a default, so a `[logging]` table only needs the keys it
/// changes. `RUST_LOG` wins over `default_level` and `targets` when set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub default_level: String,
    pub console: ConsoleConfig,
    /// JSONL file output; off unless configured
    pub file: Option<FileConfig>,
    pub jsonl: JsonlConfig,
    /// Per-target levels, e.g. `modlog_storage = "debug"`
    pub targets: BTreeMap<String, String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_level: "info".to_string(),
            console: ConsoleConfig::default(),
            file: None,
            jsonl: JsonlConfig::default(),
            targets: BTreeMap::new(),
        }
    }
}

impl LogConfig {
    /// Debug level, pretty colored console
    pub fn development() -> Self {
        Self {
            default_level: "debug".to_string(),
            console: ConsoleConfig {
                enabled: true,
                pretty: true,
                ansi: true,
            },
            ..Default::default()
        }
    }

    /// Daily JSONL files in `log_dir`, a month kept, no console
    pub fn production(log_dir: PathBuf) -> Self {
        Self {
            default_level: "info".to_string(),
            console: ConsoleConfig {
                enabled: false,
                pretty: false,
                ansi: false,
            },
            file: Some(FileConfig {
                directory: log_dir,
                prefix: "modlog".to_string(),
                rotation: RotationStrategy::Daily,
                max_files: Some(30),
            }),
            ..Default::default()
        }
    }

    /// Warnings and errors only, plain text on stderr
    pub fn cli() -> Self {
        Self {
            default_level: "warn".to_string(),
            console: ConsoleConfig {
                enabled: true,
                pretty: true,
                ansi: false,
            },
            ..Default::default()
        }
    }

    /// Warnings only, for test binaries
    pub fn testing() -> Self {
        Self {
            default_level: "warn".to_string(),
            console: ConsoleConfig {
                enabled: true,
                pretty: false,
                ansi: false,
            },
            ..Default::default()
        }
    }

    /// Filter directives: the default level followed by per-target overrides
    pub fn directives(&self) -> Vec<String> {
        std::iter::once(self.default_level.clone())
            .chain(
                self.targets
                    .iter()
                    .map(|(target, level)| format!("{target}={level}")),
            )
            .collect()
    }
}

/// Console output, always on stderr so it never mixes with command output
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub enabled: bool,
    /// Human-readable lines instead of JSONL
    pub pretty: bool,
    /// Colored output; only honored with `pretty`
    pub ansi: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            pretty: false, // JSONL by default
            ansi: false,
        }
    }
}

/// Rotating JSONL log files
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub directory: PathBuf,
    /// Files are named `{prefix}.{date}.log`, or `{prefix}.log` without rotation
    pub prefix: String,
    pub rotation: RotationStrategy,
    /// Older rotated files beyond this count are removed
    pub max_files: Option<usize>,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./logs"),
            prefix: "modlog".to_string(),
            rotation: RotationStrategy::Daily,
            max_files: Some(7),
        }
    }
}

/// How often a new log file is started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RotationStrategy {
    #[default]
    Daily,
    Hourly,
    /// One file, truncated on start
    Never,
}

/// Shape of JSONL events
///
/// Event fields are always flattened to the top level and the innermost
/// span is always included as `span`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonlConfig {
    /// Add the full `spans` list
    pub include_spans: bool,
    /// Add source file and line
    pub include_location: bool,
}

impl Default for JsonlConfig {
    fn default() -> Self {
        Self {
            include_spans: true,
            include_location: true,
        }
    }
}
