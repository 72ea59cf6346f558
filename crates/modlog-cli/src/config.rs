use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use modlog_core::{RecordKey, SiteId};
use modlog_logging::LogConfig;
use modlog_storage::{ModlogConfig, RedbStorageConfig, StorageBackendConfig};
use serde::{Deserialize, Serialize};

/// Settings file read by the CLI
///
/// The storage settings sit at the top level; logging lives in a
/// `[logging]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    #[serde(flatten)]
    pub modlog: ModlogConfig,
    pub logging: LogConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            modlog: ModlogConfig::default(),
            logging: LogConfig::cli(),
        }
    }
}

impl CliConfig {
    /// Load the settings file, or defaults when no file is given
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.modlog.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides
    pub fn apply(&mut self, cli: &Cli) {
        if let Some(db) = &cli.db {
            let cache_size = match &self.modlog.storage {
                StorageBackendConfig::Redb(redb) => redb.cache_size,
                StorageBackendConfig::Memory => RedbStorageConfig::default().cache_size,
            };
            self.modlog.storage = StorageBackendConfig::Redb(RedbStorageConfig {
                db_path: db.clone(),
                cache_size,
            });
        }
        if let Some(site) = &cli.site {
            self.modlog.site = Some(site.clone());
        }
        if let Some(level) = &cli.log_level {
            self.logging.default_level = level.clone();
        }
    }

    /// The site to operate on
    pub fn site(&self) -> anyhow::Result<SiteId> {
        self.modlog
            .site_id()?
            .context("no site given; pass --site or set `site` in the config file")
    }
}

#[derive(Debug, Parser)]
#[command(name = "modlog", version, about = "Inspect, record and prune modification logs")]
pub struct Cli {
    /// Config file (TOML)
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Database file, overrides the config file's storage
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Site whose log to use
    #[arg(long, short)]
    pub site: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Record a change against an entity
    Record {
        /// Action (add, delete, modify, move) or a custom category
        action: String,
        /// Entity UID
        #[arg(long)]
        uid: String,
        /// Entity path
        #[arg(long)]
        path: String,
        /// Acting user, defaults to $MODLOG_USER or $USER
        #[arg(long)]
        user: Option<String>,
        /// Extra metadata, repeatable
        #[arg(long = "extra", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        extra: Vec<(String, String)>,
    },
    /// List records of a category, newest first
    List {
        /// Category (noun or verb form)
        category: String,
        /// Only records whose path starts with this prefix
        #[arg(long)]
        path: Option<String>,
        /// Only records by this user
        #[arg(long)]
        user: Option<String>,
        /// Only records for this entity
        #[arg(long)]
        uid: Option<String>,
        /// Exact match on any field, repeatable
        #[arg(long = "field", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        fields: Vec<(String, String)>,
        /// Skip this many records (matching records when filtering)
        #[arg(long, default_value_t = 0)]
        start: usize,
        /// Stop after this many records
        #[arg(long)]
        limit: Option<usize>,
        /// Print JSON lines instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show one record
    Show {
        /// Category (noun or verb form)
        category: String,
        /// Record key
        #[arg(allow_negative_numbers = true)]
        key: RecordKey,
        /// Print JSON
        #[arg(long)]
        json: bool,
    },
    /// Summarize the site's categories
    Stats {
        /// Print JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete old records
    Prune {
        /// Only this category (default: all accepted categories)
        #[arg(long)]
        category: Option<String>,
        /// Delete records older than this many days
        #[arg(long, conflicts_with = "before")]
        days: Option<f64>,
        /// Delete records logged before this time (RFC 3339)
        #[arg(long)]
        before: Option<DateTime<Utc>>,
        /// Compact the database file afterwards
        #[arg(long)]
        compact: bool,
    },
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))
}
