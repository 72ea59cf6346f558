//! # Modlog CLI
//!
//! Operator tool for a persisted modification log: record changes by
//! hand, browse categories, check their health, and prune old records.

pub mod commands;
pub mod config;

use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use modlog_storage::{ModificationLog, RedbBackend, StorageBackendConfig};
use tracing::debug;

use crate::commands::EnvActor;
use crate::config::{CliConfig, Command};

/// Open the configured backend and build the site's log
pub fn open_log(config: &CliConfig) -> anyhow::Result<ModificationLog> {
    let site = config.site()?;
    let backend = config.modlog.open_backend().context("opening storage")?;
    let log = config
        .modlog
        .log_builder(backend, site)
        .actor_resolver(Arc::new(EnvActor))
        .build()?;
    debug!(site = %log.site(), "Opened modification log");
    Ok(log)
}

/// Run one command against the configured log
pub fn run(command: Command, config: &CliConfig, out: &mut impl Write) -> anyhow::Result<()> {
    let log = open_log(config)?;

    match command {
        Command::Record {
            action,
            uid,
            path,
            user,
            extra,
        } => {
            commands::record(&log, &action, uid, path, user.as_deref(), extra, out)?;
        }

        Command::List {
            category,
            path,
            user,
            uid,
            fields,
            start,
            limit,
            json,
        } => {
            let filter = commands::build_filter(path, user, uid, fields);
            commands::list(&log, &category, &filter, start, limit, json, out)?;
        }

        Command::Show {
            category,
            key,
            json,
        } => {
            commands::show(&log, &category, key, json, out)?;
        }

        Command::Stats { json } => {
            commands::stats(&log, json, out)?;
        }

        Command::Prune {
            category,
            days,
            before,
            compact,
        } => {
            commands::prune(
                &log,
                category.as_deref(),
                days,
                before,
                config.modlog.retention_days,
                out,
            )?;
            if compact {
                // Compaction needs the only handle to the database
                drop(log);
                compact_storage(config, out)?;
            }
        }
    }

    Ok(())
}

fn compact_storage(config: &CliConfig, out: &mut impl Write) -> anyhow::Result<()> {
    match &config.modlog.storage {
        StorageBackendConfig::Redb(redb) => {
            let mut backend = RedbBackend::open(redb.clone()).context("reopening database")?;
            let compacted = backend.compact()?;
            writeln!(out, "compacted: {compacted}")?;
        }
        StorageBackendConfig::Memory => {
            writeln!(out, "memory storage, nothing to compact")?;
        }
    }
    Ok(())
}
