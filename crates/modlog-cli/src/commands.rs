//! Subcommand implementations
//!
//! Each command writes its output to the given writer so it can be run
//! against an in-memory log in tests.

use std::io::Write;

use anyhow::{Context, bail};
use chrono::SecondsFormat;
use modlog_core::{ActorResolver, Category, ChangeRecord, ContentRef, Extra, RecordFilter, RecordKey};
use modlog_storage::{ModificationLog, PruneReport};
use serde::Serialize;
use tracing::info;

/// Actor taken from `$MODLOG_USER`, falling back to `$USER`
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvActor;

impl ActorResolver for EnvActor {
    fn current_actor(&self) -> Option<String> {
        ["MODLOG_USER", "USER"]
            .into_iter()
            .find_map(|name| std::env::var(name).ok().filter(|user| !user.is_empty()))
    }
}

#[derive(Serialize)]
struct KeyedRecord<'a> {
    key: RecordKey,
    #[serde(flatten)]
    record: &'a ChangeRecord,
}

#[derive(Debug, Serialize)]
pub struct CategoryStats {
    pub category: Category,
    pub records: usize,
    pub order: usize,
    pub consistent: bool,
    pub newest: Option<chrono::DateTime<chrono::Utc>>,
}

/// `record`: log one change and print its key
pub fn record(
    log: &ModificationLog,
    action: &str,
    uid: String,
    path: String,
    user: Option<&str>,
    extra: Vec<(String, String)>,
    out: &mut impl Write,
) -> anyhow::Result<RecordKey> {
    let content = ContentRef::new(uid, path);
    let extra: Extra = extra.into_iter().collect();
    let extra = (!extra.is_empty()).then_some(extra);

    let key = log
        .log(action, &content, user, extra)
        .with_context(|| format!("recording '{action}' for {}", content.uid))?;
    writeln!(out, "{key}")?;
    Ok(key)
}

/// Filter assembled from the `list` flags
pub fn build_filter(
    path: Option<String>,
    user: Option<String>,
    uid: Option<String>,
    fields: Vec<(String, String)>,
) -> RecordFilter {
    let mut filter: RecordFilter = fields.into_iter().collect();
    if let Some(path) = path {
        filter = filter.path_prefix(path);
    }
    if let Some(user) = user {
        filter = filter.user(user);
    }
    if let Some(uid) = uid {
        filter = filter.uid(uid);
    }
    filter
}

/// `list`: print records newest first
pub fn list(
    log: &ModificationLog,
    category: &str,
    filter: &RecordFilter,
    start: usize,
    limit: Option<usize>,
    json: bool,
    out: &mut impl Write,
) -> anyhow::Result<usize> {
    let view = log.view(category)?;
    let items = view
        .limit_items(Some(filter), start)?
        .take(limit.unwrap_or(usize::MAX));

    let mut printed = 0;
    for item in items {
        let (key, record) = item?;
        if json {
            serde_json::to_writer(&mut *out, &KeyedRecord { key, record: &record })?;
            writeln!(out)?;
        } else {
            writeln!(out, "{}", format_row(key, &record))?;
        }
        printed += 1;
    }
    Ok(printed)
}

/// `show`: print one record in full
pub fn show(
    log: &ModificationLog,
    category: &str,
    key: RecordKey,
    json: bool,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let view = log.view(category)?;
    let Some(record) = view.get(key)? else {
        bail!("no record {key} in category '{}'", view.name());
    };

    if json {
        serde_json::to_writer_pretty(&mut *out, &KeyedRecord { key, record: &record })?;
        writeln!(out)?;
        return Ok(());
    }

    writeln!(out, "key:       {key}")?;
    writeln!(out, "category:  {}", view.name())?;
    writeln!(out, "uid:       {}", record.uid)?;
    writeln!(out, "path:      {}", record.path)?;
    writeln!(out, "user:      {}", record.user)?;
    writeln!(
        out,
        "timestamp: {}",
        record.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
    )?;
    for (name, value) in record.extra.iter().flatten() {
        writeln!(out, "{name}: {value}")?;
    }
    Ok(())
}

/// `stats`: sizes and health of every category
pub fn stats(log: &ModificationLog, json: bool, out: &mut impl Write) -> anyhow::Result<Vec<CategoryStats>> {
    let mut categories = log.accepted_categories();
    for category in log.backend().categories(log.site())? {
        if !categories.contains(&category) {
            categories.push(category);
        }
    }

    let mut stats = Vec::with_capacity(categories.len());
    for category in categories {
        let view = log.view(category.as_str()).ok();
        let counts = log.backend().counts(log.site(), &category)?;
        let newest = match &view {
            Some(view) => view.values()?.next().transpose()?.map(|record| record.timestamp),
            None => None,
        };
        stats.push(CategoryStats {
            category,
            records: counts.records,
            order: counts.order,
            consistent: counts.is_consistent(),
            newest,
        });
    }

    if json {
        serde_json::to_writer_pretty(&mut *out, &stats)?;
        writeln!(out)?;
    } else {
        writeln!(out, "site {}", log.site())?;
        for entry in &stats {
            let newest = entry
                .newest
                .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Secs, true))
                .unwrap_or_else(|| "-".to_string());
            let health = if entry.consistent { "ok" } else { "INCONSISTENT" };
            writeln!(
                out,
                "{:<16} {:>8}  newest {:<22} {}",
                entry.category.as_str(),
                entry.order,
                newest,
                health
            )?;
        }
    }
    Ok(stats)
}

/// `prune`: delete old records and print what happened
///
/// Falls back to `retention_days` when neither bound is given. Fails if
/// any selected record could not be deleted.
pub fn prune(
    log: &ModificationLog,
    category: Option<&str>,
    days: Option<f64>,
    before: Option<chrono::DateTime<chrono::Utc>>,
    retention_days: Option<f64>,
    out: &mut impl Write,
) -> anyhow::Result<PruneReport> {
    let days = days.or(if before.is_none() { retention_days } else { None });
    if days.is_none() && before.is_none() {
        bail!("no prune bound; pass --days or --before, or set retention_days in the config file");
    }
    let report = log.prune(category, days, before)?;

    for (category, removed) in &report.removed {
        let retained = report.retained.get(category).copied().unwrap_or(0);
        writeln!(out, "{:<16} removed {removed:>8}  kept {retained:>8}", category.as_str())?;
    }
    for failure in &report.failures {
        match failure.key {
            Some(key) => writeln!(out, "failed {} {key}: {}", failure.category, failure.error)?,
            None => writeln!(out, "failed {}: {}", failure.category, failure.error)?,
        }
    }
    info!(
        site = %log.site(),
        removed = report.total_removed(),
        failed = report.failures.len(),
        "Prune finished"
    );

    if !report.is_complete() {
        bail!("prune incomplete: {} failures", report.failures.len());
    }
    Ok(report)
}

fn format_row(key: RecordKey, record: &ChangeRecord) -> String {
    format!(
        "{key:>11}  {}  {:<12}  {:<36}  {}",
        record.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        record.user,
        record.uid,
        record.path
    )
}
