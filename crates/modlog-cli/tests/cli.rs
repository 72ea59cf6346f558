//! Runs commands end to end against a database file

use std::path::Path;

use clap::Parser;
use modlog_cli::config::{Cli, CliConfig};
use tempfile::TempDir;

fn run(db: &Path, args: &[&str]) -> anyhow::Result<String> {
    let db = db.to_string_lossy().into_owned();
    let mut argv = vec!["modlog", "--db", db.as_str(), "--site", "plone"];
    argv.extend_from_slice(args);

    let cli = Cli::try_parse_from(argv)?;
    let mut config = CliConfig::load(cli.config.as_deref())?;
    config.apply(&cli);

    let mut out = Vec::new();
    modlog_cli::run(cli.command, &config, &mut out)?;
    Ok(String::from_utf8(out)?)
}

#[test]
fn test_records_persist_between_runs() {
    let temp_dir = TempDir::new().unwrap();
    let db = temp_dir.path().join("modlog.redb");

    let first = run(&db, &["record", "add", "--uid", "u1", "--path", "/plone/a", "--user", "alice"]).unwrap();
    run(&db, &["record", "modify", "--uid", "u1", "--path", "/plone/a", "--user", "bob"]).unwrap();
    run(&db, &["record", "add", "--uid", "u2", "--path", "/plone/b", "--user", "bob"]).unwrap();

    let listed = run(&db, &["list", "additions", "--json"]).unwrap();
    let records: Vec<serde_json::Value> = listed
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["uid"], "u2");
    assert_eq!(records[1]["uid"], "u1");

    let key = first.trim();
    let shown = run(&db, &["show", "add", key]).unwrap();
    assert!(shown.contains("user:      alice"));

    let filtered = run(&db, &["list", "add", "--user", "alice"]).unwrap();
    assert_eq!(filtered.lines().count(), 1);

    let stats = run(&db, &["stats", "--json"]).unwrap();
    let stats: serde_json::Value = serde_json::from_str(&stats).unwrap();
    assert_eq!(stats.as_array().unwrap().len(), 4);
}

#[test]
fn test_prune_and_compact() {
    let temp_dir = TempDir::new().unwrap();
    let db = temp_dir.path().join("modlog.redb");

    for n in 0..3 {
        let path = format!("/plone/doc{n}");
        let uid = format!("u{n}");
        run(&db, &["record", "move", "--uid", &uid, "--path", &path, "--user", "admin"]).unwrap();
    }

    // Everything was logged before the far-future cutoff
    let pruned = run(&db, &["prune", "--before", "2999-01-01T00:00:00Z", "--compact"]).unwrap();
    assert!(pruned.contains("moves"));
    assert!(pruned.contains("compacted:"));

    let listed = run(&db, &["list", "moves"]).unwrap();
    assert!(listed.is_empty());
}

#[test]
fn test_prune_without_bound_fails() {
    let temp_dir = TempDir::new().unwrap();
    let db = temp_dir.path().join("modlog.redb");
    assert!(run(&db, &["prune"]).is_err());
}

#[test]
fn test_missing_site_fails() {
    let temp_dir = TempDir::new().unwrap();
    let db = temp_dir.path().join("modlog.redb");
    let cli = Cli::try_parse_from(["modlog", "--db", db.to_str().unwrap(), "stats"]).unwrap();
    let mut config = CliConfig::default();
    config.apply(&cli);
    assert!(modlog_cli::run(cli.command, &config, &mut Vec::new()).is_err());
}
