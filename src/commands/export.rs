//! `data-transfer export` — dump the configured database into the cache
//! directory.
//!
//! This is what `fetch` runs on the remote host.  It is quiet on success
//! apart from the stage line, and on failure returns an error carrying
//! mysqldump's output.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::{
    cli::Cli,
    config::Config,
    dump,
    error::TransferError,
    runner::mysqldump_args,
    ui::run_stage,
};

pub fn run(cli: &Cli, cfg: &Config) -> Result<()> {
    cfg.require_database()?;

    let dir = cfg.cache_dir(&cli.env);
    fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

    let target = export(cfg, &dir)?;
    info!(path = %target.display(), "database dumped");
    Ok(())
}

/// Rotate the previous dump, prune expired ones, then run mysqldump into
/// `<dir>/db-dump.sql`.  Returns the path of the new dump.
pub fn export(cfg: &Config, dir: &Path) -> Result<PathBuf, TransferError> {
    if let Some(archived) = dump::rotate_previous(dir)? {
        debug!(path = %archived.display(), "kept previous dump");
    }
    let removed = dump::prune_expired(dir, dump::now_epoch())?;
    if !removed.is_empty() {
        info!(count = removed.len(), "pruned dumps older than 24h");
    }

    let target = dump::dump_path(dir);
    let outcome = run_stage("Dump database", &mysqldump_args(&cfg.database, &target), None);
    outcome.print();

    if outcome.failed() {
        return Err(TransferError::Dump {
            output: outcome.output(),
        });
    }
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> Config {
        toml::from_str("[database]\nname = \"shop\"\nuser = \"root\"\n").unwrap()
    }

    // mysqldump is not expected to be installed (or reachable) in the test
    // environment; if it is missing the stage fails at spawn time, which
    // still exercises the error path.
    #[test]
    fn failed_dump_reports_dump_error_and_rotates_previous() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dump::dump_path(dir.path()), "-- previous").unwrap();

        let mut cfg = cfg();
        cfg.database.host = "127.0.0.1".into();
        cfg.database.export_arguments = vec!["--port=1".into(), "--connect-timeout=1".into()];

        let err = export(&cfg, dir.path()).unwrap_err();
        assert!(matches!(err, TransferError::Dump { .. }), "got: {err}");
        assert!(err.to_string().starts_with("Error dumping database"));

        let archived: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().to_str().and_then(dump::parse_archived_epoch))
            .collect();
        assert_eq!(archived.len(), 1, "previous dump should be archived");
    }

    #[test]
    fn run_fails_fast_on_missing_database_fields() {
        use clap::Parser;
        let cli = Cli::parse_from(["data-transfer", "export"]);
        let err = run(&cli, &Config::default()).unwrap_err();
        assert!(err.to_string().contains("database.name"), "got: {err}");
    }
}
