//! `data-transfer fetch` — pull the remote database and folders.
//!
//! # Stages (in order)
//!
//! | # | Stage          | Skipped by      | Command                                  |
//! |---|----------------|-----------------|------------------------------------------|
//! | 1 | Remote export  | `--files-only`  | `ssh … "cd <dir> ; <console> export"`    |
//! | 2 | Download       | `--files-only`  | `scp -P <port> …`                        |
//! | 3 | Validate dump  | `--files-only`  | in-process header/trailer check          |
//! | 4 | Import         | `--files-only`  | `mysql … < db-dump.sql`                  |
//! | 5 | Sync <folder>  | `--db-only`     | `rsync -LK -P …`, once per mapping       |
//!
//! The database stages (1–4) and the folder stages (5) are two independent
//! branches.  A failure stops the rest of its own branch, is reported, and
//! the other branch still runs; the command then exits non-zero.  Nothing
//! already done is rolled back.

use std::{fs, path::Path};

use anyhow::{Result, bail};
use tracing::info;

use crate::{
    cli::Cli,
    config::Config,
    dump,
    error::TransferError,
    progress::RsyncProgress,
    runner::{mysql_args, rsync_args, scp_args, ssh_export_args},
    ui::{
        StageOutcome, TickBar, heading, local_stage, note, print_error, print_summary,
        run_stage, run_streaming_stage,
    },
};

// ─── Entry point ──────────────────────────────────────────────────────────────

pub fn run(cli: &Cli, cfg: &Config, db_only: bool, files_only: bool) -> Result<()> {
    let mut outcomes: Vec<StageOutcome> = Vec::new();
    let mut failed: Vec<&str> = Vec::new();

    if !files_only {
        heading("Fetching database");
        if let Err(e) = fetch_database(cli, cfg, &mut outcomes) {
            print_error(&e.into());
            failed.push("database");
        }
    }

    if !db_only {
        println!();
        heading("Fetching files");
        if let Err(e) = fetch_files(cfg, &mut outcomes) {
            print_error(&e.into());
            failed.push("files");
        }
    }

    print_summary(&outcomes, "Fetch");

    if !failed.is_empty() {
        bail!("fetch failed: {}", failed.join(", "));
    }
    Ok(())
}

// ─── Database branch ──────────────────────────────────────────────────────────

/// Export on the remote, download, validate, import.
pub fn fetch_database(
    cli: &Cli,
    cfg: &Config,
    outcomes: &mut Vec<StageOutcome>,
) -> Result<(), TransferError> {
    cfg.require_database()?;
    cfg.require_remote(true)?;

    let dir = cfg.cache_dir(&cli.env);
    fs::create_dir_all(&dir)?;
    let local_dump = dump::dump_path(&dir);

    record(
        outcomes,
        run_stage("Remote export", &ssh_export_args(cfg), None),
        |o| TransferError::RemoteExport { output: o.output() },
    )?;

    record(
        outcomes,
        run_stage("Download", &scp_args(cfg, &local_dump), None),
        |o| TransferError::Transfer { output: o.output() },
    )?;

    if cfg.local.validate_dump {
        let result = dump::validate_dump(&local_dump);
        let outcome = local_stage("Validate dump", result.as_ref().err().map(ToString::to_string));
        outcome.print();
        outcomes.push(outcome);
        result?;
    }

    record(
        outcomes,
        run_stage("Import", &mysql_args(&cfg.database), Some(&local_dump)),
        |o| TransferError::Import {
            stdout: o.stdout.clone(),
            stderr: o.error_output(),
        },
    )?;

    info!(database = %cfg.database.name, "remote database imported");
    Ok(())
}

// ─── Files branch ─────────────────────────────────────────────────────────────

/// rsync every configured folder, one at a time, in configured order.
pub fn fetch_files(cfg: &Config, outcomes: &mut Vec<StageOutcome>) -> Result<(), TransferError> {
    cfg.require_remote(false)?;

    let mappings = cfg.folder_mappings();
    if mappings.is_empty() {
        note("No folders configured");
        return Ok(());
    }

    for mapping in &mappings {
        note(&format!("{} → {}", mapping.src, mapping.dst));
        fs::create_dir_all(Path::new(&mapping.dst))?;

        let mut parser = RsyncProgress::new();
        let mut bar = TickBar::new("Counting files");
        let outcome = run_streaming_stage(
            &format!("Sync {}", mapping.src),
            &rsync_args(cfg, mapping),
            &mut |line: &str| parser.feed(line, &mut bar),
        );
        bar.finish();
        info!(src = %mapping.src, files = parser.count(), "rsync finished");

        if outcome.success && !parser.finish() {
            note("Files already up-to-date");
        }

        record(outcomes, outcome, |o| TransferError::FetchFiles {
            stdout: o.stdout.clone(),
            stderr: o.error_output(),
        })?;
    }

    Ok(())
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

/// Print and keep `outcome`; turn a failed one into the stage's error.
fn record(
    outcomes: &mut Vec<StageOutcome>,
    outcome: StageOutcome,
    on_failure: impl FnOnce(&StageOutcome) -> TransferError,
) -> Result<(), TransferError> {
    outcome.print();
    let result = if outcome.failed() {
        Err(on_failure(&outcome))
    } else {
        Ok(())
    };
    outcomes.push(outcome);
    result
}

// ─── Tests ────────────────────────────────────────────────────────────────────
