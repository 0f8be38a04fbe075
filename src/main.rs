//! `data-transfer` — pull a remote MySQL database and file folders into a
//! local environment.
//!
//! # Overview
//!
//! The binary plays both ends of the transfer.  On a server, `export` dumps
//! the local database into its cache directory.  On a developer machine,
//! `fetch` runs that export over ssh, downloads the dump with scp, imports it
//! with `mysql`, and rsyncs the configured folders.  Every external tool is
//! spawned with an explicit argument vector; nothing goes through a local
//! shell.
//!
//! # Usage
//!
//! ```text
//! data-transfer export                 # dump [database] to var/cache/<env>/db-dump.sql
//! data-transfer fetch                  # database + files from [remote]
//! data-transfer fetch --db-only        # database only
//! data-transfer fetch --files-only     # folders only
//! data-transfer init                   # scaffold data-transfer.toml
//! data-transfer --print-config         # show parsed config without running anything
//! ```
//!
//! # Module layout
//!
//! | Module                   | Responsibility                              |
//! |--------------------------|---------------------------------------------|
//! | [`cli`]                  | Argument types parsed by clap               |
//! | [`config`]               | `Config` struct, TOML loading and merging   |
//! | [`error`]                | `TransferError`                             |
//! | [`runner`]               | Argument construction helpers               |
//! | [`ui`]                   | Spinner, captured/streamed execution        |
//! | [`dump`]                 | Dump rotation, pruning, validation          |
//! | [`progress`]             | rsync progress parser                       |
//! | [`commands::export`]     | `export` subcommand                         |
//! | [`commands::fetch`]      | `fetch` subcommand                          |
//! | [`commands::init`]       | `init` subcommand                           |

mod cli;
mod commands;
mod config;
mod dump;
mod error;
mod progress;
mod runner;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use cli::{Cli, Subcommand};
use config::{Config, from_table, merge, parse_table};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        // ── data-transfer init ────────────────────────────────────────────────
        Some(Subcommand::Init) => commands::init::run(&cli.config),

        command => {
            let cfg = load_merged_config(&cli.config)?;

            if cli.print_config {
                println!("{cfg:#?}");
                return Ok(());
            }

            match command {
                // ── data-transfer export ──────────────────────────────────────
                Some(Subcommand::Export) => commands::export::run(&cli, &cfg),

                // ── data-transfer fetch ───────────────────────────────────────
                Some(Subcommand::Fetch {
                    db_only,
                    files_only,
                }) => commands::fetch::run(&cli, &cfg, *db_only, *files_only),

                Some(Subcommand::Init) | None => {
                    Cli::command().print_help()?;
                    Ok(())
                },
            }
        },
    }
}

/// Log to stderr without timestamps.  `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: u8) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

/// Load configuration from two sources and merge them.
///
/// 1. `~/.config/data-transfer/config.toml` — machine-wide defaults (e.g. `[ssh.proxy]`)
/// 2. `local_path` (default: `./data-transfer.toml`) — per-project settings
///
/// Local values win on a per-key basis.  Either file may be absent.
fn load_merged_config(local_path: &std::path::Path) -> Result<Config> {
    let global_path = dirs_next::config_dir().map(|d| d.join("data-transfer").join("config.toml"));

    let global = match global_path.as_deref() {
        Some(p) => parse_table(p)?.unwrap_or_default(),
        None => toml::Table::new(),
    };

    let local = if let Some(t) = parse_table(local_path)? {
        t
    } else {
        eprintln!(
            "Warning: config file '{}' not found, using defaults.\n\
             Run 'data-transfer init' to generate a starter config.",
            local_path.display()
        );
        toml::Table::new()
    };

    from_table(merge(global, local))
}
