//! Command-line interface definition.
//!
//! All argument parsing lives here so the rest of the codebase can stay
//! agnostic to `clap`.  The `Cli` struct is parsed once in `main` and then
//! passed (by reference) into the command handlers.

use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::config::DEFAULT_ENV;

/// Top-level CLI arguments, shared across every subcommand.
#[derive(Parser, Debug)]
#[command(
    name    = "data-transfer",
    about   = "Dump a MySQL database, or fetch a remote one together with its files",
    version,
    // Show a compact two-column help layout.
    help_template = "\
{before-help}{name} {version}
{about}

{usage-heading} {usage}

{all-args}{after-help}"
)]
pub struct Cli {
    /// Path to the configuration file.
    ///
    /// Defaults to `data-transfer.toml` in the current working directory.
    /// Values from `~/.config/data-transfer/config.toml` are merged
    /// underneath it.
    #[arg(short, long, global = true, default_value = "data-transfer.toml")]
    pub config: PathBuf,

    /// Environment name; selects the local cache directory `var/cache/<env>`
    /// unless `[local].cache_dir` is set.
    #[arg(short, long, global = true, default_value = DEFAULT_ENV)]
    pub env: String,

    /// Print the parsed configuration and exit without running anything.
    #[arg(long)]
    pub print_config: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).  `RUST_LOG`
    /// takes precedence when set.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Option<Subcommand>,
}

#[derive(clap::Subcommand, Debug, PartialEq, Eq)]
pub enum Subcommand {
    /// Dump the configured database to `<cache-dir>/db-dump.sql`.
    ///
    /// The previous dump is kept as `db-dump-<epoch>.sql` and removed once it
    /// is more than 24 hours old.
    Export,

    /// Fetch the remote database and configured folders.
    ///
    /// Runs `export` on the remote over ssh, downloads the dump with scp,
    /// imports it into the local database and rsyncs every folder listed in
    /// `folders`.
    Fetch {
        /// Only transfer the database, not the files.
        #[arg(long, conflicts_with = "files_only")]
        db_only: bool,

        /// Only transfer the files, not the database.
        #[arg(long)]
        files_only: bool,
    },

    /// Scaffold a `data-transfer.toml` in the current directory.
    ///
    /// Exits with an error if the file already exists to avoid accidental
    /// overwrites.
    Init,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("data-transfer").chain(args.iter().copied()))
    }

    #[test]
    fn defaults() {
        let cli = parse(&["export"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("data-transfer.toml"));
        assert_eq!(cli.env, "dev");
        assert_eq!(cli.verbose, 0);
        assert_eq!(cli.command, Some(Subcommand::Export));
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = parse(&["export", "--env", "prod", "-vv"]).unwrap();
        assert_eq!(cli.env, "prod");
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn fetch_flags() {
        let cli = parse(&["fetch", "--db-only"]).unwrap();
        assert_eq!(cli.command, Some(Subcommand::Fetch {
            db_only: true,
            files_only: false,
        }));
    }

    #[test]
    fn fetch_flags_conflict() {
        assert!(parse(&["fetch", "--db-only", "--files-only"]).is_err());
    }
}
