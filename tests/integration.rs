//! Integration tests for the `data-transfer` binary.
//!
//! These tests exercise the CLI layer end-to-end: they spawn the actual compiled
//! binary and assert on exit codes, stdout, and stderr.  No database or remote
//! host is required — these tests cover argument parsing, config loading,
//! `init`, `--print-config`, and error paths that never reach an external
//! tool.
//!
//! # Running
//!
//! ```sh
//! cargo test --test integration
//! ```

use std::{fs, path::Path, process::Command};

/// Absolute path to the compiled binary, resolved at compile time by Cargo.
const BIN: &str = env!("CARGO_BIN_EXE_data-transfer");

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Run `data-transfer` with `args` in a fresh temporary directory.
///
/// Returns `(exit_success, stdout, stderr)`.
fn run(args: &[&str]) -> (bool, String, String) {
    let dir = tempfile::tempdir().unwrap();
    run_in(args, dir.path())
}

/// Run `data-transfer` with `args` in the given working directory.
///
/// `HOME` and `XDG_CONFIG_HOME` point into `dir` so a global config on the
/// machine running the tests cannot leak in.
fn run_in(args: &[&str], dir: &Path) -> (bool, String, String) {
    let out = Command::new(BIN)
        .args(args)
        .current_dir(dir)
        .env("HOME", dir)
        .env("XDG_CONFIG_HOME", dir.join(".config"))
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("failed to spawn {BIN}: {e}"));

    (
        out.status.success(),
        String::from_utf8_lossy(&out.stdout).into_owned(),
        String::from_utf8_lossy(&out.stderr).into_owned(),
    )
}

// ─── --help / --version ───────────────────────────────────────────────────────

#[test]
fn help_exits_zero() {
    let (ok, stdout, _) = run(&["--help"]);
    assert!(ok, "--help should exit 0");
    assert!(stdout.contains("data-transfer"));
    assert!(stdout.contains("export"));
    assert!(stdout.contains("fetch"));
}

#[test]
fn version_exits_zero() {
    let (ok, stdout, _) = run(&["--version"]);
    assert!(ok, "--version should exit 0");
    assert!(stdout.contains("0.1.0"));
}

#[test]
fn fetch_help_lists_branch_flags() {
    let (ok, stdout, _) = run(&["fetch", "--help"]);
    assert!(ok);
    assert!(stdout.contains("--db-only"));
    assert!(stdout.contains("--files-only"));
}

// ─── init ─────────────────────────────────────────────────────────────────────

#[test]
fn init_creates_config() {
    let dir = tempfile::tempdir().unwrap();
    let (ok, _, _) = run_in(&["init"], dir.path());
    assert!(ok, "init should exit 0");

    let content = fs::read_to_string(dir.path().join("data-transfer.toml")).unwrap();
    assert!(content.contains("[database]"));
    assert!(content.contains("[remote]"));
    assert!(content.contains("[rsync]"));
}

#[test]
fn init_with_custom_config_path() {
    let dir = tempfile::tempdir().unwrap();
    let custom = dir.path().join("custom.toml");
    let (ok, _, _) = run_in(&["--config", custom.to_str().unwrap(), "init"], dir.path());
    assert!(ok);
    assert!(custom.exists(), "custom.toml should be created");
}

#[test]
fn init_refuses_to_overwrite_existing_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data-transfer.toml");
    fs::write(&path, "# existing").unwrap();

    let (ok, stdout, stderr) = run_in(&["init"], dir.path());
    assert!(!ok, "init should fail when the config already exists");
    assert_eq!(fs::read_to_string(&path).unwrap(), "# existing");

    let combined = format!("{stdout}{stderr}");
    assert!(
        combined.contains("already exists"),
        "error message should explain why init failed; got: {combined}"
    );
}

#[test]
fn init_generated_config_is_valid_toml() {
    let dir = tempfile::tempdir().unwrap();
    run_in(&["init"], dir.path());

    let content = fs::read_to_string(dir.path().join("data-transfer.toml")).unwrap();
    toml::from_str::<toml::Value>(&content).expect("generated config must be valid TOML");
}

// ─── --print-config ───────────────────────────────────────────────────────────

#[test]
fn print_config_after_init_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    run_in(&["init"], dir.path());

    let (ok, stdout, _) = run_in(&["--print-config"], dir.path());
    assert!(ok, "--print-config should exit 0 when config is valid");
    assert!(stdout.contains("DatabaseConfig"));
}

#[test]
fn print_config_without_file_warns_and_exits_zero() {
    let (ok, _, stderr) = run(&["--print-config"]);
    assert!(ok, "--print-config should exit 0 even without a config file");
    assert!(stderr.contains("not found"));
}

#[test]
fn print_config_errors_on_invalid_toml() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("data-transfer.toml"), "not valid toml ][[[").unwrap();

    let (ok, _, _) = run_in(&["--print-config"], dir.path());
    assert!(!ok, "invalid TOML should cause a non-zero exit");
}

#[test]
fn print_config_redacts_password() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("data-transfer.toml"),
        "[database]\nname = \"shop\"\npassword = \"hunter2\"\n",
    )
    .unwrap();

    let (ok, stdout, _) = run_in(&["--print-config"], dir.path());
    assert!(ok);
    assert!(stdout.contains("shop"));
    assert!(!stdout.contains("hunter2"), "password leaked: {stdout}");
}

// ─── config layering ──────────────────────────────────────────────────────────

#[test]
fn config_flag_reads_specified_file() {
    let dir = tempfile::tempdir().unwrap();
    let cfg_path = dir.path().join("myconfig.toml");
    fs::write(&cfg_path, "[remote]\nhost = \"test-host-xyz\"\n").unwrap();

    let (ok, stdout, _) = run_in(
        &["--config", cfg_path.to_str().unwrap(), "--print-config"],
        dir.path(),
    );
    assert!(ok);
    assert!(stdout.contains("test-host-xyz"));
}

// `XDG_CONFIG_HOME` only decides the config dir on Linux.
#[cfg(target_os = "linux")]
#[test]
fn global_config_is_merged_under_local() {
    let dir = tempfile::tempdir().unwrap();
    let global_dir = dir.path().join(".config").join("data-transfer");
    fs::create_dir_all(&global_dir).unwrap();
    fs::write(
        global_dir.join("config.toml"),
        "[ssh.proxy]\nhost = \"bastion-global\"\nuser = \"jump\"\n[remote]\nhost = \"global-host\"\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("data-transfer.toml"),
        "[remote]\nhost = \"local-host\"\n",
    )
    .unwrap();

    let (ok, stdout, _) = run_in(&["--print-config"], dir.path());
    assert!(ok);
    assert!(stdout.contains("bastion-global"));
    assert!(stdout.contains("local-host"));
    assert!(!stdout.contains("global-host"));
}

// ─── fail-fast validation ─────────────────────────────────────────────────────

#[test]
fn export_without_database_config_fails_fast() {
    let (ok, _, stderr) = run(&["export"]);
    assert!(!ok);
    assert!(
        stderr.contains("database.name") && stderr.contains("database.user"),
        "stderr should list the missing fields; got: {stderr}"
    );
}

#[test]
fn fetch_without_remote_config_exits_nonzero() {
    let (ok, _, stderr) = run(&["fetch"]);
    assert!(!ok);
    assert!(stderr.contains("remote.host"), "got: {stderr}");
    assert!(stderr.contains("fetch failed"), "got: {stderr}");
}

#[test]
fn fetch_branch_flags_conflict() {
    let (ok, _, _) = run(&["fetch", "--db-only", "--files-only"]);
    assert!(!ok);
}

// ─── unknown flags ────────────────────────────────────────────────────────────

#[test]
fn unknown_flag_exits_nonzero() {
    let (ok, _, _) = run(&["--this-flag-does-not-exist"]);
    assert!(!ok, "unknown flag should exit non-zero");
}
