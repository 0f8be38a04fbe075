//! Command argument construction helpers.
//!
//! This module is responsible for *building* the argument lists passed to
//! `mysqldump`, `mysql`, `ssh`, `scp` and `rsync`.  It deliberately does
//! **not** execute anything; process execution lives in [`crate::ui`] so the
//! spinner can own the terminal while commands run.
//!
//! Every builder returns a plain argv vector that is handed straight to
//! [`std::process::Command`], so no local shell ever re-parses a value.  Two
//! strings are still parsed by someone else and get quoted accordingly:
//!
//! - the command `ssh` runs on the remote goes through the remote login shell ([`shell_quote`]);
//! - the `-e` value given to rsync is split by rsync itself ([`rsync_quote`]).

use std::path::Path;

use crate::config::{Config, DatabaseConfig, FolderMapping, ProxyConfig, RemoteConfig, SshConfig};

// ─── Quoting & options ────────────────────────────────────────────────────────

/// POSIX single-quote `s` for a remote shell.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Quote `s` for rsync's own `-e` splitter, which honours double quotes.
pub fn rsync_quote(s: &str) -> String {
    if !s.is_empty() && !s.contains(|c: char| c.is_whitespace() || c == '"' || c == '\'') {
        return s.to_string();
    }
    format!("\"{}\"", s.replace('\\', r"\\").replace('"', "\\\""))
}

/// Configured option strings split into arguments: `["-p 2222"]` becomes
/// `["-p", "2222"]`.
pub fn split_options(options: &[String]) -> Vec<String> {
    options
        .iter()
        .flat_map(|o| o.split_whitespace())
        .map(String::from)
        .collect()
}

/// The `ProxyCommand` value for the configured jump host, or `None` when no
/// proxy is configured.  `%h:%p` is left for ssh to substitute.
pub fn ssh_proxy_command(proxy: &ProxyConfig) -> Option<String> {
    let host = proxy.host.as_deref().filter(|h| !h.is_empty())?;
    let user = proxy.user.as_deref().filter(|u| !u.is_empty())?;

    let mut parts = vec!["ssh".to_string(), "-W".into(), "%h:%p".into()];
    parts.extend(split_options(&proxy.options));
    parts.push(format!("{user}@{host}"));
    Some(parts.join(" "))
}

/// `-o ProxyCommand=…` as two arguments, if a proxy is configured.
fn proxy_args(proxy: &ProxyConfig) -> Vec<String> {
    ssh_proxy_command(proxy)
        .map(|cmd| vec!["-o".into(), format!("ProxyCommand={cmd}")])
        .unwrap_or_default()
}

/// ssh options plus the proxy directive, as argv entries.
pub fn ssh_options(ssh: &SshConfig) -> Vec<String> {
    let mut args = split_options(&ssh.options);
    args.extend(proxy_args(&ssh.proxy));
    args
}

/// Mask passwords in an argv before it is logged: every `--password=…`, and
/// the attached `-p…` short form when the program is `mysql` or `mysqldump`.
pub fn redact(args: &[String]) -> Vec<String> {
    let mysql_client = args
        .first()
        .and_then(|prog| Path::new(prog).file_name())
        .is_some_and(|name| name == "mysql" || name == "mysqldump");

    args.iter()
        .enumerate()
        .map(|(i, a)| {
            if a.starts_with("--password=") {
                "--password=***".to_string()
            } else if mysql_client && i > 0 && a.len() > 2 && a.starts_with("-p") {
                "-p***".to_string()
            } else {
                a.clone()
            }
        })
        .collect()
}

// ─── MySQL ────────────────────────────────────────────────────────────────────

/// `<name> --user=… --password=… --host=…`, shared by dump and import.
fn connection_args(db: &DatabaseConfig) -> Vec<String> {
    vec![
        db.name.clone(),
        format!("--user={}", db.user),
        format!("--password={}", db.password),
        format!("--host={}", db.host),
    ]
}

/// ```text
/// mysqldump <name> --user=… --password=… --host=… [export_arguments…] -q --result-file=<file>
/// ```
pub fn mysqldump_args(db: &DatabaseConfig, result_file: &Path) -> Vec<String> {
    let mut cmd = vec!["mysqldump".to_string()];
    cmd.extend(connection_args(db));
    cmd.extend(db.export_arguments.iter().cloned());
    cmd.push("-q".into());
    cmd.push(format!("--result-file={}", result_file.display()));
    cmd
}

/// ```text
/// mysql <name> --user=… --password=… --host=… [import_arguments…]
/// ```
///
/// The dump is attached to stdin by the caller.
pub fn mysql_args(db: &DatabaseConfig) -> Vec<String> {
    let mut cmd = vec!["mysql".to_string()];
    cmd.extend(connection_args(db));
    cmd.extend(db.import_arguments.iter().cloned());
    cmd
}

// ─── Remote ───────────────────────────────────────────────────────────────────

/// The shell command run on the remote: `cd '<dir>' ; <console> export [--env='<env>']`.
pub fn remote_export_command(remote: &RemoteConfig) -> String {
    let mut cmd = format!(
        "cd {} ; {} export",
        shell_quote(&remote.dir),
        remote.console_script
    );
    if let Some(env) = remote.env() {
        cmd.push_str(&format!(" --env={}", shell_quote(env)));
    }
    cmd
}

/// ```text
/// ssh [ssh options…] [-o ProxyCommand=…] <user>@<host> "<remote export command>"
/// ```
pub fn ssh_export_args(cfg: &Config) -> Vec<String> {
    let mut cmd = vec!["ssh".to_string()];
    cmd.extend(ssh_options(&cfg.ssh));
    cmd.push(cfg.remote.destination());
    cmd.push(remote_export_command(&cfg.remote));
    cmd
}

/// ```text
/// scp -P <port> [-o ProxyCommand=…] <user>@<host>:<remote dump> <local dump>
/// ```
pub fn scp_args(cfg: &Config, local_file: &Path) -> Vec<String> {
    let mut cmd = vec!["scp".to_string(), "-P".into(), cfg.remote.port.to_string()];
    cmd.extend(proxy_args(&cfg.ssh.proxy));
    cmd.push(format!(
        "{}:{}",
        cfg.remote.destination(),
        cfg.remote.dump_path()
    ));
    cmd.push(local_file.display().to_string());
    cmd
}

/// The remote shell rsync should use, as a single `-e` value.
pub fn rsync_shell(ssh: &SshConfig) -> String {
    std::iter::once("ssh".to_string())
        .chain(ssh_options(ssh).iter().map(|a| rsync_quote(a)))
        .collect::<Vec<_>>()
        .join(" ")
}

/// ```text
/// rsync -LK -P [rsync options…] -e "ssh …" <user>@<host>:<dir>/<src> <dst>/
/// ```
///
/// `-L` copies symlink targets instead of the links (they rarely resolve
/// the same way on both machines); `-K` keeps local directory symlinks.
pub fn rsync_args(cfg: &Config, mapping: &FolderMapping) -> Vec<String> {
    let mut cmd = vec!["rsync".to_string(), "-LK".into(), "-P".into()];
    cmd.extend(split_options(&cfg.rsync.options));
    cmd.push("-e".into());
    cmd.push(rsync_shell(&cfg.ssh));
    cmd.push(format!(
        "{}:{}/{}",
        cfg.remote.destination(),
        cfg.remote.dir.trim_end_matches('/'),
        mapping.src
    ));
    cmd.push(format!("{}/", mapping.dst.trim_end_matches('/')));
    cmd
}

// ─── Tests ────────────────────────────────────────────────────────────────────
