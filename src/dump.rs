//! Dump file management: naming, rotation, age-based pruning, validation.
//!
//! `export` always writes `db-dump.sql`, because that is the path `fetch`
//! downloads from.  Before a new dump is written the previous one is renamed
//! to `db-dump-<epoch>.sql` (epoch = its modification time), and archived
//! dumps older than [`MAX_AGE_SECS`] are deleted.

use std::{
    fs::{self, File},
    io::{BufRead, BufReader, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
    sync::LazyLock,
    time::{SystemTime, UNIX_EPOCH},
};

use regex::Regex;
use tracing::{debug, info};

use crate::error::TransferError;

pub const DUMP_FILE_NAME: &str = "db-dump.sql";

/// Archived dumps older than this are pruned (24h).
pub const MAX_AGE_SECS: u64 = 24 * 60 * 60;

/// First line mysqldump prints when the password is given on the command
/// line and its stderr ends up in the dump.
pub const MYSQL_CLI_WARNING: &str =
    "mysqldump: [Warning] Using a password on the command line interface can be insecure.";

static ARCHIVED_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^db-dump-(\d+)\.sql$").expect("valid regex"));

static DUMP_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-- (MySQL|MariaDB) dump").expect("valid regex"));

static DUMP_TRAILER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"-- Dump completed on\s+\d*-\d*-\d*\s+\d+:\d+:\d+\s*$").expect("valid regex")
});

/// Bytes read from the end of the file when looking for the trailer.
const TRAILER_WINDOW: u64 = 4096;

pub fn dump_path(dir: &Path) -> PathBuf {
    dir.join(DUMP_FILE_NAME)
}

pub fn archived_name(epoch: u64) -> String {
    format!("db-dump-{epoch}.sql")
}

/// The epoch embedded in an archived dump's file name.
pub fn parse_archived_epoch(file_name: &str) -> Option<u64> {
    ARCHIVED_NAME
        .captures(file_name)
        .and_then(|c| c[1].parse().ok())
}

pub fn now_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

// ─── Rotation & pruning ───────────────────────────────────────────────────────

/// Rename an existing `db-dump.sql` in `dir` to `db-dump-<mtime>.sql`.
///
/// Returns the new path, or `None` when there was nothing to rotate.
pub fn rotate_previous(dir: &Path) -> std::io::Result<Option<PathBuf>> {
    let current = dump_path(dir);
    let meta = match fs::metadata(&current) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    let epoch = meta
        .modified()?
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs());
    let archived = dir.join(archived_name(epoch));
    fs::rename(&current, &archived)?;
    debug!(from = %current.display(), to = %archived.display(), "rotated previous dump");
    Ok(Some(archived))
}

/// Delete every `db-dump-<epoch>.sql` in `dir` whose epoch is strictly older
/// than `now - MAX_AGE_SECS`.  Other files are never touched.
pub fn prune_expired(dir: &Path, now: u64) -> std::io::Result<Vec<PathBuf>> {
    let cutoff = now.saturating_sub(MAX_AGE_SECS);
    let mut removed = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(epoch) = name.to_str().and_then(parse_archived_epoch) else {
            continue;
        };
        if epoch < cutoff && entry.file_type()?.is_file() {
            fs::remove_file(entry.path())?;
            info!(path = %entry.path().display(), "removed expired dump");
            removed.push(entry.path());
        }
    }

    removed.sort();
    Ok(removed)
}

// ─── Validation ───────────────────────────────────────────────────────────────

/// Check that `path` looks like a complete mysqldump output: a dump header
/// on the first line (after the optional password warning) and a
/// `-- Dump completed on …` trailer at the end.
pub fn validate_dump(path: &Path) -> Result<(), TransferError> {
    let invalid = |reason: &str| TransferError::InvalidDump {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    let mut file = File::open(path)?;

    let mut head = BufReader::new(&mut file).lines();
    let mut first = head.next().transpose()?.unwrap_or_default();
    if first.trim_end() == MYSQL_CLI_WARNING {
        first = head.next().transpose()?.unwrap_or_default();
    }
    drop(head);
    if !DUMP_HEADER.is_match(&first) {
        return Err(invalid("missing '-- MySQL dump' header"));
    }

    let len = file.metadata()?.len();
    file.seek(SeekFrom::Start(len.saturating_sub(TRAILER_WINDOW)))?;
    let mut tail = Vec::new();
    file.read_to_end(&mut tail)?;
    if !DUMP_TRAILER.is_match(&String::from_utf8_lossy(&tail)) {
        return Err(invalid("missing '-- Dump completed' trailer (truncated?)"));
    }

    Ok(())
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: u64 = 1_700_000_000;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let p = dir.join(name);
        fs::write(&p, "-- dump").unwrap();
        p
    }

    // ── naming ────────────────────────────────────────────────────────────────

    #[test]
    fn archived_names_round_trip_their_epoch() {
        assert_eq!(parse_archived_epoch(&archived_name(NOW)), Some(NOW));
    }

    #[test]
    fn non_matching_names_have_no_epoch() {
        assert_eq!(parse_archived_epoch("db-dump.sql"), None);
        assert_eq!(parse_archived_epoch("db-dump-.sql"), None);
        assert_eq!(parse_archived_epoch("db-dump-12a.sql"), None);
        assert_eq!(parse_archived_epoch("old-db-dump-12.sql"), None);
        assert_eq!(parse_archived_epoch("db-dump-12.sql.gz"), None);
    }

    // ── prune_expired ─────────────────────────────────────────────────────────

    #[test]
    fn prune_removes_only_strictly_older_dumps() {
        let dir = tempfile::tempdir().unwrap();
        let cutoff = NOW - MAX_AGE_SECS;

        let old = touch(dir.path(), &archived_name(cutoff - 1));
        let edge = touch(dir.path(), &archived_name(cutoff));
        let fresh = touch(dir.path(), &archived_name(NOW - 60));

        let removed = prune_expired(dir.path(), NOW).unwrap();

        assert_eq!(removed, vec![old.clone()]);
        assert!(!old.exists());
        assert!(edge.exists(), "a dump exactly at the cutoff is kept");
        assert!(fresh.exists());
    }

    #[test]
    fn prune_leaves_unrelated_files_alone() {
        let dir = tempfile::tempdir().unwrap();
        let current = touch(dir.path(), DUMP_FILE_NAME);
        let other = touch(dir.path(), "db-dump-abc.sql");
        let log = touch(dir.path(), "1.log");

        let removed = prune_expired(dir.path(), NOW).unwrap();

        assert!(removed.is_empty());
        assert!(current.exists() && other.exists() && log.exists());
    }

    // ── rotate_previous ───────────────────────────────────────────────────────

    #[test]
    fn rotate_without_previous_dump_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        assert!(rotate_previous(dir.path()).unwrap().is_none());
    }

    #[test]
    fn rotate_archives_previous_dump_under_its_mtime() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), DUMP_FILE_NAME);

        let archived = rotate_previous(dir.path()).unwrap().expect("rotated");

        assert!(!dump_path(dir.path()).exists());
        assert!(archived.exists());
        let name = archived.file_name().unwrap().to_str().unwrap();
        let epoch = parse_archived_epoch(name).expect("archived name carries epoch");
        assert!(epoch.abs_diff(now_epoch()) < 120);
    }

    #[test]
    fn rotated_dump_survives_pruning_for_a_day() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), DUMP_FILE_NAME);
        let archived = rotate_previous(dir.path()).unwrap().unwrap();

        assert!(prune_expired(dir.path(), now_epoch()).unwrap().is_empty());
        assert_eq!(
            prune_expired(dir.path(), now_epoch() + MAX_AGE_SECS + 120).unwrap(),
            vec![archived]
        );
    }

    // ── validate_dump ─────────────────────────────────────────────────────────

    const GOOD: &str = "-- MySQL dump 10.13  Distrib 8.0.36, for Linux (x86_64)\n\
                        --\n-- Host: localhost    Database: shop\n\
                        CREATE TABLE t (id int);\n\
                        -- Dump completed on 2024-03-01 12:34:56\n";

    fn write_dump(content: &str) -> tempfile::NamedTempFile {
        use std::io::Write;
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn complete_dump_is_valid() {
        assert!(validate_dump(write_dump(GOOD).path()).is_ok());
    }

    #[test]
    fn leading_password_warning_is_tolerated() {
        let f = write_dump(&format!("{MYSQL_CLI_WARNING}\n{GOOD}"));
        assert!(validate_dump(f.path()).is_ok());
    }

    #[test]
    fn mariadb_header_is_accepted() {
        let f = write_dump(&GOOD.replace("-- MySQL dump", "-- MariaDB dump"));
        assert!(validate_dump(f.path()).is_ok());
    }

    #[test]
    fn truncated_dump_is_rejected() {
        let f = write_dump(&GOOD.replace("-- Dump completed on 2024-03-01 12:34:56\n", ""));
        let err = validate_dump(f.path()).unwrap_err();
        assert!(err.to_string().contains("trailer"), "got: {err}");
    }

    #[test]
    fn error_output_instead_of_dump_is_rejected() {
        let f = write_dump("mysqldump: Got error: 1045: Access denied\n");
        let err = validate_dump(f.path()).unwrap_err();
        assert!(err.to_string().contains("header"), "got: {err}");
    }

    #[test]
    fn empty_file_is_rejected() {
        assert!(validate_dump(write_dump("").path()).is_err());
    }
}
