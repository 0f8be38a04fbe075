//! Configuration types and loading logic.
//!
//! `Config` is a direct 1-to-1 mapping of `data-transfer.toml`.  Every section
//! has a `Default` impl so the file may omit whatever an operation does not
//! need; each operation then checks the fields it relies on up front (see
//! [`Config::require_database`] and [`Config::require_remote`]) instead of
//! handing a half-empty argument list to an external tool.
//!
//! # File format
//!
//! ```toml
//! # Top-level keys must precede the first [table] header.
//! folders = ["web/uploads", { "web/media" = "public/media" }]
//!
//! [database]
//! name     = "shop"
//! user     = "root"
//! password = "x"
//! host     = "localhost"
//! export_arguments = ["--single-transaction"]
//! import_arguments = []
//!
//! [local]
//! cache_dir     = "var/cache/dev"   # default: var/cache/<env>
//! validate_dump = true
//!
//! [remote]
//! host           = "shop.example.com"
//! user           = "deploy"
//! dir            = "/srv/shop"
//! env            = "prod"
//! port           = 22
//! console_script = "data-transfer"
//!
//! [ssh]
//! options = ["-p 2222"]
//!
//! [ssh.proxy]
//! host    = "bastion.example.com"
//! user    = "jump"
//! options = []
//!
//! [rsync]
//! options = ["--delete"]
//! ```

use std::{
    fmt,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{MapAccess, Visitor},
    ser::SerializeMap,
};
use toml::{Table, Value};

use crate::error::TransferError;

/// Environment used when `--env` is not given and for the remote dump path
/// when `[remote].env` is unset.
pub const DEFAULT_ENV: &str = "dev";

// ─── Top-level ────────────────────────────────────────────────────────────────

/// Root configuration object, deserialised from `data-transfer.toml`.
#[derive(Debug, Deserialize, Serialize, Default)]
pub struct Config {
    /// Local database connection, used by `export` and by the import stage
    /// of `fetch`.
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub local: LocalConfig,

    /// The host `fetch` pulls from.
    #[serde(default)]
    pub remote: RemoteConfig,

    #[serde(default)]
    pub ssh: SshConfig,

    #[serde(default)]
    pub rsync: RsyncConfig,

    /// Folders to rsync from the remote, in order.
    #[serde(default)]
    pub folders: Vec<FolderEntry>,
}

// ─── [database] ───────────────────────────────────────────────────────────────

/// MySQL connection parameters.
#[derive(Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub user: String,

    /// May be empty; it is still passed as `--password=`.
    #[serde(default)]
    pub password: String,

    #[serde(default = "default_db_host")]
    pub host: String,

    /// Extra `mysqldump` arguments, appended verbatim (one argv entry each).
    #[serde(default)]
    pub export_arguments: Vec<String>,

    /// Extra `mysql` arguments used on import.
    #[serde(default)]
    pub import_arguments: Vec<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            user: String::new(),
            password: String::new(),
            host: default_db_host(),
            export_arguments: vec![],
            import_arguments: vec![],
        }
    }
}

// Hand-written so `--print-config` never echoes the password.
impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let password = if self.password.is_empty() { "" } else { "***" };
        f.debug_struct("DatabaseConfig")
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &password)
            .field("host", &self.host)
            .field("export_arguments", &self.export_arguments)
            .field("import_arguments", &self.import_arguments)
            .finish()
    }
}

// ─── [local] ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize)]
pub struct LocalConfig {
    /// Where `export` writes and `fetch` downloads `db-dump.sql`.
    ///
    /// Defaults to `var/cache/<env>` relative to the working directory.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Check the downloaded dump's header and trailer before importing it.
    #[serde(default = "default_true")]
    pub validate_dump: bool,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            validate_dump: true,
        }
    }
}

// ─── [remote] ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize)]
pub struct RemoteConfig {
    #[serde(default)]
    pub host: String,

    #[serde(default)]
    pub user: String,

    /// Deployment directory on the remote; `export` runs from here.
    #[serde(default)]
    pub dir: String,

    /// Forwarded to the remote export as `--env=<env>`.
    #[serde(default)]
    pub env: Option<String>,

    /// Port handed to `scp -P`.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Command line that starts this tool on the remote, e.g.
    /// `"/usr/local/bin/data-transfer"`.  Run through the remote shell.
    #[serde(default = "default_console_script")]
    pub console_script: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            user: String::new(),
            dir: String::new(),
            env: None,
            port: default_port(),
            console_script: default_console_script(),
        }
    }
}

impl RemoteConfig {
    /// The environment the remote export runs in, if one was configured.
    pub fn env(&self) -> Option<&str> {
        self.env.as_deref().filter(|e| !e.is_empty())
    }

    /// `<dir>/var/cache/<env>/db-dump.sql`
    pub fn dump_path(&self) -> String {
        format!(
            "{}/var/cache/{}/{}",
            self.dir.trim_end_matches('/'),
            self.env().unwrap_or(DEFAULT_ENV),
            crate::dump::DUMP_FILE_NAME
        )
    }

    /// `user@host`
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}

// ─── [ssh] / [rsync] ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct SshConfig {
    /// Extra ssh options.  An entry such as `"-p 2222"` is split on
    /// whitespace into separate arguments.
    #[serde(default)]
    pub options: Vec<String>,

    #[serde(default)]
    pub proxy: ProxyConfig,
}

/// Optional jump host.  Ignored unless both `host` and `user` are set.
#[derive(Debug, Deserialize, Serialize, Default)]
pub struct ProxyConfig {
    #[serde(default)]
    pub host: Option<String>,

    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct RsyncConfig {
    #[serde(default)]
    pub options: Vec<String>,
}

// ─── folders ──────────────────────────────────────────────────────────────────

/// One entry of the `folders` list as written in the config file.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum FolderEntry {
    /// `"web/uploads"`: synced into its own parent directory.
    Bare(String),
    /// `{ "web/media" = "public/media" }`: source → destination.
    Mapped(FolderPairs),
}

/// The pairs of one `{ src = dst, … }` table, in the order they were written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FolderPairs(pub Vec<(String, String)>);

impl<'de> Deserialize<'de> for FolderPairs {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PairsVisitor;

        impl<'de> Visitor<'de> for PairsVisitor {
            type Value = FolderPairs;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a table of source = destination strings")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut pairs = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((src, dst)) = map.next_entry::<String, String>()? {
                    pairs.push((src, dst));
                }
                Ok(FolderPairs(pairs))
            }
        }

        deserializer.deserialize_map(PairsVisitor)
    }
}

impl Serialize for FolderPairs {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (src, dst) in &self.0 {
            map.serialize_entry(src, dst)?;
        }
        map.end()
    }
}

/// A resolved (remote source, local destination) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderMapping {
    pub src: String,
    pub dst: String,
}

impl FolderMapping {
    /// A source without an explicit destination lands in its parent.
    pub fn inferred(src: &str) -> Self {
        Self {
            src: src.to_string(),
            dst: parent_dir(src),
        }
    }
}

impl FolderEntry {
    fn resolve(&self) -> Vec<FolderMapping> {
        match self {
            Self::Bare(src) => vec![FolderMapping::inferred(src)],
            Self::Mapped(pairs) => pairs
                .0
                .iter()
                .map(|(key, value)| {
                    if is_numeric_key(key) {
                        FolderMapping::inferred(value)
                    } else {
                        FolderMapping {
                            src: key.clone(),
                            dst: value.clone(),
                        }
                    }
                })
                .collect(),
        }
    }
}

fn is_numeric_key(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_ascii_digit())
}

/// POSIX `dirname` on a `/`-separated path.
pub fn parent_dir(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return if path.is_empty() { ".".into() } else { "/".into() };
    }
    match trimmed.rfind('/') {
        None => ".".into(),
        Some(i) => {
            let head = trimmed[..i].trim_end_matches('/');
            if head.is_empty() { "/".into() } else { head.into() }
        },
    }
}

// ─── Validation & derived values ──────────────────────────────────────────────

impl Config {
    /// Fails when the local database cannot be addressed.
    pub fn require_database(&self) -> Result<(), TransferError> {
        check(&[
            ("database.name", self.database.name.as_str()),
            ("database.user", self.database.user.as_str()),
            ("database.host", self.database.host.as_str()),
        ])
    }

    /// Fails when the remote host cannot be reached.  `with_console` adds the
    /// remote entry point, which only the database fetch needs.
    pub fn require_remote(&self, with_console: bool) -> Result<(), TransferError> {
        let mut fields = vec![
            ("remote.host", self.remote.host.as_str()),
            ("remote.user", self.remote.user.as_str()),
            ("remote.dir", self.remote.dir.as_str()),
        ];
        if with_console {
            fields.push(("remote.console_script", self.remote.console_script.as_str()));
        }
        check(&fields)
    }

    pub fn cache_dir(&self, env: &str) -> PathBuf {
        self.local
            .cache_dir
            .clone()
            .unwrap_or_else(|| Path::new("var").join("cache").join(env))
    }

    /// Every configured folder as a (source, destination) pair, in order.
    pub fn folder_mappings(&self) -> Vec<FolderMapping> {
        self.folders.iter().flat_map(FolderEntry::resolve).collect()
    }
}

fn check(fields: &[(&'static str, &str)]) -> Result<(), TransferError> {
    let missing: Vec<&'static str> = fields
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(TransferError::MissingConfig(missing))
    }
}

// ─── Defaults ─────────────────────────────────────────────────────────────────

pub fn default_db_host() -> String {
    "localhost".into()
}

pub fn default_port() -> u16 {
    22
}

pub fn default_console_script() -> String {
    "data-transfer".into()
}

const fn default_true() -> bool {
    true
}

// ─── Loader ───────────────────────────────────────────────────────────────────

/// Read `path` as a raw TOML table.  Returns `Ok(None)` if the file does not
/// exist, and an error if it exists but is unreadable or not valid TOML.
pub fn parse_table(path: &Path) -> Result<Option<Table>> {
    if !path.exists() {
        return Ok(None);
    }
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let table: Table =
        toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    Ok(Some(table))
}

/// Deep-merge `overlay` onto `base`.  Nested tables merge key by key; any
/// other value in `overlay` replaces the one in `base`.
pub fn merge(mut base: Table, overlay: Table) -> Table {
    for (key, value) in overlay {
        let merged = match (base.remove(&key), value) {
            (Some(Value::Table(b)), Value::Table(o)) => Value::Table(merge(b, o)),
            (_, v) => v,
        };
        base.insert(key, merged);
    }
    base
}

/// Turn a (possibly merged) table into a typed `Config`.
pub fn from_table(table: Table) -> Result<Config> {
    Value::Table(table)
        .try_into()
        .context("invalid configuration")
}

// ─── Tests ────────────────────────────────────────────────────────────────────
