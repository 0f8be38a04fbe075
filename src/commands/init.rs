//! `data-transfer init` — write a starter `data-transfer.toml`.

use std::path::Path;

use anyhow::{Context, Result, bail};

use crate::ui::{StageOutcome, local_stage};

const TEMPLATE: &str = r#"# data-transfer configuration.
#
# `data-transfer export` dumps [database] into the cache directory.
# `data-transfer fetch` runs that export on [remote], downloads the dump,
# imports it into [database] and rsyncs `folders` from the remote.

# Folders to rsync from <remote.dir>.  A bare path is synced into its parent
# directory; { "remote/path" = "local/path" } maps a source to a destination.
folders = [
    # "web/uploads",
    # { "web/media" = "public/media" },
]

[database]
name     = ""
user     = ""
password = ""
host     = "localhost"
export_arguments = []   # e.g. ["--single-transaction"]
import_arguments = []

[local]
# cache_dir   = "var/cache/dev"   # default: var/cache/<--env>
validate_dump = true

[remote]
host           = ""
user           = ""
dir            = ""
env            = "prod"
port           = 22
console_script = "data-transfer"

[ssh]
options = []            # e.g. ["-p 2222", "-i ~/.ssh/deploy"]

[ssh.proxy]
# host    = "bastion.example.com"
# user    = "jump"
options = []

[rsync]
options = []            # e.g. ["--delete"]
"#;

/// Write the template to `path`, refusing to overwrite an existing file.
pub fn run(path: &Path) -> Result<()> {
    let outcome = write_template(path);
    outcome.print();
    if let Some(err) = outcome.error {
        bail!(err);
    }
    println!("  Wrote {}", path.display());
    Ok(())
}

fn write_template(path: &Path) -> StageOutcome {
    let result = if path.exists() {
        Err(anyhow::anyhow!(
            "{} already exists; refusing to overwrite",
            path.display()
        ))
    } else {
        std::fs::write(path, TEMPLATE).with_context(|| format!("writing {}", path.display()))
    };
    local_stage("Init", result.err().map(|e| format!("{e:#}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn template_parses_into_config() {
        let cfg: Config = toml::from_str(TEMPLATE).expect("template must be valid TOML");
        assert_eq!(cfg.database.host, "localhost");
        assert_eq!(cfg.remote.env.as_deref(), Some("prod"));
        assert!(cfg.folders.is_empty());
        assert!(cfg.ssh.proxy.host.is_none());
    }

    #[test]
    fn init_writes_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data-transfer.toml");
        run(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), TEMPLATE);
    }

    #[test]
    fn init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data-transfer.toml");
        std::fs::write(&path, "# mine").unwrap();

        let err = run(&path).unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# mine");
    }
}
