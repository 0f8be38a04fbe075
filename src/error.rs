//! Domain errors for the export and fetch operations.
//!
//! Every variant that stems from a child process carries that process's
//! captured output, so the message printed to the operator is enough to
//! diagnose the failure without re-running the command by hand.

use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransferError {
    /// One or more fields needed by the requested operation are empty.
    #[error("missing required configuration: {}", .0.join(", "))]
    MissingConfig(Vec<&'static str>),

    #[error("Error dumping database:\n{output}")]
    Dump { output: String },

    #[error("Export on remote failed:\n{output}")]
    RemoteExport { output: String },

    #[error("Unable to transfer dump from remote server to localhost:\n{output}")]
    Transfer { output: String },

    #[error("{} is not a complete MySQL dump: {reason}", .path.display())]
    InvalidDump { path: PathBuf, reason: String },

    #[error("Error importing database: {stdout} {stderr}")]
    Import { stdout: String, stderr: String },

    #[error("Error fetching files: {stdout} {stderr}")]
    FetchFiles { stdout: String, stderr: String },

    #[error(transparent)]
    Io(#[from] io::Error),
}
