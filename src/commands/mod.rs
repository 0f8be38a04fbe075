//! Subcommand handlers.
//!
//! Each file in this module corresponds to one user-facing command:
//!
//! | File          | Invocation              | Description                          |
//! |---------------|-------------------------|--------------------------------------|
//! | `export.rs`   | `data-transfer export`  | Dump the local database              |
//! | `fetch.rs`    | `data-transfer fetch`   | Pull remote database and folders     |
//! | `init.rs`     | `data-transfer init`    | Scaffold a `data-transfer.toml`      |

pub mod export;
pub mod fetch;
pub mod init;
