use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid tagged output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("minimum version must be a valid major.minor version, got '{0}'")]
    InvalidMinimumVersion(String),

    #[error("malformed view line in client '{client}': '{line}' (expected '<depot path> <client path>')")]
    MalformedViewLine { client: String, line: String },

    #[error("template client '{0}' does not exist on the server")]
    TemplateNotFound(String),

    #[error("malformed {record} record: missing field '{field}'")]
    MalformedRecord { record: String, field: String },

    #[error("workspace root {} exists and is not a directory", .0.display())]
    RootNotDirectory(PathBuf),

    #[error("unable to determine server version from '{0}'")]
    UnparsableServerVersion(String),

    #[error("server version {found} is not supported, {required} or newer is required")]
    UnsupportedServerVersion { found: String, required: String },

    #[error("user '{user}' must authenticate before checkout: {output}")]
    Authentication { user: String, output: String },

    #[error("client '{client}' is owned by '{owner}', not by the authenticated user '{user}'")]
    OwnershipConflict {
        client: String,
        owner: String,
        user: String,
    },

    #[error("command '{command}' failed with exit code {exit_code}: {output}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        output: String,
    },

    #[error("command '{0}' timed out")]
    CommandTimedOut(String),
}

pub type Result<T> = std::result::Result<T, Error>;
