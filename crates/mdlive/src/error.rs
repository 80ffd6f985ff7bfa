//! CLI error types.

use std::path::PathBuf;

use mdlive_server::ServerError;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("Cannot determine working directory: {0}")]
    WorkingDirectory(#[source] std::io::Error),

    #[error("Invalid root directory {}: {source}", path.display())]
    InvalidRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Server(#[from] ServerError),
}
