//! Error types for the HTTP server.

use std::net::AddrParseError;
use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Server error type.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The connection cannot carry an incrementally flushed response.
    #[error("Streaming unsupported!")]
    StreamingUnsupported,

    /// Nothing exists at the requested path.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request path is malformed or escapes the root directory.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Header or footer template could not be read.
    #[error("Failed to read template {}: {source}", path.display())]
    Template {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Root directory is missing or not a directory.
    #[error("Root directory is not a directory: {}", .0.display())]
    InvalidRoot(PathBuf),

    /// Configured listen address does not parse.
    #[error("Invalid listen address: {0}")]
    Address(#[from] AddrParseError),

    /// Listening socket could not be bound.
    #[error("Failed to listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Map a filesystem error for `path` to a not-found or I/O error.
    pub(crate) fn from_fs(err: std::io::Error, path: &str) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(path.to_owned())
        } else {
            Self::Io(err)
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::NotFound(_) | Self::InvalidPath(_) => StatusCode::NOT_FOUND,
            Self::StreamingUnsupported
            | Self::Template { .. }
            | Self::InvalidRoot(_)
            | Self::Address(_)
            | Self::Bind { .. }
            | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_streaming_unsupported_status() {
        let response = ServerError::StreamingUnsupported.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_not_found_status() {
        let response = ServerError::NotFound("/missing.md".to_owned()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_from_fs_not_found() {
        let err = std::io::Error::from(std::io::ErrorKind::NotFound);
        assert!(matches!(
            ServerError::from_fs(err, "/a.md"),
            ServerError::NotFound(path) if path == "/a.md"
        ));
    }

    #[test]
    fn test_from_fs_other_error() {
        let err = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        assert!(matches!(ServerError::from_fs(err, "/a.md"), ServerError::Io(_)));
    }
}
