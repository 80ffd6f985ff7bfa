//! Serve command implementation.

use std::path::PathBuf;

use clap::Args;
use mdlive_server::{LiveServer, ServerConfig};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for serving a directory.
#[derive(Args)]
pub(crate) struct ServeArgs {
    /// Directory to serve (default: current directory).
    pub root: Option<PathBuf>,

    /// Host to bind to.
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to.
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,
}

impl ServeArgs {
    /// Serve the root directory until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns an error if the root directory is unusable or the server
    /// fails to start.
    pub(crate) async fn execute(self, version: &str, output: &Output) -> Result<(), CliError> {
        let root_dir = resolve_root(self.root)?;

        let defaults = ServerConfig::default();
        let config = ServerConfig {
            host: self.host.unwrap_or(defaults.host),
            port: self.port.unwrap_or(defaults.port),
            root_dir,
            version: version.to_owned(),
            ..defaults
        };

        let server = LiveServer::bind(config.clone()).await?;
        let port = server.local_addr()?.port();

        output.highlight(&format!(
            "Server is running and listening on http://localhost:{port}"
        ));
        output.info(&format!("Serving: {}", config.root_dir.display()));
        output.info("Press Ctrl-C to stop");

        server.run().await?;
        Ok(())
    }
}

/// Resolve the directory to serve, defaulting to the working directory.
fn resolve_root(root: Option<PathBuf>) -> Result<PathBuf, CliError> {
    let root = match root {
        Some(root) => root,
        None => std::env::current_dir().map_err(CliError::WorkingDirectory)?,
    };

    let root = root
        .canonicalize()
        .map_err(|source| CliError::InvalidRoot { path: root, source })?;

    if !root.is_dir() {
        return Err(CliError::NotADirectory(root));
    }
    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_root_explicit_directory() {
        let dir = tempfile::tempdir().unwrap();

        let root = resolve_root(Some(dir.path().to_path_buf())).unwrap();

        assert_eq!(root, dir.path().canonicalize().unwrap());
    }

    #[test]
    fn test_resolve_root_defaults_to_working_directory() {
        let root = resolve_root(None).unwrap();

        assert_eq!(root, std::env::current_dir().unwrap().canonicalize().unwrap());
    }

    #[test]
    fn test_resolve_root_missing_directory() {
        let dir = tempfile::tempdir().unwrap();

        let result = resolve_root(Some(dir.path().join("missing")));

        assert!(matches!(result, Err(CliError::InvalidRoot { .. })));
    }

    #[test]
    fn test_resolve_root_rejects_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.md");
        std::fs::write(&file, "# A").unwrap();

        let result = resolve_root(Some(file));

        assert!(matches!(result, Err(CliError::NotADirectory(_))));
    }
}
