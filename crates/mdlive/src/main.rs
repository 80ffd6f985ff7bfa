//! mdlive CLI - markdown development server with live reload.
//!
//! Serves a directory over HTTP, rendering markdown files to HTML, and
//! reloads open pages whenever anything under the directory changes.

mod error;
mod output;
mod serve;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use error::CliError;
use output::Output;
use serve::ServeArgs;

/// Application version from Cargo.toml.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// mdlive - Markdown development server with live reload.
#[derive(Parser)]
#[command(name = "mdlive", version, about)]
struct Cli {
    #[command(flatten)]
    serve: ServeArgs,
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // --verbose enables DEBUG level, otherwise use RUST_LOG or default to INFO
    let filter = if cli.serve.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let result = tokio::runtime::Runtime::new()
        .map_err(CliError::from)
        .and_then(|rt| rt.block_on(cli.serve.execute(VERSION, &output)));

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}
