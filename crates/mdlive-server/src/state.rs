//! Application state.
//!
//! Shared state for all request handlers.

use std::path::PathBuf;
use std::time::Duration;

use mdlive_renderer::MarkdownRenderer;

use crate::ServerConfig;
use crate::live_reload::Hub;
use crate::templates::Templates;

/// Application state shared across all handlers.
pub(crate) struct AppState {
    /// Directory served at `/`.
    pub(crate) root_dir: PathBuf,
    /// Header and footer wrapped around HTML pages.
    pub(crate) templates: Templates,
    /// Markdown to HTML renderer.
    pub(crate) renderer: MarkdownRenderer,
    /// Live reload hub.
    pub(crate) hub: Hub,
    /// Interval between keep-alive comments on event streams.
    pub(crate) keep_alive: Duration,
    /// Application version for `ETag` computation.
    pub(crate) version: String,
}

impl AppState {
    pub(crate) fn new(config: &ServerConfig, hub: Hub) -> Self {
        Self {
            root_dir: config.root_dir.clone(),
            templates: Templates::new(config.header_path.clone(), config.footer_path.clone()),
            renderer: MarkdownRenderer::new(),
            hub,
            keep_alive: config.keep_alive,
            version: config.version.clone(),
        }
    }
}
