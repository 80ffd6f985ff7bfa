//! Document rendering for the mdlive development server.
//!
//! This crate holds the stateless text transforms used by the server:
//!
//! - [`MarkdownRenderer`]: markdown to HTML, with `$$...$$` and `$...$` spans
//!   turned into `math/tex` script tags
//! - [`render_directory_listing`]: HTML body for a directory index page
//!
//! # Example
//!
//! ```
//! use mdlive_renderer::MarkdownRenderer;
//!
//! let html = MarkdownRenderer::new().render("# Hello\n\nEnergy is $E = mc^2$.");
//! assert!(html.contains(r#"<script type="math/tex; mode=text">E = mc^2</script>"#));
//! ```

mod escape;
mod listing;
mod math;
mod renderer;

pub use listing::{ListingEntry, render_directory_listing};
pub use renderer::MarkdownRenderer;
