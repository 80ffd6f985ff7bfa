//! Markdown to HTML conversion.

use pulldown_cmark::{Options, Parser, html};

use crate::math::tag_math;

/// Markdown renderer producing an HTML fragment.
///
/// Enables the common GitHub-flavoured extensions (tables, strikethrough,
/// footnotes, task lists) and tags math spans in the output.
#[derive(Clone, Debug)]
pub struct MarkdownRenderer {
    options: Options,
}

impl MarkdownRenderer {
    /// Create a renderer with the default extension set.
    #[must_use]
    pub fn new() -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_TASKLISTS);
        Self { options }
    }

    /// Render markdown source to an HTML fragment.
    #[must_use]
    pub fn render(&self, markdown: &str) -> String {
        let parser = Parser::new_ext(markdown, self.options);
        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut out, parser);
        tag_math(&out)
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}
