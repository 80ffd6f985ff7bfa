//! Directory listing HTML.

use std::fmt::Write;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::escape::escape_html;

/// Characters left unencoded in a URL path segment: A-Z a-z 0-9 - . _ ~
const PATH_SEGMENT_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// One immediate child of a listed directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListingEntry {
    /// File or directory name.
    pub name: String,
    /// Whether the entry is a directory.
    pub is_dir: bool,
}

impl ListingEntry {
    /// Create a listing entry.
    #[must_use]
    pub fn new(name: impl Into<String>, is_dir: bool) -> Self {
        Self {
            name: name.into(),
            is_dir,
        }
    }

    /// Hidden entries start with a dot.
    fn is_hidden(&self) -> bool {
        self.name.starts_with('.')
    }
}

/// Render the body of a directory index page.
///
/// Emits a heading followed by one link per non-hidden entry, sorted by
/// name. Links are absolute paths below `url_path`; directory links end
/// with a slash.
#[must_use]
pub fn render_directory_listing(url_path: &str, entries: &[ListingEntry]) -> String {
    let mut visible: Vec<&ListingEntry> = entries.iter().filter(|e| !e.is_hidden()).collect();
    visible.sort_by(|a, b| a.name.cmp(&b.name));

    let base = encode_path(url_path);
    let mut out = String::new();
    let _ = writeln!(
        out,
        "<h1>Directory listing for {}</h1>",
        escape_html(url_path)
    );

    for entry in visible {
        let slash = if entry.is_dir { "/" } else { "" };
        let _ = writeln!(
            out,
            r#"<a href="{base}/{}{slash}">{}</a><br>"#,
            utf8_percent_encode(&entry.name, PATH_SEGMENT_ENCODE_SET),
            escape_html(&entry.name)
        );
    }

    out
}

/// Percent-encode every segment of a URL path, without a trailing slash.
fn encode_path(url_path: &str) -> String {
    url_path
        .split('/')
        .filter(|s| !s.is_empty())
        .fold(String::new(), |mut acc, segment| {
            acc.push('/');
            acc.extend(utf8_percent_encode(segment, PATH_SEGMENT_ENCODE_SET));
            acc
        })
}
