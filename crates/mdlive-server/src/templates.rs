//! Header and footer templates wrapped around every HTML page.
//!
//! Templates are re-read on each request so edits take effect without a
//! restart. A missing template file falls back to a built-in default; the
//! default header subscribes the page to `/refresh/` and loads MathJax.

use std::borrow::Cow;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::ServerError;

/// Built-in header used when no header template exists.
const DEFAULT_HEADER: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>mdlive</title>
<script>
new EventSource("/refresh/").onmessage = function () { location.reload(); };
</script>
<script src="https://cdn.jsdelivr.net/npm/mathjax@2.7.9/MathJax.js?config=TeX-AMS_HTML"></script>
</head>
<body>
"#;

/// Built-in footer used when no footer template exists.
const DEFAULT_FOOTER: &str = "</body>\n</html>\n";

/// Locations of the header and footer templates.
#[derive(Clone, Debug)]
pub(crate) struct Templates {
    header_path: PathBuf,
    footer_path: PathBuf,
}

/// Loaded header and footer for one response.
#[derive(Debug)]
pub(crate) struct PageFrame {
    header: Cow<'static, str>,
    footer: Cow<'static, str>,
}

impl Templates {
    pub(crate) fn new(header_path: PathBuf, footer_path: PathBuf) -> Self {
        Self {
            header_path,
            footer_path,
        }
    }

    /// Read both templates.
    pub(crate) async fn load(&self) -> Result<PageFrame, ServerError> {
        Ok(PageFrame {
            header: read_or_default(&self.header_path, DEFAULT_HEADER).await?,
            footer: read_or_default(&self.footer_path, DEFAULT_FOOTER).await?,
        })
    }
}

impl PageFrame {
    /// Surround a body fragment with the header and footer.
    pub(crate) fn wrap(&self, body: &str) -> String {
        let mut page = String::with_capacity(self.header.len() + body.len() + self.footer.len());
        page.push_str(&self.header);
        page.push_str(body);
        page.push_str(&self.footer);
        page
    }
}

async fn read_or_default(
    path: &Path,
    default: &'static str,
) -> Result<Cow<'static, str>, ServerError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Cow::Owned(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Cow::Borrowed(default)),
        Err(source) => Err(ServerError::Template {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[tokio::test]
    async fn test_load_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let header = dir.path().join("header.html");
        let footer = dir.path().join("footer.html");
        std::fs::write(&header, "<main>").unwrap();
        std::fs::write(&footer, "</main>").unwrap();

        let frame = Templates::new(header, footer).load().await.unwrap();

        assert_eq!(frame.wrap("<p>hi</p>"), "<main><p>hi</p></main>");
    }

    #[tokio::test]
    async fn test_missing_files_use_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let templates = Templates::new(dir.path().join("nope.html"), dir.path().join("nah.html"));

        let page = templates.load().await.unwrap().wrap("<p>body</p>");

        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains(r#"new EventSource("/refresh/")"#));
        assert!(page.ends_with("<p>body</p></body>\n</html>\n"));
    }

    #[tokio::test]
    async fn test_unreadable_template_is_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be read as a file.
        let templates = Templates::new(dir.path().to_path_buf(), dir.path().join("footer.html"));

        let result = templates.load().await;

        assert!(matches!(result, Err(ServerError::Template { .. })));
    }
}
