//! Math expression tagging.
//!
//! Rendered HTML keeps `$...$` delimiters as plain text. This module turns
//! them into `<script type="math/tex">` elements that MathJax-style
//! typesetters pick up in the browser.

use std::sync::LazyLock;

use regex::Regex;

/// Display math: `$$expr$$`.
static DISPLAY_MATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\$([^$]+)\$\$").unwrap());

/// Inline math: `$expr$`.
static INLINE_MATH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$([^$]+)\$").unwrap());

const DISPLAY_MATH_REPLACEMENT: &str = r#"<script type="math/tex; mode=display">${1}</script>"#;
const INLINE_MATH_REPLACEMENT: &str = r#"<script type="math/tex; mode=text">${1}</script>"#;

/// Replace math spans with `math/tex` script tags.
///
/// Display spans are replaced first so that `$$a$$` is never read as two
/// empty inline spans. The expression is any non-empty run of characters
/// without a `$`, including newlines.
#[must_use]
pub(crate) fn tag_math(html: &str) -> String {
    let display = DISPLAY_MATH_RE.replace_all(html, DISPLAY_MATH_REPLACEMENT);
    INLINE_MATH_RE
        .replace_all(&display, INLINE_MATH_REPLACEMENT)
        .into_owned()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_inline_math() {
        assert_eq!(
            tag_math("<p>Area is $\\pi r^2$.</p>"),
            r#"<p>Area is <script type="math/tex; mode=text">\pi r^2</script>.</p>"#
        );
    }

    #[test]
    fn test_display_math() {
        assert_eq!(
            tag_math("<p>$$E = mc^2$$</p>"),
            r#"<p><script type="math/tex; mode=display">E = mc^2</script></p>"#
        );
    }

    #[test]
    fn test_display_math_spans_lines() {
        assert_eq!(
            tag_math("<p>$$\na + b\n$$</p>"),
            "<p><script type=\"math/tex; mode=display\">\na + b\n</script></p>"
        );
    }

    #[test]
    fn test_mixed_display_and_inline() {
        assert_eq!(
            tag_math("$$x$$ and $y$"),
            concat!(
                r#"<script type="math/tex; mode=display">x</script>"#,
                " and ",
                r#"<script type="math/tex; mode=text">y</script>"#
            )
        );
    }

    #[test]
    fn test_multiple_inline_spans() {
        assert_eq!(
            tag_math("$a$, $b$"),
            concat!(
                r#"<script type="math/tex; mode=text">a</script>"#,
                ", ",
                r#"<script type="math/tex; mode=text">b</script>"#
            )
        );
    }

    #[test]
    fn test_lone_dollar_untouched() {
        assert_eq!(tag_math("<p>costs $5</p>"), "<p>costs $5</p>");
    }

    #[test]
    fn test_empty_span_untouched() {
        assert_eq!(tag_math("$$"), "$$");
    }
}
