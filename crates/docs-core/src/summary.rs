//! Plain-text helpers for rich-text bodies: tag stripping and card titles.

use regex::Regex;
use std::sync::LazyLock;

/// Titles longer than this many characters are truncated.
const TITLE_MAX_CHARS: usize = 10;
const UNTITLED: &str = "Untitled doc";

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid tag regex"));
static BLOCK_END_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</(p|h[1-6]|div|li|blockquote|pre)\s*>").expect("valid block regex")
});

/// Remove every HTML tag, leaving text and entities untouched.
pub fn strip_tags(html: &str) -> String {
    TAG_RE.replace_all(html, "").into_owned()
}

/// Strip tags and decode the handful of entities the editor emits.
pub fn plain_text(html: &str) -> String {
    strip_tags(html)
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Title shown on a document card.
///
/// An explicit name wins. Otherwise the text of the first non-empty block,
/// cut to 10 characters with a trailing `...`. Bodies without any text are
/// `Untitled doc`.
pub fn title(text: &str, name: Option<&str>) -> String {
    if let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) {
        return name.to_string();
    }

    let first = BLOCK_END_RE
        .split(text)
        .map(|block| plain_text(block).trim().to_string())
        .find(|block| !block.is_empty());

    match first {
        Some(block) if block.chars().count() > TITLE_MAX_CHARS => {
            let head: String = block.chars().take(TITLE_MAX_CHARS).collect();
            format!("{}...", head)
        }
        Some(block) => block,
        None => UNTITLED.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_tags() {
        assert_eq!(strip_tags("<p>Hello <b>there</b></p>"), "Hello there");
        assert_eq!(strip_tags("no markup"), "no markup");
    }

    #[test]
    fn test_plain_text_decodes_entities() {
        assert_eq!(plain_text("<p>a&nbsp;&amp;&nbsp;b</p>"), "a & b");
    }

    #[test]
    fn test_title_uses_first_block() {
        assert_eq!(title("<h1>Plan</h1><p>details</p>", None), "Plan");
    }

    #[test]
    fn test_title_truncates() {
        assert_eq!(title("<p>Quarterly report</p>", None), "Quarterly ...");
    }

    #[test]
    fn test_title_skips_empty_blocks() {
        assert_eq!(title("<p><br></p><p>Second</p>", None), "Second");
    }

    #[test]
    fn test_title_untitled() {
        assert_eq!(title("", None), "Untitled doc");
        assert_eq!(title("<p><br></p>", None), "Untitled doc");
    }

    #[test]
    fn test_explicit_name_wins() {
        assert_eq!(title("<p>Body</p>", Some("contract.docx")), "contract.docx");
        assert_eq!(title("<p>Body</p>", Some("  ")), "Body");
    }
}
