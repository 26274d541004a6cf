use std::sync::LazyLock;

use regex::Regex;

// Group 1 marks tags that end a line.
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<\s*(br|/p|/div|/li|/h[1-6])\s*/?\s*>|<[^>]*>").expect("tag pattern is valid")
});

/// Plain-text rendering of rich-text notes: block-level closing tags and
/// `<br>` become newlines, other tags are dropped and the common entities
/// decoded.
pub fn strip_markup(notes: &str) -> String {
    let text = TAG_RE.replace_all(notes, |caps: &regex::Captures| {
        if caps.get(1).is_some() { "\n" } else { "" }
    });
    let decoded = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    decoded
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
