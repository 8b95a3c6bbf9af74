// Free-text cleanup shared by record loading and query handling
use regex::Regex;
use std::sync::OnceLock;

static PARENTHESIZED: OnceLock<Regex> = OnceLock::new();
static WHITESPACE: OnceLock<Regex> = OnceLock::new();

fn parenthesized() -> &'static Regex {
    PARENTHESIZED.get_or_init(|| Regex::new(r"(?s)\(.*?\)").expect("static regex"))
}

fn whitespace() -> &'static Regex {
    WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("static regex"))
}

/// Remove parenthetical annotations from `text`.
///
/// Every `(` is matched with the next `)` (non-greedy, left to right), line
/// breaks included. An unmatched `(` is kept as-is.
#[inline]
pub fn strip_parentheses(text: &str) -> String {
    parenthesized().replace_all(text, "").into_owned()
}

/// Collapse runs of whitespace into a single space and trim both ends.
#[inline]
pub fn collapse_whitespace(text: &str) -> String {
    whitespace().replace_all(text, " ").trim().to_string()
}

/// Normalize a free-text field: strip `(...)` annotations, then collapse
/// whitespace. `None` normalizes to the empty string.
///
/// ```
/// use moldrec_core::normalize::normalize;
///
/// assert_eq!(normalize(Some("핸들커버(구형)")), "핸들커버");
/// assert_eq!(normalize(Some("  a   b  ")), "a b");
/// assert_eq!(normalize(None), "");
/// ```
pub fn normalize(text: Option<&str>) -> String {
    match text {
        Some(t) => collapse_whitespace(&strip_parentheses(t)),
        None => String::new(),
    }
}

/// Query-side cleanup: parenthesis stripping only, then trim.
///
/// Inner whitespace is left alone since the tokenizer splits on it anyway.
#[inline]
pub fn normalize_query(query: &str) -> String {
    strip_parentheses(query.trim()).trim().to_string()
}
