use std::sync::LazyLock;

use regex::Regex;

static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static APOSTROPHE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[’'`]").unwrap());
static NON_ALNUM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9]+").unwrap());
static INT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d[\d,]*").unwrap());

/// Collapse whitespace runs and trim. `None` means "no data": callers
/// must not treat it as an empty string.
pub fn clean(text: &str) -> Option<String> {
    let t = WS_RE.replace_all(text, " ").trim().to_string();
    if t.is_empty() { None } else { Some(t) }
}

/// Identifier-safe slug. Same display name always yields the same slug,
/// regardless of case, apostrophes, or punctuation.
pub fn slugify(text: &str) -> String {
    let s = text.trim().to_lowercase();
    let s = APOSTROPHE_RE.replace_all(&s, "");
    NON_ALNUM_RE
        .replace_all(&s, "_")
        .trim_matches('_')
        .to_string()
}

/// Split a display list ("A, B, C" / "A · B · C" / "A • B • C") into
/// slugs. Order preserved, duplicates kept.
pub fn split_list(text: &str) -> Vec<String> {
    text.replace(['·', '•'], ",")
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(slugify)
        .collect()
}

/// First digit run in the text, thousands separators stripped.
pub fn parse_int(text: &str) -> Option<i64> {
    let m = INT_RE.find(text)?;
    m.as_str().replace(',', "").parse().ok()
}
