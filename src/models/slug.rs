use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static DISALLOWED: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9- ]+").unwrap());
static SEPARATOR_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[- ]+").unwrap());
static EDGE_SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[- ]+|[- ]+$").unwrap());

/// Normalizes a category value for storage.
///
/// Keeps letters, digits, hyphens and spaces; every other character becomes a
/// hyphen. Runs of separators collapse to a single space when the run contains
/// a space, otherwise to a single hyphen. Leading and trailing separators are
/// stripped. Idempotent: applying it to its own output is a no-op.
pub fn slugify(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let trimmed = text.trim();
    let replaced = DISALLOWED.replace_all(trimmed, "-");
    let collapsed = SEPARATOR_RUNS.replace_all(&replaced, |caps: &Captures<'_>| {
        if caps[0].contains(' ') {
            " "
        } else {
            "-"
        }
    });
    EDGE_SEPARATORS.replace_all(&collapsed, "").into_owned()
}
