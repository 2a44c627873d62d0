//! Cleanup of model output before the footer is appended

use once_cell::sync::Lazy;
use regex::Regex;

/// A sources/references block and everything after it
static SOURCES_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?im)^[ \t]*(?:#{1,6}[ \t]*)?(?:\*\*|__)?(?:clinical data sources|sources|references)(?:\*\*|__)?[ \t]*:",
    )
    .unwrap()
});

static CLINICAL_INFO_HEADER_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?im)^[ \t]*(?:#{1,6}[ \t]*)?(?:\*\*|__)?clinical information(?:\*\*|__)?[ \t]*:?[ \t]*(?:\*\*|__)?[ \t]*$",
    )
    .unwrap()
});

static CLINICAL_INFO_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^([ \t]*)(?:\*\*|__)?clinical information(?:\*\*|__)?[ \t]*:(?:\*\*|__)?[ \t]*")
        .unwrap()
});

static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*|__(.+?)__").unwrap());

static HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*#{1,6}[ \t]+").unwrap());

static BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^([ \t]*)[*\-+][ \t]+").unwrap());

static TRAILING_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)[ \t]+$").unwrap());

static BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Strip forbidden sections and markdown so the footer is the only attribution
pub fn sanitize_response(raw: &str) -> String {
    let mut text = raw.replace("\r\n", "\n");

    if let Some(found) = SOURCES_BLOCK.find(&text) {
        text.truncate(found.start());
    }

    let text = CLINICAL_INFO_HEADER_LINE.replace_all(&text, "");
    let text = CLINICAL_INFO_LABEL.replace_all(&text, "$1");
    let text = BOLD.replace_all(&text, "$1$2");
    let text = HEADING.replace_all(&text, "");
    let text = BULLET.replace_all(&text, "$1\u{2022} ");
    let text = TRAILING_SPACE.replace_all(&text, "");
    let text = BLANK_RUNS.replace_all(&text, "\n\n");

    text.trim().to_string()
}
