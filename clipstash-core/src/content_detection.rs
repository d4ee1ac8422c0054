//! Content kind detection for history entries.
//!
//! Classifies copied text as a URL, email address, color value, code
//! fragment, or plain text bucketed by length. Classification happens once
//! at entry creation and is never revisited.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::EntryKind;

/// Single-line content at or below this length counts as short text.
const SHORT_TEXT_MAX_CHARS: usize = 40;

/// Content above this length counts as long text.
const LONG_TEXT_MIN_CHARS: usize = 500;

static URL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(https?://\S+|www\.\S+)$").unwrap());

static EMAIL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap());

/// Tokens that strongly suggest source code when they start a line.
static CODE_LINE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^\s*(fn|pub|let|use|impl|struct|enum|def|class|import|from|func|var|const|return|if|for|while|#include|#define|package|public|private)\b",
    )
    .unwrap()
});

fn is_valid_url(text: &str) -> bool {
    if text.len() > 2000 || text.contains('\n') {
        return false;
    }
    if text.starts_with("http://") || text.starts_with("https://") {
        return url::Url::parse(text).is_ok();
    }
    if text.starts_with("www.") {
        return url::Url::parse(&format!("https://{text}")).is_ok();
    }
    URL_REGEX.is_match(text)
}

fn is_email(text: &str) -> bool {
    EMAIL_REGEX.is_match(text)
}

/// Accepts explicit color formats only (#hex, rgb()/rgba(), hsl()/hsla()),
/// not named colors, so ordinary words never classify as colors.
fn is_color(text: &str) -> bool {
    let lower = text.to_lowercase();
    if text.starts_with('#') || lower.starts_with("rgb") || lower.starts_with("hsl") {
        csscolorparser::parse(text).is_ok()
    } else {
        false
    }
}

fn looks_like_code(text: &str) -> bool {
    let line_count = text.lines().count();
    if line_count < 2 {
        return false;
    }
    let keyword_lines = CODE_LINE_REGEX.find_iter(text).count();
    if keyword_lines >= 2 {
        return true;
    }
    // Brace-and-semicolon density is a decent fallback for languages the
    // keyword list misses.
    let structural = text
        .chars()
        .filter(|c| matches!(c, '{' | '}' | ';'))
        .count();
    structural >= line_count
}

/// Derive the classification tag for a piece of copied text.
pub fn detect_kind(text: &str) -> EntryKind {
    let trimmed = text.trim();

    if is_color(trimmed) {
        return EntryKind::Color;
    }
    if is_valid_url(trimmed) {
        return EntryKind::Url;
    }
    if is_email(trimmed) {
        return EntryKind::Email;
    }
    if looks_like_code(trimmed) {
        return EntryKind::Code;
    }

    let chars = trimmed.chars().count();
    if chars > LONG_TEXT_MIN_CHARS {
        EntryKind::LongText
    } else if chars <= SHORT_TEXT_MAX_CHARS && !trimmed.contains('\n') {
        EntryKind::ShortText
    } else {
        EntryKind::Text
    }
}
