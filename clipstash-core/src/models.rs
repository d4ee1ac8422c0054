//! Core data models for the clipboard history engine.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::content_detection::detect_kind;

/// Opaque entry identity. Unique for the store's lifetime, assigned at
/// creation, immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(Uuid);

impl EntryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Classification tag derived from content at creation time.
///
/// Immutable once assigned: entries are promoted, never edited, so the
/// content a kind was derived from cannot change underneath it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Text,
    Url,
    Email,
    Color,
    Code,
    ShortText,
    LongText,
}

impl EntryKind {
    /// Stable tag used as the database column value.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Text => "text",
            EntryKind::Url => "url",
            EntryKind::Email => "email",
            EntryKind::Color => "color",
            EntryKind::Code => "code",
            EntryKind::ShortText => "short_text",
            EntryKind::LongText => "long_text",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "text" => Some(EntryKind::Text),
            "url" => Some(EntryKind::Url),
            "email" => Some(EntryKind::Email),
            "color" => Some(EntryKind::Color),
            "code" => Some(EntryKind::Code),
            "short_text" => Some(EntryKind::ShortText),
            "long_text" => Some(EntryKind::LongText),
            _ => None,
        }
    }
}

/// Provenance captured at copy time. Missing values stay absent; they are
/// never defaulted to placeholder strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryOrigin {
    pub source_app: Option<String>,
    pub window_title: Option<String>,
    pub bundle_identifier: Option<String>,
    pub process_id: Option<i32>,
    pub is_from_editor: bool,
}

/// One recorded clipboard history item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: EntryId,
    pub content: String,
    /// Deduplication key for the exact content; at most one live entry per
    /// fingerprint exists in the store.
    pub fingerprint: String,
    /// Last-promoted time; drives ordering within a partition.
    pub timestamp: DateTime<Utc>,
    pub is_pinned: bool,
    pub kind: EntryKind,
    pub origin: EntryOrigin,
}

impl Entry {
    pub fn new(content: String, origin: EntryOrigin, timestamp: DateTime<Utc>) -> Self {
        let fingerprint = fingerprint(&content);
        let kind = detect_kind(&content);
        Self {
            id: EntryId::new(),
            content,
            fingerprint,
            timestamp,
            is_pinned: false,
            kind,
            origin,
        }
    }

    /// Display text (truncated, normalized whitespace) for list previews
    /// and log lines.
    pub fn preview(&self, max_chars: usize) -> String {
        normalize_preview(&self.content, max_chars)
    }
}

/// Compute the deduplication fingerprint for a piece of content.
///
/// Exact-match semantics: the content is hashed as-is, with no trimming or
/// case folding, so two copies dedupe only when they are byte-identical.
pub fn fingerprint(content: &str) -> String {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    hasher.finish().to_string()
}

/// Normalize text for preview display: skip leading whitespace, collapse
/// runs of whitespace to a single space, convert newlines/tabs to spaces,
/// truncate at `max_chars` with an ellipsis.
pub fn normalize_preview(text: &str, max_chars: usize) -> String {
    let mut out = String::with_capacity(max_chars + 1);
    let mut last_was_space = true; // swallows leading whitespace
    let mut count = 0;

    for ch in text.chars() {
        if count >= max_chars {
            out.push('…');
            return out;
        }
        let ch = if matches!(ch, '\n' | '\t' | '\r') { ' ' } else { ch };
        if ch == ' ' {
            if last_was_space {
                continue;
            }
            last_was_space = true;
        } else {
            last_was_space = false;
        }
        out.push(ch);
        count += 1;
    }

    while out.ends_with(' ') {
        out.pop();
    }
    out
}
