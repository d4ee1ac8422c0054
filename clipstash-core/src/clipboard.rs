//! System clipboard adapter contract.
//!
//! The platform clipboard is an externally-owned resource; the engine never
//! assumes exclusive ownership and treats every adapter call as fallible.
//! A change counter distinguishes copy events: each write or clear bumps
//! it, and the monitor compares counters rather than content.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClipboardError {
    #[error("clipboard read failed: {0}")]
    Read(String),
    #[error("clipboard write failed: {0}")]
    Write(String),
}

pub type ClipboardResult<T> = Result<T, ClipboardError>;

pub trait ClipboardAdapter: Send + Sync {
    /// Monotonically increasing counter bumped on every clipboard change,
    /// including clears.
    fn change_count(&self) -> ClipboardResult<i64>;

    /// Current string content, `None` when the clipboard is empty or holds
    /// no string representation.
    fn read_string(&self) -> ClipboardResult<Option<String>>;

    fn write_string(&self, text: &str) -> ClipboardResult<()>;

    fn clear(&self) -> ClipboardResult<()>;
}

/// In-process clipboard. Serves headless hosts and tests; mirrors the
/// counter semantics of the platform pasteboard.
#[derive(Default)]
pub struct MemoryClipboard {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    change_count: i64,
    content: Option<String>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClipboardAdapter for MemoryClipboard {
    fn change_count(&self) -> ClipboardResult<i64> {
        Ok(self.state.lock().change_count)
    }

    fn read_string(&self) -> ClipboardResult<Option<String>> {
        Ok(self.state.lock().content.clone())
    }

    fn write_string(&self, text: &str) -> ClipboardResult<()> {
        let mut state = self.state.lock();
        state.change_count += 1;
        state.content = Some(text.to_string());
        Ok(())
    }

    fn clear(&self) -> ClipboardResult<()> {
        let mut state = self.state.lock();
        state.change_count += 1;
        state.content = None;
        Ok(())
    }
}

/// Classification of an observed clipboard change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// Initiated outside the engine; becomes a history event.
    External,
    /// The engine's own write or clear; must not be re-ingested.
    Internal,
}

/// One-shot marker the engine arms immediately before it writes or clears
/// the system clipboard.
///
/// The marker records the counter value the internal bump produced. When
/// the monitor observes a delta it classifies it against the marker: a
/// counter at or below the recorded value is the engine's own change, a
/// counter beyond it means an external copy landed on top — so an
/// internal clear followed immediately by an external copy still
/// surfaces the external event instead of coalescing into one skipped
/// delta. The marker is consumed by the first classification; the TTL
/// bounds how long it can linger if the expected bump never arrives.
pub struct ChangeOriginMarker {
    state: Mutex<Option<MarkerState>>,
}

struct MarkerState {
    expires_at: Instant,
    /// Counter value produced by the internal change, once known. Armed
    /// before the write, recorded right after it succeeds.
    expected_count: Option<i64>,
}

impl ChangeOriginMarker {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(None),
        }
    }

    /// Arm before touching the system clipboard, so a poll landing mid
    /// write still classifies the delta as internal.
    pub fn arm_internal(&self, ttl: Duration) {
        let now = Instant::now();
        let expires_at = now.checked_add(ttl).unwrap_or(now);
        *self.state.lock() = Some(MarkerState {
            expires_at,
            expected_count: None,
        });
    }

    /// Record the counter value the internal change produced. No-op when
    /// nothing is armed.
    pub fn note_expected_count(&self, count: i64) {
        if let Some(armed) = self.state.lock().as_mut() {
            armed.expected_count = Some(count);
        }
    }

    /// Classify an observed counter against the armed marker, consuming
    /// it. Without a live marker every delta is external.
    pub fn classify(&self, observed_count: i64) -> ChangeOrigin {
        let mut state = self.state.lock();
        if let Some(armed) = state.take() {
            if Instant::now() <= armed.expires_at {
                return match armed.expected_count {
                    // A counter past the internal bump means an external
                    // change landed on top of it.
                    Some(expected) if observed_count > expected => ChangeOrigin::External,
                    _ => ChangeOrigin::Internal,
                };
            }
        }
        ChangeOrigin::External
    }

    /// Drop an armed marker without consuming it, for when the write it
    /// was armed for failed and no counter bump is coming.
    pub fn disarm(&self) {
        *self.state.lock() = None;
    }
}

impl Default for ChangeOriginMarker {
    fn default() -> Self {
        Self::new()
    }
}
