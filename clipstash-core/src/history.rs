//! In-memory history store: the authoritative ordered state.
//!
//! Entries are partitioned into pinned and unpinned sets, each ordered by
//! timestamp descending. All mutations are synchronous and non-blocking;
//! they return a [`StoreDelta`] the caller forwards to persistence. The
//! store itself never touches I/O.

use chrono::{DateTime, Utc};

use crate::dedup::DedupIndex;
use crate::models::{fingerprint, Entry, EntryId, EntryOrigin};

/// Pending persistence work produced by a mutation.
#[derive(Debug, Clone, Default)]
pub struct StoreDelta {
    pub inserted: Vec<Entry>,
    pub updated: Vec<Entry>,
    pub removed: Vec<EntryId>,
}

impl StoreDelta {
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

/// Result of a pin toggle. A pin request over the cap reports
/// `success: false` and mutates nothing; unpinning always succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinOutcome {
    pub pinned: bool,
    pub success: bool,
}

/// Consistent read view of both partitions.
#[derive(Debug, Clone, Default)]
pub struct HistorySnapshot {
    pub pinned: Vec<Entry>,
    pub unpinned: Vec<Entry>,
}

impl HistorySnapshot {
    pub fn len(&self) -> usize {
        self.pinned.len() + self.unpinned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pinned.is_empty() && self.unpinned.is_empty()
    }
}

pub struct HistoryStore {
    pinned: Vec<Entry>,
    unpinned: Vec<Entry>,
    dedup: DedupIndex,
    max_history_items: usize,
    max_pinned_items: usize,
}

impl HistoryStore {
    pub fn new(max_history_items: usize, max_pinned_items: usize) -> Self {
        Self {
            pinned: Vec::new(),
            unpinned: Vec::new(),
            dedup: DedupIndex::new(),
            max_history_items: max_history_items.max(1),
            max_pinned_items: max_pinned_items.max(1),
        }
    }

    /// Record copied content: promote the existing entry for identical
    /// content, or create a new one at the front of the unpinned partition
    /// and evict past the cap. Returns `None` for empty content.
    pub fn insert_or_promote(
        &mut self,
        content: &str,
        origin: EntryOrigin,
        now: DateTime<Utc>,
    ) -> Option<(Entry, StoreDelta)> {
        if content.trim().is_empty() {
            return None;
        }

        let fp = fingerprint(content);
        if let Some(id) = self.dedup.resolve(&fp) {
            let entry = self.promote_in_place(id, Some(origin), now)?;
            let delta = StoreDelta {
                updated: vec![entry.clone()],
                ..StoreDelta::default()
            };
            return Some((entry, delta));
        }

        let entry = Entry::new(content.to_string(), origin, now);
        self.dedup.register(entry.fingerprint.clone(), entry.id);
        self.unpinned.insert(0, entry.clone());

        let mut delta = StoreDelta {
            inserted: vec![entry.clone()],
            ..StoreDelta::default()
        };
        self.trim_unpinned(&mut delta);
        Some((entry, delta))
    }

    /// Promote an existing entry without touching its provenance, for
    /// recopy-from-history. Only the timestamp (and ordering) change.
    pub fn promote(&mut self, id: EntryId, now: DateTime<Utc>) -> Option<(Entry, StoreDelta)> {
        let entry = self.promote_in_place(id, None, now)?;
        let delta = StoreDelta {
            updated: vec![entry.clone()],
            ..StoreDelta::default()
        };
        Some((entry, delta))
    }

    /// Refresh timestamp, optionally overwrite provenance, and move the
    /// entry to the front of its own partition. Pin state never changes
    /// as a side effect of promotion.
    fn promote_in_place(
        &mut self,
        id: EntryId,
        origin: Option<EntryOrigin>,
        now: DateTime<Utc>,
    ) -> Option<Entry> {
        let (partition, pos) = self.locate(id)?;
        let entries = if partition {
            &mut self.pinned
        } else {
            &mut self.unpinned
        };
        let mut entry = entries.remove(pos);
        entry.timestamp = now;
        if let Some(origin) = origin {
            entry.origin = origin;
        }
        entries.insert(0, entry.clone());
        Some(entry)
    }

    /// Toggle pin state. Returns the outcome plus the delta to persist;
    /// the delta is empty when the request failed.
    pub fn toggle_pin(&mut self, id: EntryId) -> (PinOutcome, StoreDelta) {
        let Some((was_pinned, pos)) = self.locate(id) else {
            return (
                PinOutcome {
                    pinned: false,
                    success: false,
                },
                StoreDelta::default(),
            );
        };

        let mut delta = StoreDelta::default();
        if was_pinned {
            let mut entry = self.pinned.remove(pos);
            entry.is_pinned = false;
            Self::insert_by_timestamp(&mut self.unpinned, entry.clone());
            delta.updated.push(entry);
            // The unpinned partition may now exceed its cap.
            self.trim_unpinned(&mut delta);
            (
                PinOutcome {
                    pinned: false,
                    success: true,
                },
                delta,
            )
        } else {
            if self.pinned.len() >= self.max_pinned_items {
                return (
                    PinOutcome {
                        pinned: false,
                        success: false,
                    },
                    delta,
                );
            }
            let mut entry = self.unpinned.remove(pos);
            entry.is_pinned = true;
            Self::insert_by_timestamp(&mut self.pinned, entry.clone());
            delta.updated.push(entry);
            (
                PinOutcome {
                    pinned: true,
                    success: true,
                },
                delta,
            )
        }
    }

    /// Remove an entry and release its fingerprint.
    pub fn delete(&mut self, id: EntryId) -> Option<StoreDelta> {
        let (partition, pos) = self.locate(id)?;
        let entry = if partition {
            self.pinned.remove(pos)
        } else {
            self.unpinned.remove(pos)
        };
        self.dedup.remove(&entry.fingerprint);
        Some(StoreDelta {
            removed: vec![entry.id],
            ..StoreDelta::default()
        })
    }

    /// Remove all unpinned entries, or everything when `keep_pinned` is
    /// false. Released fingerprints permit identical content afterwards.
    pub fn clear(&mut self, keep_pinned: bool) -> StoreDelta {
        let mut delta = StoreDelta::default();
        for entry in self.unpinned.drain(..) {
            self.dedup.remove(&entry.fingerprint);
            delta.removed.push(entry.id);
        }
        if !keep_pinned {
            for entry in self.pinned.drain(..) {
                delta.removed.push(entry.id);
            }
            // Everything is gone; reset the index in one step.
            self.dedup.clear();
        }
        delta
    }

    /// Seed loaded entries, most-recent-first. Entries whose id or
    /// fingerprint is already live are skipped (the in-memory state wins),
    /// as is empty content. Equal timestamps keep arrival order.
    pub fn seed(&mut self, entries: Vec<Entry>) {
        for entry in entries {
            if entry.content.trim().is_empty() {
                continue;
            }
            if self.locate(entry.id).is_some() || self.dedup.resolve(&entry.fingerprint).is_some() {
                continue;
            }
            self.dedup.register(entry.fingerprint.clone(), entry.id);
            if entry.is_pinned {
                Self::insert_by_timestamp(&mut self.pinned, entry);
            } else {
                Self::insert_by_timestamp(&mut self.unpinned, entry);
            }
        }
    }

    /// Trim the unpinned partition to its cap. Pinned entries are never
    /// trimmed, even when a lowered cap left more of them than
    /// `max_pinned_items`.
    pub fn enforce_limits(&mut self) -> StoreDelta {
        let mut delta = StoreDelta::default();
        self.trim_unpinned(&mut delta);
        delta
    }

    fn trim_unpinned(&mut self, delta: &mut StoreDelta) {
        while self.unpinned.len() > self.max_history_items {
            let Some(evicted) = self.unpinned.pop() else {
                break;
            };
            self.dedup.remove(&evicted.fingerprint);
            delta.removed.push(evicted.id);
        }
    }

    /// Insert keeping timestamp-descending order; equal timestamps land
    /// after existing ones, preserving stable insertion order.
    fn insert_by_timestamp(entries: &mut Vec<Entry>, entry: Entry) {
        let pos = entries.partition_point(|e| e.timestamp >= entry.timestamp);
        entries.insert(pos, entry);
    }

    /// `(is_pinned_partition, position)` of a live entry.
    fn locate(&self, id: EntryId) -> Option<(bool, usize)> {
        if let Some(pos) = self.pinned.iter().position(|e| e.id == id) {
            return Some((true, pos));
        }
        self.unpinned
            .iter()
            .position(|e| e.id == id)
            .map(|pos| (false, pos))
    }

    pub fn get(&self, id: EntryId) -> Option<&Entry> {
        self.locate(id).map(|(partition, pos)| {
            if partition {
                &self.pinned[pos]
            } else {
                &self.unpinned[pos]
            }
        })
    }

    pub fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot {
            pinned: self.pinned.clone(),
            unpinned: self.unpinned.clone(),
        }
    }

    /// Case-insensitive substring search over both partitions, most
    /// recent first; pinned entries sort first on timestamp ties.
    pub fn search(&self, query: &str) -> Vec<Entry> {
        let needle = query.to_lowercase();
        let mut matches: Vec<Entry> = self
            .pinned
            .iter()
            .chain(self.unpinned.iter())
            .filter(|e| e.content.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matches
    }

    pub fn pinned_len(&self) -> usize {
        self.pinned.len()
    }

    pub fn unpinned_len(&self) -> usize {
        self.unpinned.len()
    }
}
