//! Persistence coordination: keeps durable storage eventually consistent
//! with the in-memory store at bounded latency.
//!
//! Mutations arrive as [`StoreDelta`]s and are folded into a pending set
//! keyed by entry id; a debounce timer coalesces bursts into one batched
//! `apply_changes` write. A failed write merges the drained deltas back so
//! the next trigger retries; in-memory state stays the source of truth.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use crate::history::StoreDelta;
use crate::models::{Entry, EntryId};
use crate::repository::{HistoryRepository, RepositoryResult};
use crate::runtime::runtime_handle;

/// Extra slack on the full-load request limit, covering entries written
/// between the two load phases.
pub const LOAD_HEADROOM: usize = 16;

#[derive(Default)]
struct PendingChanges {
    inserted: HashMap<EntryId, Entry>,
    updated: HashMap<EntryId, Entry>,
    removed: HashSet<EntryId>,
    /// Pending repository-wide clear; `Some(keep_pinned)`.
    clear: Option<bool>,
}

impl PendingChanges {
    fn is_empty(&self) -> bool {
        self.inserted.is_empty()
            && self.updated.is_empty()
            && self.removed.is_empty()
            && self.clear.is_none()
    }

    fn record(&mut self, delta: StoreDelta) {
        for entry in delta.inserted {
            self.removed.remove(&entry.id);
            self.inserted.insert(entry.id, entry);
        }
        for entry in delta.updated {
            if let Some(slot) = self.inserted.get_mut(&entry.id) {
                // Still unwritten; the insert carries the latest state.
                *slot = entry;
            } else {
                self.removed.remove(&entry.id);
                self.updated.insert(entry.id, entry);
            }
        }
        for id in delta.removed {
            self.inserted.remove(&id);
            self.updated.remove(&id);
            self.removed.insert(id);
        }
    }

    fn record_clear(&mut self, keep_pinned: bool) {
        // A full clear supersedes one that kept pinned rows.
        self.clear = match self.clear {
            Some(false) => Some(false),
            _ => Some(keep_pinned),
        };
    }

    /// Fold a drained-but-unwritten set back in after a failed write.
    /// Deltas recorded since the drain win over the drained ones.
    fn merge_back(&mut self, drained: PendingChanges) {
        for (id, entry) in drained.inserted {
            if !self.removed.contains(&id) {
                self.inserted.entry(id).or_insert(entry);
            }
        }
        for (id, entry) in drained.updated {
            if !self.removed.contains(&id) && !self.inserted.contains_key(&id) {
                self.updated.entry(id).or_insert(entry);
            }
        }
        for id in drained.removed {
            if !self.inserted.contains_key(&id) && !self.updated.contains_key(&id) {
                self.removed.insert(id);
            }
        }
        if let Some(keep_pinned) = drained.clear {
            self.record_clear(keep_pinned);
        }
    }
}

pub struct PersistenceCoordinator {
    repo: Arc<dyn HistoryRepository>,
    debounce: Duration,
    pending: Mutex<PendingChanges>,
    timer: Mutex<Option<AbortHandle>>,
    /// Serializes repository writes so a debounce firing and an explicit
    /// flush never interleave.
    write_lock: tokio::sync::Mutex<()>,
    weak: Weak<PersistenceCoordinator>,
}

impl PersistenceCoordinator {
    pub fn new(repo: Arc<dyn HistoryRepository>, debounce: Duration) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            repo,
            debounce,
            pending: Mutex::new(PendingChanges::default()),
            timer: Mutex::new(None),
            write_lock: tokio::sync::Mutex::new(()),
            weak: weak.clone(),
        })
    }

    /// Record a mutation and (re)arm the debounce timer. Non-blocking, so
    /// callers may invoke it inside their own critical section to keep
    /// deltas in submission order.
    pub fn record(&self, delta: StoreDelta) {
        if delta.is_empty() {
            return;
        }
        self.pending.lock().record(delta);
        self.arm_timer();
    }

    /// Record a repository-wide clear plus the in-memory removals it
    /// produced.
    pub fn record_clear(&self, keep_pinned: bool, delta: StoreDelta) {
        {
            let mut pending = self.pending.lock();
            pending.record_clear(keep_pinned);
            pending.record(delta);
        }
        self.arm_timer();
    }

    /// Replace any armed timer; the last mutation in a burst decides when
    /// the batch lands.
    fn arm_timer(&self) {
        let mut slot = self.timer.lock();
        if let Some(armed) = slot.take() {
            armed.abort();
        }
        let coordinator = self.weak.clone();
        let debounce = self.debounce;
        let handle = runtime_handle().spawn(async move {
            tokio::time::sleep(debounce).await;
            if let Some(coordinator) = coordinator.upgrade() {
                coordinator.flush().await;
            }
        });
        *slot = Some(handle.abort_handle());
    }

    /// Drain pending deltas and write them now, waiting for the write to
    /// complete. Observes every mutation recorded before the call.
    pub async fn flush(&self) {
        let _write = self.write_lock.lock().await;
        if let Some(armed) = self.timer.lock().take() {
            armed.abort();
        }

        let drained = std::mem::take(&mut *self.pending.lock());
        if drained.is_empty() {
            return;
        }

        if let Err(err) = self.write(&drained).await {
            warn!(error = %err, "history flush failed; keeping deltas pending");
            self.pending.lock().merge_back(drained);
        }
    }

    async fn write(&self, pending: &PendingChanges) -> RepositoryResult<()> {
        if let Some(keep_pinned) = pending.clear {
            self.repo.clear(keep_pinned).await?;
        }

        let inserted: Vec<Entry> = pending.inserted.values().cloned().collect();
        let updated: Vec<Entry> = pending.updated.values().cloned().collect();
        let removed: Vec<EntryId> = pending.removed.iter().copied().collect();
        if inserted.is_empty() && updated.is_empty() && removed.is_empty() {
            return Ok(());
        }

        self.repo.apply_changes(&inserted, &updated, &removed).await?;
        debug!(
            inserted = inserted.len(),
            updated = updated.len(),
            removed = removed.len(),
            "flushed history deltas"
        );
        Ok(())
    }

    /// First load phase: all pinned entries, published before the full
    /// phase starts. Errors are logged and yield an empty phase.
    pub async fn load_pinned(&self) -> Vec<Entry> {
        match self.repo.load_pinned().await {
            Ok(entries) => entries,
            Err(err) => {
                warn!(error = %err, "pinned-phase load failed");
                Vec::new()
            }
        }
    }

    /// Second load phase. The request limit covers repositories holding
    /// more pinned rows than the configured cap (e.g. after the cap was
    /// lowered), so all of them surface before in-memory trimming.
    pub async fn load_full(
        &self,
        max_history_items: usize,
        max_pinned_items: usize,
        current_pinned_count: usize,
    ) -> Vec<Entry> {
        let limit =
            max_history_items + max_pinned_items.max(current_pinned_count) + LOAD_HEADROOM;
        match self.repo.load(limit).await {
            Ok(entries) => entries,
            Err(err) => {
                warn!(error = %err, "full-phase load failed");
                Vec::new()
            }
        }
    }
}
