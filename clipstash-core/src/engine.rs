//! Engine facade: the single serialization point for all history state.
//!
//! Every mutation — monitor submissions, UI-triggered operations, the
//! auto-clear timer, and the initial load — goes through one lock over the
//! in-memory store. Suspension points (clipboard, repository, timers)
//! never run under that lock. Readers take consistent snapshots under the
//! same lock and can subscribe to a revision channel for change pings.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::clipboard::{ChangeOriginMarker, ClipboardAdapter};
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::history::{HistorySnapshot, HistoryStore, PinOutcome};
use crate::metadata::{AppInfoProvider, HostIdentity, MetadataCapture};
use crate::models::{Entry, EntryId};
use crate::persistence::PersistenceCoordinator;
use crate::repository::HistoryRepository;
use crate::runtime::runtime_handle;

pub struct HistoryEngine {
    config: EngineConfig,
    state: Mutex<HistoryStore>,
    persistence: Arc<PersistenceCoordinator>,
    clipboard: Arc<dyn ClipboardAdapter>,
    capture: MetadataCapture,
    clock: Arc<dyn Clock>,
    origin_marker: Arc<ChangeOriginMarker>,
    revision: watch::Sender<u64>,
    auto_clear: Mutex<Option<AbortHandle>>,
    weak: Weak<HistoryEngine>,
}

impl HistoryEngine {
    pub fn new(
        config: EngineConfig,
        clipboard: Arc<dyn ClipboardAdapter>,
        app_info: Arc<dyn AppInfoProvider>,
        host: HostIdentity,
        repository: Arc<dyn HistoryRepository>,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        let config = config.validated();
        let (revision, _) = watch::channel(0);

        Arc::new_cyclic(|weak| Self {
            state: Mutex::new(HistoryStore::new(
                config.max_history_items,
                config.max_pinned_items,
            )),
            persistence: PersistenceCoordinator::new(repository, config.debounce_window()),
            clipboard,
            capture: MetadataCapture::new(app_info, host),
            clock,
            origin_marker: Arc::new(ChangeOriginMarker::new()),
            revision,
            auto_clear: Mutex::new(None),
            weak: weak.clone(),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn clipboard(&self) -> Arc<dyn ClipboardAdapter> {
        Arc::clone(&self.clipboard)
    }

    pub(crate) fn origin_marker(&self) -> Arc<ChangeOriginMarker> {
        Arc::clone(&self.origin_marker)
    }

    /// Revision channel: the value bumps on every state change. Consumers
    /// re-read [`HistoryEngine::snapshot`] when it moves.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn bump_revision(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }

    /// Consistent view of both partitions.
    pub fn snapshot(&self) -> HistorySnapshot {
        self.state.lock().snapshot()
    }

    /// Case-insensitive substring search, most recent first.
    pub fn search(&self, query: &str) -> Vec<Entry> {
        self.state.lock().search(query)
    }

    /// Record copied content detected on the clipboard or submitted by the
    /// host's editor. Returns the inserted or promoted entry; `None` for
    /// empty content.
    pub fn record_copy(&self, content: &str, from_editor: bool) -> Option<Entry> {
        let origin = self.capture.capture(from_editor);
        let now = self.clock.now();

        // Recording the delta inside the critical section keeps pending
        // persistence in submission order across concurrent operations.
        let entry = {
            let mut state = self.state.lock();
            let (entry, delta) = state.insert_or_promote(content, origin, now)?;
            self.persistence.record(delta);
            entry
        };
        debug!(
            kind = entry.kind.as_str(),
            preview = %entry.preview(40),
            "recorded copy"
        );

        self.bump_revision();
        self.restart_auto_clear();
        Some(entry)
    }

    /// Re-submit an existing entry's content to the system clipboard and
    /// promote it. Original provenance is preserved; only the timestamp
    /// advances. Returns `None` when the entry is unknown or the clipboard
    /// write failed (the operation then appears to not have happened).
    pub fn recopy(&self, id: EntryId) -> Option<Entry> {
        let content = self.state.lock().get(id).map(|e| e.content.clone())?;

        self.origin_marker.arm_internal(self.origin_ttl());
        if let Err(err) = self.clipboard.write_string(&content) {
            warn!(error = %err, "recopy write to system clipboard failed");
            self.origin_marker.disarm();
            return None;
        }
        if let Ok(count) = self.clipboard.change_count() {
            self.origin_marker.note_expected_count(count);
        }

        let now = self.clock.now();
        let entry = {
            let mut state = self.state.lock();
            let (entry, delta) = state.promote(id, now)?;
            self.persistence.record(delta);
            entry
        };

        self.bump_revision();
        self.restart_auto_clear();
        Some(entry)
    }

    /// Toggle pin state. Pinning fails when the pinned partition is at its
    /// cap; the failure is reported in the outcome, not as an error.
    pub fn toggle_pin(&self, id: EntryId) -> PinOutcome {
        let outcome = {
            let mut state = self.state.lock();
            let (outcome, delta) = state.toggle_pin(id);
            if outcome.success {
                self.persistence.record(delta);
            }
            outcome
        };
        if outcome.success {
            self.bump_revision();
        }
        outcome
    }

    /// Remove an entry. Returns false when the id is unknown.
    pub fn delete(&self, id: EntryId) -> bool {
        {
            let mut state = self.state.lock();
            let Some(delta) = state.delete(id) else {
                return false;
            };
            self.persistence.record(delta);
        }
        self.bump_revision();
        true
    }

    /// Remove all unpinned entries, or everything when `keep_pinned` is
    /// false. The repository-wide clear rides the same debounced flush.
    pub fn clear(&self, keep_pinned: bool) {
        {
            let mut state = self.state.lock();
            let delta = state.clear(keep_pinned);
            self.persistence.record_clear(keep_pinned, delta);
        }
        self.cancel_auto_clear();
        self.bump_revision();
    }

    /// Clear the system clipboard itself. The resulting counter bump is
    /// marked internal so the monitor does not re-ingest it.
    pub fn clear_system_clipboard(&self) {
        self.origin_marker.arm_internal(self.origin_ttl());
        if let Err(err) = self.clipboard.clear() {
            warn!(error = %err, "system clipboard clear failed");
            self.origin_marker.disarm();
            return;
        }
        if let Ok(count) = self.clipboard.change_count() {
            self.origin_marker.note_expected_count(count);
        }
    }

    /// Two-phase initial load. Pinned entries are published to readers
    /// before the full-set repository read starts; afterwards capacity
    /// enforcement runs once, preserving all pinned entries.
    pub async fn load(&self) {
        let pinned = self.persistence.load_pinned().await;
        let pinned_count = pinned.len();
        self.state.lock().seed(pinned);
        self.bump_revision();
        info!(pinned = pinned_count, "pinned history published");

        let full = self
            .persistence
            .load_full(
                self.config.max_history_items,
                self.config.max_pinned_items,
                pinned_count,
            )
            .await;
        let loaded = full.len();

        {
            let mut state = self.state.lock();
            state.seed(full);
            // Persist the trim so over-cap rows do not resurface next
            // launch.
            let delta = state.enforce_limits();
            self.persistence.record(delta);
        }
        self.bump_revision();
        info!(loaded, "full history published");
    }

    /// Force pending saves to disk and wait for the write.
    pub async fn flush(&self) {
        self.persistence.flush().await;
    }

    /// Cancel timers and drain pending saves.
    pub async fn shutdown(&self) {
        self.cancel_auto_clear();
        self.persistence.flush().await;
    }

    fn origin_ttl(&self) -> Duration {
        // Long enough for the next few polls to observe the bump.
        self.config.poll_interval() * 4
    }

    /// Re-arm the auto-clear timer so a fresh copy always gets the full
    /// configured grace period. Timers are replaced, never accumulated.
    fn restart_auto_clear(&self) {
        if !self.config.auto_clear_enabled {
            return;
        }
        let mut slot = self.auto_clear.lock();
        if let Some(armed) = slot.take() {
            armed.abort();
        }
        let engine = self.weak.clone();
        let delay = self.config.auto_clear_interval();
        let handle = runtime_handle().spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(engine) = engine.upgrade() {
                info!("auto-clear grace period elapsed");
                engine.clear(true);
                engine.clear_system_clipboard();
            }
        });
        *slot = Some(handle.abort_handle());
    }

    fn cancel_auto_clear(&self) {
        if let Some(armed) = self.auto_clear.lock().take() {
            armed.abort();
        }
    }
}
