//! Shared test doubles for the integration suite.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use clipstash_core::clock::ManualClock;
use clipstash_core::metadata::{AppInfoProvider, FrontmostApp};
use clipstash_core::repository::{HistoryRepository, RepositoryError, RepositoryResult};
use clipstash_core::{
    Clock, EngineConfig, Entry, EntryId, HistoryEngine, HostIdentity, MemoryClipboard,
};

/// In-memory repository with injectable latency and failure.
pub struct FakeRepository {
    entries: Mutex<HashMap<EntryId, Entry>>,
    latency: Option<Duration>,
    failing: AtomicBool,
    apply_attempts: AtomicUsize,
    apply_successes: AtomicUsize,
    last_load_limit: AtomicUsize,
}

impl FakeRepository {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            latency: None,
            failing: AtomicBool::new(false),
            apply_attempts: AtomicUsize::new(0),
            apply_successes: AtomicUsize::new(0),
            last_load_limit: AtomicUsize::new(0),
        }
    }

    /// Every repository call sleeps this long first (virtual time).
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn seed(&self, entries: Vec<Entry>) {
        let mut map = self.entries.lock();
        for entry in entries {
            map.insert(entry.id, entry);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Contents most-recent-first.
    pub fn contents(&self) -> Vec<String> {
        self.sorted().into_iter().map(|e| e.content).collect()
    }

    pub fn get(&self, id: EntryId) -> Option<Entry> {
        self.entries.lock().get(&id).cloned()
    }

    pub fn apply_attempts(&self) -> usize {
        self.apply_attempts.load(Ordering::SeqCst)
    }

    pub fn apply_successes(&self) -> usize {
        self.apply_successes.load(Ordering::SeqCst)
    }

    pub fn last_load_limit(&self) -> usize {
        self.last_load_limit.load(Ordering::SeqCst)
    }

    fn sorted(&self) -> Vec<Entry> {
        let mut entries: Vec<Entry> = self.entries.lock().values().cloned().collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn check(&self) -> RepositoryResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(RepositoryError::Storage("injected failure".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl HistoryRepository for FakeRepository {
    async fn save(&self, entries: &[Entry]) -> RepositoryResult<()> {
        self.delay().await;
        self.check()?;
        self.seed(entries.to_vec());
        Ok(())
    }

    async fn load(&self, limit: usize) -> RepositoryResult<Vec<Entry>> {
        self.delay().await;
        self.last_load_limit.store(limit, Ordering::SeqCst);
        self.check()?;
        Ok(self.sorted().into_iter().take(limit).collect())
    }

    async fn load_all(&self) -> RepositoryResult<Vec<Entry>> {
        self.delay().await;
        self.check()?;
        Ok(self.sorted())
    }

    async fn load_pinned(&self) -> RepositoryResult<Vec<Entry>> {
        self.delay().await;
        self.check()?;
        Ok(self.sorted().into_iter().filter(|e| e.is_pinned).collect())
    }

    async fn delete(&self, id: &EntryId) -> RepositoryResult<()> {
        self.delay().await;
        self.check()?;
        self.entries.lock().remove(id);
        Ok(())
    }

    async fn clear(&self, keep_pinned: bool) -> RepositoryResult<()> {
        self.delay().await;
        self.check()?;
        if keep_pinned {
            self.entries.lock().retain(|_, e| e.is_pinned);
        } else {
            self.entries.lock().clear();
        }
        Ok(())
    }

    async fn apply_changes(
        &self,
        inserted: &[Entry],
        updated: &[Entry],
        removed: &[EntryId],
    ) -> RepositoryResult<()> {
        self.delay().await;
        self.apply_attempts.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let mut map = self.entries.lock();
        for entry in inserted.iter().chain(updated.iter()) {
            map.insert(entry.id, entry.clone());
        }
        for id in removed {
            map.remove(id);
        }
        self.apply_successes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Frontmost-app provider whose answer can be swapped mid-test.
pub struct SwitchableAppInfo {
    current: Mutex<FrontmostApp>,
}

impl SwitchableAppInfo {
    pub fn reporting(app: FrontmostApp) -> Self {
        Self {
            current: Mutex::new(app),
        }
    }

    pub fn switch_to(&self, app: FrontmostApp) {
        *self.current.lock() = app;
    }
}

impl AppInfoProvider for SwitchableAppInfo {
    fn frontmost_app(&self) -> FrontmostApp {
        self.current.lock().clone()
    }
}

pub fn app(name: &str) -> FrontmostApp {
    FrontmostApp {
        name: Some(name.to_string()),
        bundle_id: Some(format!("com.example.{}", name.to_lowercase())),
        pid: Some(321),
        window_title: Some(format!("{name} — Untitled")),
    }
}

pub fn host_identity() -> HostIdentity {
    HostIdentity {
        app_name: "ClipStash".to_string(),
        bundle_identifier: "dev.clipstash.app".to_string(),
        editor_window_title: "Snippet Editor".to_string(),
    }
}

pub struct Harness {
    pub engine: Arc<HistoryEngine>,
    pub clipboard: Arc<MemoryClipboard>,
    pub repo: Arc<FakeRepository>,
    pub clock: Arc<ManualClock>,
    pub app_info: Arc<SwitchableAppInfo>,
}

pub fn harness(config: EngineConfig, repo: FakeRepository) -> Harness {
    let clipboard = Arc::new(MemoryClipboard::new());
    let repo = Arc::new(repo);
    let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
    let app_info = Arc::new(SwitchableAppInfo::reporting(app("Safari")));
    let engine = HistoryEngine::new(
        config,
        clipboard.clone() as Arc<dyn clipstash_core::ClipboardAdapter>,
        app_info.clone() as Arc<dyn AppInfoProvider>,
        host_identity(),
        repo.clone() as Arc<dyn HistoryRepository>,
        clock.clone() as Arc<dyn Clock>,
    );
    Harness {
        engine,
        clipboard,
        repo,
        clock,
        app_info,
    }
}

pub fn default_harness() -> Harness {
    harness(EngineConfig::default(), FakeRepository::new())
}

/// Harness over an already-populated repository, as after a restart.
pub fn harness_with_repo(repo: Arc<FakeRepository>) -> Harness {
    let clipboard = Arc::new(MemoryClipboard::new());
    let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
    let app_info = Arc::new(SwitchableAppInfo::reporting(app("Safari")));
    let engine = HistoryEngine::new(
        EngineConfig::default(),
        clipboard.clone() as Arc<dyn clipstash_core::ClipboardAdapter>,
        app_info.clone() as Arc<dyn AppInfoProvider>,
        host_identity(),
        repo.clone() as Arc<dyn HistoryRepository>,
        clock.clone() as Arc<dyn Clock>,
    );
    Harness {
        engine,
        clipboard,
        repo,
        clock,
        app_info,
    }
}
