//! Auto-clear timer behavior on tokio's paused clock.

mod support;

use std::time::Duration;

use clipstash_core::{ClipboardAdapter, EngineConfig};
use support::{harness, FakeRepository};

async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

fn auto_clear_config() -> EngineConfig {
    EngineConfig {
        auto_clear_enabled: true,
        auto_clear_minutes: 1,
        ..EngineConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn history_clears_after_the_grace_period() {
    let h = harness(auto_clear_config(), FakeRepository::new());

    let pinned = h.engine.record_copy("keep pinned", false).unwrap();
    h.engine.toggle_pin(pinned.id);
    h.engine.record_copy("ephemeral", false).unwrap();
    h.clipboard.write_string("ephemeral").unwrap();

    tokio::time::advance(Duration::from_secs(61)).await;
    settle().await;

    let snapshot = h.engine.snapshot();
    assert!(snapshot.unpinned.is_empty());
    assert_eq!(snapshot.pinned.len(), 1);
    // The system clipboard is wiped along with the unpinned history.
    assert_eq!(h.clipboard.read_string().unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn a_fresh_copy_restarts_the_timer_instead_of_stacking() {
    let h = harness(auto_clear_config(), FakeRepository::new());

    h.engine.record_copy("first", false).unwrap();
    tokio::time::advance(Duration::from_secs(30)).await;
    settle().await;

    // New content: the full grace period starts over.
    h.engine.record_copy("second", false).unwrap();
    tokio::time::advance(Duration::from_secs(40)).await;
    settle().await;
    assert_eq!(h.engine.snapshot().unpinned.len(), 2);

    tokio::time::advance(Duration::from_secs(25)).await;
    settle().await;
    assert!(h.engine.snapshot().unpinned.is_empty());
}

#[tokio::test(start_paused = true)]
async fn disabled_auto_clear_never_fires() {
    let h = harness(EngineConfig::default(), FakeRepository::new());

    h.engine.record_copy("stays", false).unwrap();
    tokio::time::advance(Duration::from_secs(3600)).await;
    settle().await;

    assert_eq!(h.engine.snapshot().unpinned.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn manual_clear_cancels_the_pending_timer() {
    let h = harness(auto_clear_config(), FakeRepository::new());

    h.engine.record_copy("soon gone", false).unwrap();
    h.engine.clear(true);

    // Nothing left to fire on; advancing past the deadline is quiet.
    tokio::time::advance(Duration::from_secs(120)).await;
    settle().await;
    assert!(h.engine.snapshot().is_empty());
}
