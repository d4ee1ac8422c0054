//! Clipboard change monitor.
//!
//! Polls the adapter's change counter at a fixed interval and feeds
//! detected external copies into the engine pipeline. Counters, not
//! content, decide what counts as a change; a one-shot origin marker
//! (armed by the engine around its own writes) is consumed at most once
//! per delta, so an internal clear followed by an external copy still
//! surfaces the external event.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::clipboard::{ChangeOrigin, ChangeOriginMarker, ClipboardAdapter};
use crate::engine::HistoryEngine;
use crate::runtime::runtime_handle;

pub struct ClipboardMonitor {
    clipboard: Arc<dyn ClipboardAdapter>,
    engine: Arc<HistoryEngine>,
    origin_marker: Arc<ChangeOriginMarker>,
    interval: Duration,
    running: Mutex<Option<CancellationToken>>,
}

impl ClipboardMonitor {
    pub fn new(engine: Arc<HistoryEngine>, interval: Duration) -> Self {
        Self {
            clipboard: engine.clipboard(),
            origin_marker: engine.origin_marker(),
            engine,
            interval,
            running: Mutex::new(None),
        }
    }

    /// Start polling. Idempotent: a second start while running is a no-op.
    pub fn start(&self) {
        let mut slot = self.running.lock();
        if slot.is_some() {
            return;
        }
        let token = CancellationToken::new();
        *slot = Some(token.clone());

        let clipboard = Arc::clone(&self.clipboard);
        let engine = Arc::clone(&self.engine);
        let origin_marker = Arc::clone(&self.origin_marker);
        let interval = self.interval;
        runtime_handle().spawn(async move {
            Self::poll_loop(clipboard, engine, origin_marker, interval, token).await;
        });
        debug!("clipboard monitor started");
    }

    /// Stop polling promptly. Idempotent; no further clipboard reads after
    /// the in-flight tick completes.
    pub fn stop(&self) {
        if let Some(token) = self.running.lock().take() {
            token.cancel();
            debug!("clipboard monitor stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    async fn poll_loop(
        clipboard: Arc<dyn ClipboardAdapter>,
        engine: Arc<HistoryEngine>,
        origin_marker: Arc<ChangeOriginMarker>,
        interval: Duration,
        token: CancellationToken,
    ) {
        // Content already on the clipboard at start is not a new event.
        let mut last_count = match clipboard.change_count() {
            Ok(count) => Some(count),
            Err(err) => {
                warn!(error = %err, "initial clipboard counter read failed");
                None
            }
        };

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            let count = match clipboard.change_count() {
                Ok(count) => count,
                Err(err) => {
                    warn!(error = %err, "clipboard counter read failed; skipping tick");
                    continue;
                }
            };
            if Some(count) == last_count {
                continue;
            }
            // Update unconditionally so one observed delta maps to at most
            // one event, whatever the reads below return.
            last_count = Some(count);

            if origin_marker.classify(count) == ChangeOrigin::Internal {
                debug!("ignoring internally-initiated clipboard change");
                continue;
            }

            match clipboard.read_string() {
                Ok(Some(content)) => {
                    engine.record_copy(&content, false);
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(error = %err, "clipboard read failed; skipping tick");
                }
            }
        }
    }
}

impl Drop for ClipboardMonitor {
    fn drop(&mut self) {
        if let Some(token) = self.running.get_mut().take() {
            token.cancel();
        }
    }
}
