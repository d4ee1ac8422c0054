//! Engine configuration.
//!
//! Owned by the host application and read-only to the core. The host
//! typically deserializes this from its settings file and passes it to
//! [`crate::engine::HistoryEngine::new`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Maximum number of unpinned entries kept in history. Minimum 1.
    pub max_history_items: usize,
    /// Maximum number of pinned entries. Minimum 1. Gates pin requests;
    /// pinned rows loaded from storage are preserved even above the cap.
    pub max_pinned_items: usize,
    pub auto_clear_enabled: bool,
    /// Grace period before unpinned history is auto-cleared, in minutes.
    pub auto_clear_minutes: u64,
    /// Delay used to coalesce rapid mutations into one durable write.
    pub debounce_ms: u64,
    /// Clipboard change-counter polling interval.
    pub poll_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_history_items: 100,
            max_pinned_items: 10,
            auto_clear_enabled: false,
            auto_clear_minutes: 30,
            debounce_ms: 300,
            poll_interval_ms: 500,
        }
    }
}

impl EngineConfig {
    /// Clamp out-of-range values to their minimums.
    pub fn validated(mut self) -> Self {
        self.max_history_items = self.max_history_items.max(1);
        self.max_pinned_items = self.max_pinned_items.max(1);
        self.auto_clear_minutes = self.auto_clear_minutes.max(1);
        self.debounce_ms = self.debounce_ms.max(1);
        self.poll_interval_ms = self.poll_interval_ms.max(50);
        self
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn auto_clear_interval(&self) -> Duration {
        Duration::from_secs(self.auto_clear_minutes * 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        assert_eq!(config, config.clone().validated());
    }

    #[test]
    fn validation_clamps_zero_limits() {
        let config = EngineConfig {
            max_history_items: 0,
            max_pinned_items: 0,
            auto_clear_minutes: 0,
            debounce_ms: 0,
            poll_interval_ms: 0,
            ..EngineConfig::default()
        }
        .validated();

        assert_eq!(config.max_history_items, 1);
        assert_eq!(config.max_pinned_items, 1);
        assert_eq!(config.auto_clear_minutes, 1);
        assert!(config.debounce_ms >= 1);
        assert!(config.poll_interval_ms >= 50);
    }

    #[test]
    fn deserializes_partial_settings() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"maxHistoryItems": 25, "autoClearEnabled": true}"#).unwrap();
        assert_eq!(config.max_history_items, 25);
        assert!(config.auto_clear_enabled);
        assert_eq!(config.max_pinned_items, EngineConfig::default().max_pinned_items);
    }

    #[test]
    fn duration_accessors() {
        let config = EngineConfig::default();
        assert_eq!(config.debounce_window(), Duration::from_millis(300));
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.auto_clear_interval(), Duration::from_secs(30 * 60));
    }
}
