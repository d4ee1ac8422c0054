//! clipstash-core — clipboard history engine.
//!
//! Observes a platform clipboard, records distinct copy events as ordered,
//! deduplicated history entries, enforces capacity and pin-count limits,
//! and persists state durably with debounced low-latency writes. The host
//! application provides the UI, hotkeys, and platform adapters; this crate
//! owns the correctness-critical middle.
//!
//! # Architecture
//! - `models` / `content_detection`: entry data model and kind tagging
//! - `dedup` / `history`: fingerprint index and the partitioned store
//! - `persistence` / `repository` / `database`: debounced durable writes
//!   over an async storage contract, with a SQLite implementation
//! - `monitor` / `clipboard` / `metadata`: change-counter polling and
//!   copy provenance
//! - `engine`: the single serialization point wiring it all together

pub mod clipboard;
pub mod clock;
pub mod config;
pub mod content_detection;
pub mod database;
pub mod dedup;
pub mod engine;
pub mod history;
pub mod metadata;
pub mod models;
pub mod monitor;
pub mod persistence;
pub mod repository;
mod runtime;

pub use clipboard::{ClipboardAdapter, ClipboardError, MemoryClipboard};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use database::SqliteRepository;
pub use engine::HistoryEngine;
pub use history::{HistorySnapshot, PinOutcome};
pub use metadata::{AppInfoProvider, FrontmostApp, HostIdentity, NoFrontmostApp};
pub use models::{Entry, EntryId, EntryKind, EntryOrigin};
pub use monitor::ClipboardMonitor;
pub use repository::{HistoryRepository, RepositoryError};
