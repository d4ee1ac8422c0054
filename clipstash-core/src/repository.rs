//! Durable storage contract.
//!
//! The repository is an externally-owned, latency-bearing collaborator.
//! Every operation may fail; callers log the failure and keep the
//! in-memory state as the source of truth until the next natural retry.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Entry, EntryId};

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("storage failure: {0}")]
    Storage(String),
    #[error("corrupted record: {0}")]
    Corrupted(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait HistoryRepository: Send + Sync {
    /// Upsert entries by id. Idempotent.
    async fn save(&self, entries: &[Entry]) -> RepositoryResult<()>;

    /// Most-recent-first, bounded by `limit`.
    async fn load(&self, limit: usize) -> RepositoryResult<Vec<Entry>>;

    async fn load_all(&self) -> RepositoryResult<Vec<Entry>>;

    /// All pinned entries, most-recent-first.
    async fn load_pinned(&self) -> RepositoryResult<Vec<Entry>>;

    async fn delete(&self, id: &EntryId) -> RepositoryResult<()>;

    /// Remove unpinned rows, or everything when `keep_pinned` is false.
    async fn clear(&self, keep_pinned: bool) -> RepositoryResult<()>;

    /// Batched delta apply used by the debounced flush: upsert `inserted`
    /// and `updated`, delete `removed`, atomically.
    async fn apply_changes(
        &self,
        inserted: &[Entry],
        updated: &[Entry],
        removed: &[EntryId],
    ) -> RepositoryResult<()>;
}
