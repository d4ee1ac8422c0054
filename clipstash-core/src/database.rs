//! SQLite repository implementation.
//!
//! Uses r2d2 connection pooling so reads do not serialize behind a single
//! mutex; WAL mode lets readers proceed while the debounced flush writes.
//! Blocking rusqlite work runs on the tokio blocking pool.
//!
//! Corrupted rows (unparsable id, kind, or timestamp) decode to nothing:
//! they are logged, skipped, and deleted so they cannot repeatedly fail
//! future loads.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, Row};
use thiserror::Error;
use tracing::warn;

use crate::models::{fingerprint, Entry, EntryId, EntryKind, EntryOrigin};
use crate::repository::{HistoryRepository, RepositoryError, RepositoryResult};

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("background task failed: {0}")]
    Task(String),
}

impl From<DatabaseError> for RepositoryError {
    fn from(err: DatabaseError) -> Self {
        RepositoryError::Storage(err.to_string())
    }
}

type DatabaseResult<T> = Result<T, DatabaseError>;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

fn parse_db_timestamp(timestamp_str: &str) -> Option<DateTime<Utc>> {
    chrono::NaiveDateTime::parse_from_str(timestamp_str, TIMESTAMP_FORMAT)
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(timestamp_str, "%Y-%m-%d %H:%M:%S"))
        .ok()
        .map(|dt| Utc.from_utc_datetime(&dt))
}

fn format_db_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// Raw row as stored, before validation. Tolerant extraction: a column of
/// the wrong affinity reads as `None` and the row is flagged corrupted
/// instead of failing the whole query.
struct RawRow {
    rowid: i64,
    id: Option<String>,
    content: Option<String>,
    content_hash: Option<String>,
    kind: Option<String>,
    timestamp: Option<String>,
    is_pinned: Option<i64>,
    source_app: Option<String>,
    window_title: Option<String>,
    bundle_identifier: Option<String>,
    process_id: Option<i64>,
    is_from_editor: Option<i64>,
}

impl RawRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        fn text(row: &Row<'_>, idx: usize) -> Option<String> {
            row.get::<_, Option<String>>(idx).unwrap_or(None)
        }
        fn integer(row: &Row<'_>, idx: usize) -> Option<i64> {
            row.get::<_, Option<i64>>(idx).unwrap_or(None)
        }

        Ok(Self {
            rowid: row.get(0)?,
            id: text(row, 1),
            content: text(row, 2),
            content_hash: text(row, 3),
            kind: text(row, 4),
            timestamp: text(row, 5),
            is_pinned: integer(row, 6),
            source_app: text(row, 7),
            window_title: text(row, 8),
            bundle_identifier: text(row, 9),
            process_id: integer(row, 10),
            is_from_editor: integer(row, 11),
        })
    }

    fn parse(self) -> Result<Entry, String> {
        let id = self
            .id
            .as_deref()
            .and_then(EntryId::parse)
            .ok_or("invalid entry id")?;
        let content = self.content.ok_or("missing content")?;
        let kind = self
            .kind
            .as_deref()
            .and_then(EntryKind::from_tag)
            .ok_or("unknown entry kind")?;
        let timestamp = self
            .timestamp
            .as_deref()
            .and_then(parse_db_timestamp)
            .ok_or("unparsable timestamp")?;
        let is_pinned = self.is_pinned.ok_or("missing pin flag")? != 0;

        let fingerprint = self
            .content_hash
            .unwrap_or_else(|| fingerprint(&content));

        Ok(Entry {
            id,
            content,
            fingerprint,
            timestamp,
            is_pinned,
            kind,
            origin: EntryOrigin {
                source_app: self.source_app,
                window_title: self.window_title,
                bundle_identifier: self.bundle_identifier,
                process_id: self.process_id.map(|pid| pid as i32),
                is_from_editor: self.is_from_editor.unwrap_or(0) != 0,
            },
        })
    }
}

const SELECT_COLUMNS: &str = "rowid, id, content, contentHash, kind, timestamp, isPinned, \
     sourceApp, windowTitle, bundleIdentifier, processId, isFromEditor";

/// Durable history storage backed by SQLite.
pub struct SqliteRepository {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteRepository {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> DatabaseResult<Self> {
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch(
                "
                PRAGMA journal_mode=WAL;
                PRAGMA synchronous=NORMAL;
                PRAGMA mmap_size=67108864;
                PRAGMA cache_size=-32000;
            ",
            )?;
            Ok(())
        });

        let pool = Pool::builder().max_size(8).build(manager)?;
        let repo = Self { pool };
        repo.setup_schema()?;
        Ok(repo)
    }

    /// Open an in-memory database (tests, ephemeral hosts).
    pub fn open_in_memory() -> DatabaseResult<Self> {
        let manager = SqliteConnectionManager::memory();

        // In-memory databases are per-connection; a single connection
        // keeps the state visible across calls.
        let pool = Pool::builder().max_size(1).build(manager)?;
        let repo = Self { pool };
        repo.setup_schema()?;
        Ok(repo)
    }

    fn get_conn(&self) -> DatabaseResult<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    fn setup_schema(&self) -> DatabaseResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS entries (
                id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                contentHash TEXT NOT NULL,
                kind TEXT NOT NULL,
                timestamp DATETIME NOT NULL,
                isPinned INTEGER NOT NULL DEFAULT 0,
                sourceApp TEXT,
                windowTitle TEXT,
                bundleIdentifier TEXT,
                processId INTEGER,
                isFromEditor INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_entries_hash ON entries(contentHash);
            CREATE INDEX IF NOT EXISTS idx_entries_timestamp ON entries(timestamp);
            CREATE INDEX IF NOT EXISTS idx_entries_pinned ON entries(isPinned);
            "#,
        )?;
        Ok(())
    }

    /// Run blocking rusqlite work on the tokio blocking pool.
    async fn run<T, F>(&self, op: F) -> DatabaseResult<T>
    where
        T: Send + 'static,
        F: FnOnce(PooledConnection<SqliteConnectionManager>) -> DatabaseResult<T>
            + Send
            + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            op(conn)
        })
        .await
        .map_err(|e| DatabaseError::Task(e.to_string()))?
    }

    fn upsert(conn: &Connection, entry: &Entry) -> DatabaseResult<()> {
        conn.execute(
            r#"
            INSERT INTO entries (id, content, contentHash, kind, timestamp, isPinned,
                                 sourceApp, windowTitle, bundleIdentifier, processId, isFromEditor)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(id) DO UPDATE SET
                content = excluded.content,
                contentHash = excluded.contentHash,
                kind = excluded.kind,
                timestamp = excluded.timestamp,
                isPinned = excluded.isPinned,
                sourceApp = excluded.sourceApp,
                windowTitle = excluded.windowTitle,
                bundleIdentifier = excluded.bundleIdentifier,
                processId = excluded.processId,
                isFromEditor = excluded.isFromEditor
            "#,
            params![
                entry.id.to_string(),
                entry.content,
                entry.fingerprint,
                entry.kind.as_str(),
                format_db_timestamp(entry.timestamp),
                entry.is_pinned as i64,
                entry.origin.source_app,
                entry.origin.window_title,
                entry.origin.bundle_identifier,
                entry.origin.process_id.map(|pid| pid as i64),
                entry.origin.is_from_editor as i64,
            ],
        )?;
        Ok(())
    }

    /// Query entries, most-recent-first. Corrupted rows are deleted in the
    /// same connection and excluded from the result.
    fn query_entries(
        conn: &Connection,
        where_clause: &str,
        limit: Option<usize>,
    ) -> DatabaseResult<Vec<Entry>> {
        let mut sql = format!(
            "SELECT {SELECT_COLUMNS} FROM entries {where_clause} ORDER BY timestamp DESC, rowid ASC"
        );
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let mut stmt = conn.prepare(&sql)?;
        let raw_rows: Vec<RawRow> = stmt
            .query_map([], RawRow::read)?
            .collect::<rusqlite::Result<_>>()?;

        let mut entries = Vec::with_capacity(raw_rows.len());
        let mut corrupted = Vec::new();
        for raw in raw_rows {
            let rowid = raw.rowid;
            match raw.parse() {
                Ok(entry) => entries.push(entry),
                Err(reason) => {
                    warn!(rowid, %reason, "dropping corrupted history row");
                    corrupted.push(rowid);
                }
            }
        }

        for rowid in corrupted {
            conn.execute("DELETE FROM entries WHERE rowid = ?1", params![rowid])?;
        }

        Ok(entries)
    }
}

#[async_trait]
impl HistoryRepository for SqliteRepository {
    async fn save(&self, entries: &[Entry]) -> RepositoryResult<()> {
        let entries = entries.to_vec();
        self.run(move |mut conn| {
            let tx = conn.transaction()?;
            for entry in &entries {
                Self::upsert(&tx, entry)?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(Into::into)
    }

    async fn load(&self, limit: usize) -> RepositoryResult<Vec<Entry>> {
        self.run(move |conn| Self::query_entries(&conn, "", Some(limit)))
            .await
            .map_err(Into::into)
    }

    async fn load_all(&self) -> RepositoryResult<Vec<Entry>> {
        self.run(|conn| Self::query_entries(&conn, "", None))
            .await
            .map_err(Into::into)
    }

    async fn load_pinned(&self) -> RepositoryResult<Vec<Entry>> {
        self.run(|conn| Self::query_entries(&conn, "WHERE isPinned = 1", None))
            .await
            .map_err(Into::into)
    }

    async fn delete(&self, id: &EntryId) -> RepositoryResult<()> {
        let id = id.to_string();
        self.run(move |conn| {
            conn.execute("DELETE FROM entries WHERE id = ?1", params![id])?;
            Ok(())
        })
        .await
        .map_err(Into::into)
    }

    async fn clear(&self, keep_pinned: bool) -> RepositoryResult<()> {
        self.run(move |conn| {
            if keep_pinned {
                conn.execute("DELETE FROM entries WHERE isPinned = 0", [])?;
            } else {
                conn.execute("DELETE FROM entries", [])?;
            }
            Ok(())
        })
        .await
        .map_err(Into::into)
    }

    async fn apply_changes(
        &self,
        inserted: &[Entry],
        updated: &[Entry],
        removed: &[EntryId],
    ) -> RepositoryResult<()> {
        let inserted = inserted.to_vec();
        let updated = updated.to_vec();
        let removed: Vec<String> = removed.iter().map(|id| id.to_string()).collect();
        self.run(move |mut conn| {
            let tx = conn.transaction()?;
            for entry in inserted.iter().chain(updated.iter()) {
                Self::upsert(&tx, entry)?;
            }
            for id in &removed {
                tx.execute("DELETE FROM entries WHERE id = ?1", params![id])?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(Into::into)
    }
}
