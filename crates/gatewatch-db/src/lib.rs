//! SQLite track store.
//!
//! One table, `tracks`, keyed by `(chat_id, run, kind)`. Each row remembers the
//! last entry/exit timestamps its chat was already alerted about, which is the
//! only state the reconciler carries between ticks.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use gatewatch_core::error::{GatewatchError, Result};
use gatewatch_core::traits::TrackStore;
use gatewatch_core::types::{TrackKind, TrackedSubscription};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};

/// Track store backed by a single SQLite connection.
pub struct SqliteTrackStore {
    conn: Mutex<Connection>,
}

/// Which timestamp column a bulk update targets.
#[derive(Clone, Copy)]
enum Stamp {
    Entry,
    Exit,
}

impl Stamp {
    fn column(self) -> &'static str {
        match self {
            Stamp::Entry => "last_entry_at",
            Stamp::Exit => "last_exit_at",
        }
    }
}

impl SqliteTrackStore {
    /// Open or create the database. `:memory:` gives a private in-memory store.
    pub fn open(path: &Path) -> Result<Self> {
        if path != Path::new(":memory:") {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)
            .map_err(|e| GatewatchError::store(format!("open {}: {e}", path.display())))?;

        // WAL lets the HTTP surface read while a tick writes
        conn.execute_batch("PRAGMA journal_mode=WAL;").ok();

        let store = Self { conn: Mutex::new(conn) };
        store.migrate()?;
        tracing::debug!("🗄️ Track store ready at {}", path.display());
        Ok(store)
    }

    /// In-memory store, mostly for tests.
    pub fn in_memory() -> Result<Self> {
        Self::open(Path::new(":memory:"))
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS tracks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                chat_id INTEGER NOT NULL,
                user_id TEXT NOT NULL,
                run TEXT NOT NULL,
                full_name TEXT NOT NULL DEFAULT '',
                alias TEXT,
                kind TEXT NOT NULL DEFAULT 'TRACK',
                last_entry_at TEXT,
                last_exit_at TEXT,
                created_at TEXT DEFAULT (datetime('now')),
                updated_at TEXT DEFAULT (datetime('now')),
                UNIQUE (chat_id, run, kind)
            );

            CREATE INDEX IF NOT EXISTS idx_tracks_user_kind ON tracks (user_id, kind);
            CREATE INDEX IF NOT EXISTS idx_tracks_chat_kind ON tracks (chat_id, kind);
            ",
        )
        .map_err(|e| GatewatchError::store(format!("migrate: {e}")))?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| GatewatchError::store(format!("lock: {e}")))
    }

    fn query_subscriptions(
        &self,
        sql: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<TrackedSubscription>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| GatewatchError::store(format!("prepare: {e}")))?;
        let rows = stmt
            .query_map(args, |row| {
                let kind: String = row.get(5)?;
                Ok(TrackedSubscription {
                    chat_id: row.get(0)?,
                    subject_id: row.get(1)?,
                    run: row.get(2)?,
                    display_name: row.get(3)?,
                    alias: row.get(4)?,
                    kind: TrackKind::parse(&kind).unwrap_or_default(),
                    last_entry_at: row.get(6)?,
                    last_exit_at: row.get(7)?,
                })
            })
            .map_err(|e| GatewatchError::store(format!("query: {e}")))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| GatewatchError::store(format!("row: {e}")))
    }

    /// One UPDATE for the whole batch: `CASE user_id WHEN ? THEN ? ... END`.
    fn bulk_update(
        &self,
        stamp: Stamp,
        updates: &BTreeMap<String, String>,
        kind: TrackKind,
    ) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }

        let whens = " WHEN ? THEN ?".repeat(updates.len());
        let placeholders = vec!["?"; updates.len()].join(", ");
        let column = stamp.column();
        let sql = format!(
            "UPDATE tracks SET {column} = CASE user_id{whens} END, updated_at = datetime('now') \
             WHERE kind = ? AND user_id IN ({placeholders})"
        );

        let mut args: Vec<&str> = Vec::with_capacity(updates.len() * 3 + 1);
        for (subject, at) in updates {
            args.push(subject);
            args.push(at);
        }
        args.push(kind.as_str());
        args.extend(updates.keys().map(String::as_str));

        let conn = self.lock()?;
        let changed = conn
            .execute(&sql, params_from_iter(args))
            .map_err(|e| GatewatchError::store(format!("bulk update {column}: {e}")))?;
        tracing::debug!("🗄️ {column} set on {changed} rows ({} subjects)", updates.len());
        Ok(())
    }

    /// Count rows, for diagnostics.
    pub fn count(&self, kind: TrackKind) -> Result<usize> {
        let conn = self.lock()?;
        let n: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM tracks WHERE kind = ?1",
                params![kind.as_str()],
                |row| row.get(0),
            )
            .map_err(|e| GatewatchError::store(format!("count: {e}")))?;
        Ok(usize::try_from(n).unwrap_or_default())
    }

    /// Fetch a single subscription.
    pub fn get(
        &self,
        chat_id: i64,
        run: &str,
        kind: TrackKind,
    ) -> Result<Option<TrackedSubscription>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT chat_id, user_id, run, full_name, alias, last_entry_at, last_exit_at
             FROM tracks WHERE chat_id = ?1 AND UPPER(run) = UPPER(?2) AND kind = ?3",
            params![chat_id, run, kind.as_str()],
            |row| {
                Ok(TrackedSubscription {
                    chat_id: row.get(0)?,
                    subject_id: row.get(1)?,
                    run: row.get(2)?,
                    display_name: row.get(3)?,
                    alias: row.get(4)?,
                    kind,
                    last_entry_at: row.get(5)?,
                    last_exit_at: row.get(6)?,
                })
            },
        )
        .optional()
        .map_err(|e| GatewatchError::store(format!("get: {e}")))
    }
}

const SELECT_COLUMNS: &str =
    "SELECT chat_id, user_id, run, full_name, alias, kind, last_entry_at, last_exit_at FROM tracks";

#[async_trait]
impl TrackStore for SqliteTrackStore {
    async fn list_by_kind(&self, kind: TrackKind) -> Result<Vec<TrackedSubscription>> {
        let sql = format!("{SELECT_COLUMNS} WHERE kind = ?1 ORDER BY id");
        self.query_subscriptions(&sql, &[&kind.as_str()])
    }

    async fn list_by_chat(
        &self,
        chat_id: i64,
        kind: TrackKind,
    ) -> Result<Vec<TrackedSubscription>> {
        let sql = format!("{SELECT_COLUMNS} WHERE chat_id = ?1 AND kind = ?2 ORDER BY id");
        self.query_subscriptions(&sql, &[&chat_id, &kind.as_str()])
    }

    async fn bulk_update_entry(
        &self,
        updates: &BTreeMap<String, String>,
        kind: TrackKind,
    ) -> Result<()> {
        self.bulk_update(Stamp::Entry, updates, kind)
    }

    async fn bulk_update_exit(
        &self,
        updates: &BTreeMap<String, String>,
        kind: TrackKind,
    ) -> Result<()> {
        self.bulk_update(Stamp::Exit, updates, kind)
    }

    async fn create(&self, sub: &TrackedSubscription) -> Result<bool> {
        let conn = self.lock()?;
        let inserted = conn
            .execute(
                "INSERT INTO tracks
                    (chat_id, user_id, run, full_name, alias, kind, last_entry_at, last_exit_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT (chat_id, run, kind) DO NOTHING",
                params![
                    sub.chat_id,
                    sub.subject_id,
                    sub.run,
                    sub.display_name,
                    sub.alias,
                    sub.kind.as_str(),
                    sub.last_entry_at,
                    sub.last_exit_at,
                ],
            )
            .map_err(|e| GatewatchError::store(format!("insert: {e}")))?;
        Ok(inserted > 0)
    }

    async fn remove_by_run(&self, chat_id: i64, run: &str, kind: TrackKind) -> Result<usize> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM tracks WHERE chat_id = ?1 AND UPPER(run) = UPPER(?2) AND kind = ?3",
            params![chat_id, run, kind.as_str()],
        )
        .map_err(|e| GatewatchError::store(format!("delete: {e}")))
    }
}
