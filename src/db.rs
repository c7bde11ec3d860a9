use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::{Connection, params};

use crate::error::StorageError;

/// How many audit-log rows `recent_submissions` returns.
const RECENT_SUBMISSIONS_LIMIT: i64 = 10;

/// Additive schema migrations, applied in order and tracked via
/// `PRAGMA user_version`. New tables are only ever added, never dropped.
const MIGRATIONS: &[&str] = &[
    // v1: append-only submission audit log
    "CREATE TABLE IF NOT EXISTS submissions (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp  INTEGER NOT NULL,
        preview    TEXT NOT NULL,
        success    INTEGER NOT NULL
    );",
    // v2: durable queue of notes awaiting remote delivery
    "CREATE TABLE IF NOT EXISTS pending_notes (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        text       TEXT NOT NULL,
        filename   TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        status     TEXT NOT NULL DEFAULT 'pending'
    );",
    // v3: durable queue of local files awaiting remote backup
    "CREATE TABLE IF NOT EXISTS sync_queue (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        filename   TEXT NOT NULL,
        content    TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        status     TEXT NOT NULL DEFAULT 'pending'
    );",
];

/// Lifecycle status of a queued pending note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteStatus {
    Pending,
    Uploading,
    Failed,
    AuthFailed,
}

impl NoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Uploading => "uploading",
            Self::Failed => "failed",
            Self::AuthFailed => "auth_failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "uploading" => Some(Self::Uploading),
            "failed" => Some(Self::Failed),
            "auth_failed" => Some(Self::AuthFailed),
            _ => None,
        }
    }
}

/// Lifecycle status of a backup sync-queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Pending,
    Syncing,
    Synced,
    Failed,
    AuthFailed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Syncing => "syncing",
            Self::Synced => "synced",
            Self::Failed => "failed",
            Self::AuthFailed => "auth_failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "syncing" => Some(Self::Syncing),
            "synced" => Some(Self::Synced),
            "failed" => Some(Self::Failed),
            "auth_failed" => Some(Self::AuthFailed),
            _ => None,
        }
    }
}

/// A note persisted before any delivery attempt (queue-first).
#[derive(Debug, Clone)]
pub struct PendingNote {
    pub id: i64,
    pub text: String,
    pub filename: String,
    pub created_at: i64,
    pub status: NoteStatus,
}

/// A local file queued for best-effort remote backup.
#[derive(Debug, Clone)]
pub struct SyncEntry {
    pub id: i64,
    pub filename: String,
    pub content: String,
    pub created_at: i64,
    pub status: SyncStatus,
}

/// An audit-log record of a submission attempt outcome.
#[derive(Debug, Clone)]
pub struct Submission {
    pub id: i64,
    pub timestamp: i64,
    pub preview: String,
    pub success: bool,
}

/// The durable local store shared by the foreground submission path and the
/// background workers. All cross-task coordination state lives here, not in
/// memory, so workers can resume safely after a process death mid-batch.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        set_pragmas(&conn)?;
        migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        set_pragmas(&conn)?;
        migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // --- pending notes ---

    pub fn insert_pending_note(
        &self,
        text: &str,
        filename: &str,
        created_at: i64,
    ) -> Result<i64, StorageError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO pending_notes (text, filename, created_at, status)
             VALUES (?1, ?2, ?3, 'pending')",
            params![text, filename, created_at],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// All notes eligible for (re)delivery, oldest first.
    pub fn pending_notes(&self) -> Result<Vec<PendingNote>, StorageError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, text, filename, created_at, status FROM pending_notes
             WHERE status IN ('pending', 'failed')
             ORDER BY created_at ASC, id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(PendingNote {
                id: row.get(0)?,
                text: row.get(1)?,
                filename: row.get(2)?,
                created_at: row.get(3)?,
                status: NoteStatus::from_str(&row.get::<_, String>(4)?)
                    .unwrap_or(NoteStatus::Pending),
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn pending_note_count(&self) -> Result<i64, StorageError> {
        let conn = self.conn();
        let count =
            conn.query_row("SELECT COUNT(*) FROM pending_notes", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn note_status(&self, id: i64) -> Result<Option<NoteStatus>, StorageError> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT status FROM pending_notes WHERE id = ?1")?;
        let mut rows = stmt.query(params![id])?;
        match rows.next()? {
            Some(row) => Ok(NoteStatus::from_str(&row.get::<_, String>(0)?)),
            None => Ok(None),
        }
    }

    pub fn set_note_status(&self, id: i64, status: NoteStatus) -> Result<(), StorageError> {
        self.conn().execute(
            "UPDATE pending_notes SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id],
        )?;
        Ok(())
    }

    pub fn delete_note(&self, id: i64) -> Result<(), StorageError> {
        self.conn()
            .execute("DELETE FROM pending_notes WHERE id = ?1", params![id])?;
        Ok(())
    }

    // --- submission audit log ---

    pub fn insert_submission(
        &self,
        timestamp: i64,
        preview: &str,
        success: bool,
    ) -> Result<(), StorageError> {
        self.conn().execute(
            "INSERT INTO submissions (timestamp, preview, success) VALUES (?1, ?2, ?3)",
            params![timestamp, preview, success],
        )?;
        Ok(())
    }

    /// Most-recent-first, capped history.
    pub fn recent_submissions(&self) -> Result<Vec<Submission>, StorageError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, preview, success FROM submissions
             ORDER BY timestamp DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![RECENT_SUBMISSIONS_LIMIT], |row| {
            Ok(Submission {
                id: row.get(0)?,
                timestamp: row.get(1)?,
                preview: row.get(2)?,
                success: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn submission_count(&self) -> Result<i64, StorageError> {
        let conn = self.conn();
        let count = conn.query_row("SELECT COUNT(*) FROM submissions", [], |row| row.get(0))?;
        Ok(count)
    }

    // --- backup sync queue ---

    pub fn insert_sync_entry(
        &self,
        filename: &str,
        content: &str,
        created_at: i64,
    ) -> Result<i64, StorageError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO sync_queue (filename, content, created_at, status)
             VALUES (?1, ?2, ?3, 'pending')",
            params![filename, content, created_at],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Backup entries eligible for (re)delivery, oldest first.
    pub fn pending_sync_entries(&self) -> Result<Vec<SyncEntry>, StorageError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, filename, content, created_at, status FROM sync_queue
             WHERE status IN ('pending', 'failed')
             ORDER BY created_at ASC, id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(SyncEntry {
                id: row.get(0)?,
                filename: row.get(1)?,
                content: row.get(2)?,
                created_at: row.get(3)?,
                status: SyncStatus::from_str(&row.get::<_, String>(4)?)
                    .unwrap_or(SyncStatus::Pending),
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn pending_sync_count(&self) -> Result<i64, StorageError> {
        let conn = self.conn();
        let count = conn.query_row(
            "SELECT COUNT(*) FROM sync_queue WHERE status IN ('pending', 'failed')",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn sync_status(&self, id: i64) -> Result<Option<SyncStatus>, StorageError> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT status FROM sync_queue WHERE id = ?1")?;
        let mut rows = stmt.query(params![id])?;
        match rows.next()? {
            Some(row) => Ok(SyncStatus::from_str(&row.get::<_, String>(0)?)),
            None => Ok(None),
        }
    }

    pub fn set_sync_status(&self, id: i64, status: SyncStatus) -> Result<(), StorageError> {
        self.conn().execute(
            "UPDATE sync_queue SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id],
        )?;
        Ok(())
    }

    /// Cleanup pass after a backup batch: synced rows are done.
    pub fn delete_synced(&self) -> Result<(), StorageError> {
        self.conn()
            .execute("DELETE FROM sync_queue WHERE status = 'synced'", [])?;
        Ok(())
    }
}

fn set_pragmas(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;",
    )?;
    Ok(())
}

fn migrate(conn: &Connection) -> Result<(), StorageError> {
    let version: usize =
        conn.query_row("PRAGMA user_version", [], |row| row.get::<_, i64>(0))? as usize;

    for (i, sql) in MIGRATIONS.iter().enumerate().skip(version) {
        conn.execute_batch(sql)?;
        conn.pragma_update(None, "user_version", (i + 1) as i64)?;
        log::info!("applied schema migration v{}", i + 1);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let store = Store::open_in_memory().unwrap();
        // Re-running against an already-migrated connection is a no-op.
        migrate(&store.conn()).unwrap();
        assert_eq!(store.pending_note_count().unwrap(), 0);
    }

    #[test]
    fn pending_note_lifecycle() {
        let store = Store::open_in_memory().unwrap();
        let id = store.insert_pending_note("hello", "2026-01-01T100000+0000", 100).unwrap();

        let pending = store.pending_notes().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].status, NoteStatus::Pending);

        store.set_note_status(id, NoteStatus::Uploading).unwrap();
        // Uploading rows are in-flight, not eligible for another attempt.
        assert!(store.pending_notes().unwrap().is_empty());

        store.set_note_status(id, NoteStatus::Failed).unwrap();
        assert_eq!(store.pending_notes().unwrap().len(), 1);

        store.delete_note(id).unwrap();
        assert_eq!(store.pending_note_count().unwrap(), 0);
    }

    #[test]
    fn auth_failed_notes_are_not_retried() {
        let store = Store::open_in_memory().unwrap();
        let id = store.insert_pending_note("x", "f", 1).unwrap();
        store.set_note_status(id, NoteStatus::AuthFailed).unwrap();
        assert!(store.pending_notes().unwrap().is_empty());
        // Still counted: the row survives for the UI to surface.
        assert_eq!(store.pending_note_count().unwrap(), 1);
    }

    #[test]
    fn pending_notes_ordered_by_creation() {
        let store = Store::open_in_memory().unwrap();
        store.insert_pending_note("second", "b", 200).unwrap();
        store.insert_pending_note("first", "a", 100).unwrap();
        let notes = store.pending_notes().unwrap();
        assert_eq!(notes[0].text, "first");
        assert_eq!(notes[1].text, "second");
    }

    #[test]
    fn recent_submissions_capped_and_newest_first() {
        let store = Store::open_in_memory().unwrap();
        for i in 0..15 {
            store.insert_submission(i, &format!("note {i}"), true).unwrap();
        }
        let recent = store.recent_submissions().unwrap();
        assert_eq!(recent.len(), 10);
        assert_eq!(recent[0].preview, "note 14");
        assert_eq!(recent[9].preview, "note 5");
        assert_eq!(store.submission_count().unwrap(), 15);
    }

    #[test]
    fn sync_queue_lifecycle_and_cleanup() {
        let store = Store::open_in_memory().unwrap();
        let a = store.insert_sync_entry("inbox.org", "* A\n", 1).unwrap();
        let b = store.insert_sync_entry("inbox.org", "* A\n* B\n", 2).unwrap();

        assert_eq!(store.pending_sync_count().unwrap(), 2);

        store.set_sync_status(a, SyncStatus::Synced).unwrap();
        store.set_sync_status(b, SyncStatus::Failed).unwrap();
        // Failed entries remain eligible for retry; synced ones do not.
        assert_eq!(store.pending_sync_count().unwrap(), 1);

        store.delete_synced().unwrap();
        assert_eq!(store.sync_status(a).unwrap(), None);
        assert_eq!(store.sync_status(b).unwrap(), Some(SyncStatus::Failed));
    }
}
