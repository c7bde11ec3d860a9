use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use crate::db::{NoteStatus, Store, SyncStatus};
use crate::error::StorageError;
use crate::sync::github::ContentApi;

/// Folder in the remote repository that receives queued notes.
const INBOX_DIR: &str = "inbox";

/// Folder in the remote repository that receives backup snapshots.
const BACKUP_DIR: &str = "org";

/// The background jobs this application schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JobKind {
    UploadRetry,
    BackupSync,
}

/// What a worker run tells the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// All work drained.
    Success,
    /// Some work remains retryable; keep the job scheduled.
    Retry,
    /// Terminal for this run; do not reschedule automatically.
    Failure,
}

/// Deduplicating job scheduler. Enqueueing an already-pending kind is a
/// no-op (keep-existing), and each kind runs single-flight.
pub struct JobScheduler {
    pending: Mutex<HashSet<JobKind>>,
    running: Mutex<HashSet<JobKind>>,
}

impl JobScheduler {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashSet::new()),
            running: Mutex::new(HashSet::new()),
        }
    }

    /// Schedule a job. Returns false when the kind was already pending.
    pub fn enqueue(&self, kind: JobKind) -> bool {
        let inserted = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(kind);
        if inserted {
            log::debug!("scheduled {kind:?}");
        }
        inserted
    }

    pub fn pending_jobs(&self) -> Vec<JobKind> {
        let mut jobs: Vec<JobKind> = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .copied()
            .collect();
        jobs.sort();
        jobs
    }

    /// Run every pending job once, sequentially. A `Retry` outcome leaves
    /// the job scheduled for the next pass; a kind already running in
    /// another task is skipped.
    pub async fn run_pending<A: ContentApi>(&self, ctx: &WorkerContext<A>) {
        for kind in self.pending_jobs() {
            {
                let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
                if !running.insert(kind) {
                    continue;
                }
            }
            self.pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&kind);

            let outcome = match kind {
                JobKind::UploadRetry => UploadWorker::run(ctx).await,
                JobKind::BackupSync => BackupSyncWorker::run(ctx).await,
            };
            log::info!("{kind:?} finished with {outcome:?}");

            if outcome == JobOutcome::Retry {
                self.enqueue(kind);
            }
            self.running
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&kind);
        }
    }
}

impl Default for JobScheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything a worker run needs: the durable store, the remote API, and
/// whatever credentials are currently configured.
pub struct WorkerContext<A: ContentApi> {
    pub store: Arc<Store>,
    pub api: Arc<A>,
    pub token: Option<String>,
    pub owner: Option<String>,
    pub repo: Option<String>,
}

impl<A: ContentApi> WorkerContext<A> {
    fn credentials(&self) -> Option<(&str, &str, &str)> {
        match (&self.token, &self.owner, &self.repo) {
            (Some(t), Some(o), Some(r)) => Some((t, o, r)),
            _ => None,
        }
    }
}

/// Drains the pending-note queue into the remote inbox.
///
/// Each note moves `pending -> uploading -> gone` on success. An auth
/// rejection marks the current note `auth_failed` and aborts the batch,
/// since every remaining note would fail the same way. A name conflict is
/// retried once under a `-1` suffix (a previous run may have delivered the
/// file before dying).
pub struct UploadWorker;

impl UploadWorker {
    pub async fn run<A: ContentApi>(ctx: &WorkerContext<A>) -> JobOutcome {
        let Some((token, owner, repo)) = ctx.credentials() else {
            log::warn!("upload retry deferred: credentials not configured");
            return JobOutcome::Retry;
        };

        let notes = match ctx.store.pending_notes() {
            Ok(notes) => notes,
            Err(e) => {
                log::error!("failed to read pending notes: {e}");
                return JobOutcome::Retry;
            }
        };

        for note in notes {
            if let Err(e) = ctx.store.set_note_status(note.id, NoteStatus::Uploading) {
                log::error!("failed to mark note {} uploading: {e}", note.id);
                return JobOutcome::Retry;
            }

            let delivered =
                Self::deliver(ctx, token, owner, repo, &note.filename, &note.text).await;

            match delivered {
                Ok(()) => {
                    let now = chrono::Utc::now().timestamp_millis();
                    let preview: String = note.text.chars().take(50).collect();
                    if let Err(e) = ctx
                        .store
                        .insert_submission(now, &preview, true)
                        .and_then(|()| ctx.store.delete_note(note.id))
                    {
                        log::error!("failed to finalize note {}: {e}", note.id);
                        return JobOutcome::Retry;
                    }
                    log::info!("delivered queued note {}", note.id);
                }
                Err(StorageError::AuthRejected) => {
                    let _ = ctx.store.set_note_status(note.id, NoteStatus::AuthFailed);
                    log::warn!("credentials rejected; aborting upload batch");
                    return JobOutcome::Failure;
                }
                Err(e) => {
                    let _ = ctx.store.set_note_status(note.id, NoteStatus::Failed);
                    log::warn!("note {} not delivered: {e}", note.id);
                    return JobOutcome::Retry;
                }
            }
        }

        JobOutcome::Success
    }

    async fn deliver<A: ContentApi>(
        ctx: &WorkerContext<A>,
        token: &str,
        owner: &str,
        repo: &str,
        filename: &str,
        text: &str,
    ) -> Result<(), StorageError> {
        let path = format!("{INBOX_DIR}/{filename}.md");
        let message = format!("Add note {filename}");
        match ctx
            .api
            .create_file(token, owner, repo, &path, &message, text)
            .await
        {
            Err(StorageError::Conflict(_)) => {
                let suffixed = format!("{filename}-1");
                let path = format!("{INBOX_DIR}/{suffixed}.md");
                let message = format!("Add note {suffixed}");
                ctx.api
                    .create_file(token, owner, repo, &path, &message, text)
                    .await
            }
            other => other,
        }
    }
}

/// Pushes queued local-file snapshots to the remote backup folder.
///
/// Backup is best effort: an auth rejection marks the entry and moves on
/// instead of aborting, and a name conflict counts as already backed up.
pub struct BackupSyncWorker;

impl BackupSyncWorker {
    pub async fn run<A: ContentApi>(ctx: &WorkerContext<A>) -> JobOutcome {
        let entries = match ctx.store.pending_sync_entries() {
            Ok(entries) => entries,
            Err(e) => {
                log::error!("failed to read sync queue: {e}");
                return JobOutcome::Retry;
            }
        };

        let mut all_ok = true;
        for entry in entries {
            if let Err(e) = ctx.store.set_sync_status(entry.id, SyncStatus::Syncing) {
                log::error!("failed to mark sync entry {} syncing: {e}", entry.id);
                return JobOutcome::Retry;
            }

            let Some((token, owner, repo)) = ctx.credentials() else {
                let _ = ctx.store.set_sync_status(entry.id, SyncStatus::AuthFailed);
                continue;
            };

            let path = format!("{BACKUP_DIR}/{}", entry.filename);
            let message = format!("Sync {} from local", entry.filename);
            let result = ctx
                .api
                .create_file(token, owner, repo, &path, &message, &entry.content)
                .await;

            let status = match result {
                Ok(()) | Err(StorageError::Conflict(_)) => SyncStatus::Synced,
                Err(StorageError::AuthRejected) => SyncStatus::AuthFailed,
                Err(e) => {
                    log::warn!("backup of {} failed: {e}", entry.filename);
                    all_ok = false;
                    SyncStatus::Failed
                }
            };
            if let Err(e) = ctx.store.set_sync_status(entry.id, status) {
                log::error!("failed to record sync status for {}: {e}", entry.id);
                return JobOutcome::Retry;
            }
        }

        if let Err(e) = ctx.store.delete_synced() {
            log::error!("failed to clean synced entries: {e}");
            return JobOutcome::Retry;
        }

        if all_ok {
            JobOutcome::Success
        } else {
            JobOutcome::Retry
        }
    }
}
