pub mod github;

use std::sync::Arc;

use crate::db::Store;
use crate::error::StorageError;
use crate::worker::{JobKind, JobScheduler};

/// Queues local file snapshots for best-effort remote backup.
///
/// Snapshots are whole-file: each queue entry carries the full content at the
/// moment of the edit, so replaying them in order converges on the latest
/// state even if earlier attempts failed.
pub struct SyncManager {
    store: Arc<Store>,
    scheduler: Arc<JobScheduler>,
}

impl SyncManager {
    pub fn new(store: Arc<Store>, scheduler: Arc<JobScheduler>) -> Self {
        Self { store, scheduler }
    }

    /// Persist a snapshot of `filename` and schedule the backup worker.
    pub fn queue_file_sync(&self, filename: &str, content: &str) -> Result<(), StorageError> {
        let created_at = chrono::Utc::now().timestamp_millis();
        self.store.insert_sync_entry(filename, content, created_at)?;
        self.scheduler.enqueue(JobKind::BackupSync);
        log::debug!("queued backup of {filename}");
        Ok(())
    }
}
