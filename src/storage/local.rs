use std::sync::Arc;

use chrono::Local;

use crate::error::StorageError;
use crate::org::writer::{OrgWriter, TITLE_MAX_LEN};
use crate::org::Headline;
use crate::storage::files::FileManager;
use crate::storage::github::note_filename;
use crate::storage::{FileEntry, NoteMetadata, SubmitResult};
use crate::sync::SyncManager;

const INBOX_PREAMBLE: &str = "#+TITLE: Inbox";

/// Local backend that lands notes as outline entries in a user-granted
/// folder. Writes are synchronous; an optional sync manager queues each
/// written file for best-effort remote backup.
pub struct LocalOrgBackend {
    files: FileManager,
    capture_folder: String,
    inbox_file: String,
    sync: Option<Arc<SyncManager>>,
}

impl LocalOrgBackend {
    pub fn new(
        files: FileManager,
        capture_folder: String,
        inbox_file: String,
        sync: Option<Arc<SyncManager>>,
    ) -> Self {
        Self {
            files,
            capture_folder,
            inbox_file,
            sync,
        }
    }

    /// Write a note into the granted folder.
    ///
    /// A note with an explicit title becomes a new entry appended to the
    /// inbox file. An untitled note becomes its own timestamped file in the
    /// capture folder, with a title derived from the text.
    pub fn submit_note(
        &self,
        text: &str,
        metadata: &NoteMetadata,
    ) -> Result<SubmitResult, StorageError> {
        if !self.files.has_valid_grant() {
            return Err(StorageError::NoFolderSelected);
        }

        match metadata.title.as_deref() {
            Some(title) => self.append_to_inbox(title, text, metadata),
            None => self.write_capture_file(text, metadata),
        }?;

        Ok(SubmitResult::Sent)
    }

    fn append_to_inbox(
        &self,
        title: &str,
        text: &str,
        metadata: &NoteMetadata,
    ) -> Result<(), StorageError> {
        let body = metadata
            .description
            .clone()
            .unwrap_or_else(|| text.to_string());
        let headline = self.build_headline(title, &body, metadata);

        let existing = if self.files.exists(&self.inbox_file) {
            self.files.read_file(&self.inbox_file)?
        } else {
            format!("{INBOX_PREAMBLE}\n\n")
        };

        let updated = OrgWriter::append_entry(&existing, &headline, None);
        self.files.write_file(&self.inbox_file, &updated)?;
        log::info!("appended note to {}", self.inbox_file);

        self.queue_backup(&self.inbox_file, &updated);
        Ok(())
    }

    fn write_capture_file(&self, text: &str, metadata: &NoteMetadata) -> Result<(), StorageError> {
        let (title, body) = derive_parts(text);
        let headline = self.build_headline(&title, &body, metadata);

        let name = format!("{}/{}.org", self.capture_folder, note_filename());
        let content = OrgWriter::write_headline(&headline);
        self.files.write_file(&name, &content)?;
        log::info!("captured note to {name}");

        self.queue_backup(&name, &content);
        Ok(())
    }

    fn build_headline(&self, title: &str, body: &str, metadata: &NoteMetadata) -> Headline {
        let mut headline = Headline::new(title, 1);
        headline.state = metadata.state;
        headline.priority = metadata.priority;
        headline.tags = metadata.tags.clone();
        headline.scheduled = metadata.scheduled.clone();
        headline.deadline = metadata.deadline.clone();
        headline.body = body.trim().to_string();
        for (key, value) in &metadata.properties {
            headline.set_property(key.clone(), value.clone());
        }
        headline.set_property("CREATED", Local::now().to_rfc3339());
        headline
    }

    fn queue_backup(&self, filename: &str, content: &str) {
        if let Some(sync) = &self.sync {
            if let Err(e) = sync.queue_file_sync(filename, content) {
                log::warn!("failed to queue backup of {filename}: {e}");
            }
        }
    }

    pub fn fetch_directory_contents(&self, path: &str) -> Result<Vec<FileEntry>, StorageError> {
        self.files.list_files(path)
    }

    pub fn fetch_file_content(&self, path: &str) -> Result<String, StorageError> {
        self.files.read_file(path)
    }

    pub fn create_file(
        &self,
        dir: &str,
        name: &str,
        content: &str,
    ) -> Result<String, StorageError> {
        let id = self.files.create_file(dir, name, content)?;
        self.queue_backup(id.trim_start_matches("tree:"), content);
        Ok(id)
    }

    pub fn create_folder(&self, dir: &str, name: &str) -> Result<String, StorageError> {
        self.files.create_folder(dir, name)
    }

    pub fn update_file(&self, path: &str, content: &str) -> Result<(), StorageError> {
        self.files.update_file(path, content)?;
        self.queue_backup(path.trim_start_matches("tree:"), content);
        Ok(())
    }
}

/// Split free-form text into a derived title and body. The title is the
/// first sentence of the first line, length-capped; everything after it is
/// body.
fn derive_parts(text: &str) -> (String, String) {
    let first_line_end = text.find('\n').unwrap_or(text.len());
    let first_line = &text[..first_line_end];
    let sentence_end = first_line.find('.').unwrap_or(first_line.len());

    let title: String = first_line[..sentence_end]
        .trim()
        .chars()
        .take(TITLE_MAX_LEN)
        .collect();

    let rest = text[sentence_end..].trim_start_matches('.').trim();
    (title, rest.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Store;
    use crate::org::parser::OrgParser;
    use crate::worker::JobScheduler;

    fn backend(root: &std::path::Path, sync: Option<Arc<SyncManager>>) -> LocalOrgBackend {
        LocalOrgBackend::new(
            FileManager::new(root.to_path_buf()),
            "capture".into(),
            "inbox.org".into(),
            sync,
        )
    }

    #[test]
    fn missing_grant_fails_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let b = backend(&dir.path().join("gone"), None);
        let result = b.submit_note("x", &NoteMetadata::default());
        assert!(matches!(result, Err(StorageError::NoFolderSelected)));
    }

    #[test]
    fn titled_note_appends_to_inbox() {
        let dir = tempfile::tempdir().unwrap();
        let b = backend(dir.path(), None);

        let meta = NoteMetadata {
            title: Some("Call plumber".into()),
            description: Some("about the kitchen sink".into()),
            ..NoteMetadata::default()
        };
        assert_eq!(b.submit_note("ignored", &meta).unwrap(), SubmitResult::Sent);

        let content = b.fetch_file_content("inbox.org").unwrap();
        let doc = OrgParser::parse(&content);
        assert_eq!(doc.preamble, INBOX_PREAMBLE);
        let h = doc.find_headline("Call plumber").unwrap();
        assert_eq!(h.body, "about the kitchen sink");
        assert!(h.property("CREATED").is_some());
    }

    #[test]
    fn second_titled_note_preserves_existing_entries() {
        let dir = tempfile::tempdir().unwrap();
        let b = backend(dir.path(), None);

        let first = NoteMetadata {
            title: Some("First".into()),
            ..NoteMetadata::default()
        };
        let second = NoteMetadata {
            title: Some("Second".into()),
            ..NoteMetadata::default()
        };
        b.submit_note("a", &first).unwrap();
        b.submit_note("b", &second).unwrap();

        let doc = OrgParser::parse(&b.fetch_file_content("inbox.org").unwrap());
        assert!(doc.find_headline("First").is_some());
        assert!(doc.find_headline("Second").is_some());
    }

    #[test]
    fn untitled_note_becomes_capture_file() {
        let dir = tempfile::tempdir().unwrap();
        let b = backend(dir.path(), None);

        b.submit_note(
            "Pick up the dry cleaning. It closes at six today",
            &NoteMetadata::default(),
        )
        .unwrap();

        let entries = b.fetch_directory_contents("capture").unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].name.ends_with(".org"));

        let content = b.fetch_file_content(&entries[0].path).unwrap();
        let doc = OrgParser::parse(&content);
        let h = &doc.headlines[0];
        assert_eq!(h.title, "Pick up the dry cleaning");
        assert_eq!(h.body, "It closes at six today");
    }

    #[test]
    fn derived_title_is_length_capped() {
        let long = "x".repeat(300);
        let (title, _) = derive_parts(&long);
        assert_eq!(title.chars().count(), TITLE_MAX_LEN);
    }

    #[test]
    fn submissions_queue_backup_snapshots_when_sync_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open_in_memory().unwrap());
        let sync = Arc::new(SyncManager::new(store.clone(), Arc::new(JobScheduler::new())));
        let b = backend(dir.path(), Some(sync));

        let meta = NoteMetadata {
            title: Some("Backed up".into()),
            ..NoteMetadata::default()
        };
        b.submit_note("x", &meta).unwrap();

        let entries = store.pending_sync_entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].filename, "inbox.org");
        assert!(entries[0].content.contains("* Backed up"));
    }
}
