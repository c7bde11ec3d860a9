pub mod files;
pub mod github;
pub mod local;

use crate::error::StorageError;
use crate::org::{Priority, TodoState};
use crate::sync::github::ContentApi;

/// Outcome of a note submission as the caller sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitResult {
    /// Delivered to the backend.
    Sent,
    /// Persisted locally; a background worker will deliver it.
    Queued,
    /// Credentials were rejected; the note was not queued.
    AuthFailed,
}

/// Structured capture metadata attached to a note at submission time.
#[derive(Debug, Clone, Default)]
pub struct NoteMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub state: Option<TodoState>,
    pub priority: Option<Priority>,
    pub tags: Vec<String>,
    pub scheduled: Option<String>,
    pub deadline: Option<String>,
    pub properties: Vec<(String, String)>,
}

/// A browsable entry in either backend's namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    /// Backend-specific identifier usable in subsequent fetches.
    pub path: String,
    pub is_directory: bool,
    pub size: u64,
}

/// The active storage backend. Both variants expose the same operations;
/// callers never branch on which one is live.
pub enum Backend<A: ContentApi> {
    Github(github::GitHubBackend<A>),
    Local(local::LocalOrgBackend),
}

impl<A: ContentApi> Backend<A> {
    pub async fn submit_note(
        &self,
        text: &str,
        metadata: &NoteMetadata,
    ) -> Result<SubmitResult, StorageError> {
        match self {
            Self::Github(b) => b.submit_note(text, metadata).await,
            Self::Local(b) => b.submit_note(text, metadata),
        }
    }

    pub async fn fetch_directory_contents(
        &self,
        path: &str,
    ) -> Result<Vec<FileEntry>, StorageError> {
        match self {
            Self::Github(b) => b.fetch_directory_contents(path).await,
            Self::Local(b) => b.fetch_directory_contents(path),
        }
    }

    pub async fn fetch_file_content(&self, path: &str) -> Result<String, StorageError> {
        match self {
            Self::Github(b) => b.fetch_file_content(path).await,
            Self::Local(b) => b.fetch_file_content(path),
        }
    }

    /// The active capture topic, when the backend carries one.
    pub async fn fetch_current_topic(&self) -> Option<String> {
        match self {
            Self::Github(b) => b.fetch_current_topic().await,
            Self::Local(_) => None,
        }
    }

    pub async fn create_file(
        &self,
        dir: &str,
        name: &str,
        content: &str,
    ) -> Result<String, StorageError> {
        match self {
            Self::Github(b) => b.create_file(dir, name, content).await,
            Self::Local(b) => b.create_file(dir, name, content),
        }
    }

    pub async fn create_folder(&self, dir: &str, name: &str) -> Result<String, StorageError> {
        match self {
            Self::Github(_) => Err(StorageError::Unsupported),
            Self::Local(b) => b.create_folder(dir, name),
        }
    }

    pub async fn update_file(&self, path: &str, content: &str) -> Result<(), StorageError> {
        match self {
            Self::Github(_) => Err(StorageError::Unsupported),
            Self::Local(b) => b.update_file(path, content),
        }
    }
}
