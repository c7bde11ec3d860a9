use std::sync::Arc;

use chrono::Local;

use crate::error::StorageError;
use crate::storage::{FileEntry, NoteMetadata, SubmitResult};
use crate::sync::github::{ContentApi, decode_content};

/// Repo-root file naming the currently active capture topic.
const TOPIC_FILE: &str = ".current_topic";

/// Folder inside the repository that receives captured notes.
const INBOX_DIR: &str = "inbox";

/// Timestamp-based filename for a captured note, unique to the second.
pub fn note_filename() -> String {
    Local::now().format("%Y-%m-%dT%H%M%S%z").to_string()
}

/// Remote backend that lands notes as new files in a GitHub repository.
pub struct GitHubBackend<A: ContentApi> {
    api: Arc<A>,
    token: String,
    owner: String,
    repo: String,
}

impl<A: ContentApi> GitHubBackend<A> {
    pub fn new(api: Arc<A>, token: String, owner: String, repo: String) -> Self {
        Self {
            api,
            token,
            owner,
            repo,
        }
    }

    /// Attempt direct delivery of a note. Auth rejections are reported as an
    /// outcome, not an error, since retrying them cannot succeed; transient
    /// failures bubble up so the caller can queue the note instead.
    pub async fn submit_note(
        &self,
        text: &str,
        _metadata: &NoteMetadata,
    ) -> Result<SubmitResult, StorageError> {
        let filename = note_filename();
        let path = format!("{INBOX_DIR}/{filename}.md");
        let message = format!("Add note {filename}");

        match self
            .api
            .create_file(&self.token, &self.owner, &self.repo, &path, &message, text)
            .await
        {
            Ok(()) => {
                log::info!("note delivered to {path}");
                Ok(SubmitResult::Sent)
            }
            Err(StorageError::AuthRejected) => Ok(SubmitResult::AuthFailed),
            Err(e) => Err(e),
        }
    }

    pub async fn fetch_directory_contents(
        &self,
        path: &str,
    ) -> Result<Vec<FileEntry>, StorageError> {
        let entries = self
            .api
            .get_directory_contents(&self.token, &self.owner, &self.repo, path)
            .await?;

        let mut files: Vec<FileEntry> = entries
            .into_iter()
            .map(|e| FileEntry {
                name: e.name,
                path: e.path,
                is_directory: e.entry_type == "dir",
                size: e.size,
            })
            .collect();

        files.sort_by(|a, b| {
            b.is_directory
                .cmp(&a.is_directory)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(files)
    }

    pub async fn fetch_file_content(&self, path: &str) -> Result<String, StorageError> {
        let file = self
            .api
            .get_file_content(&self.token, &self.owner, &self.repo, path)
            .await?;
        decode_content(&file.content)
    }

    /// The active capture topic, read from a well-known repo file. Any
    /// failure (missing file, network, bad encoding) means no topic.
    pub async fn fetch_current_topic(&self) -> Option<String> {
        match self.fetch_file_content(TOPIC_FILE).await {
            Ok(text) => {
                let topic = text.trim().to_string();
                (!topic.is_empty()).then_some(topic)
            }
            Err(_) => None,
        }
    }

    pub async fn create_file(
        &self,
        dir: &str,
        name: &str,
        content: &str,
    ) -> Result<String, StorageError> {
        let path = if dir.is_empty() {
            name.to_string()
        } else {
            format!("{}/{name}", dir.trim_end_matches('/'))
        };
        self.api
            .create_file(
                &self.token,
                &self.owner,
                &self.repo,
                &path,
                &format!("Create {name}"),
                content,
            )
            .await?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::github::fake::FakeApi;

    fn backend(api: Arc<FakeApi>) -> GitHubBackend<FakeApi> {
        GitHubBackend::new(api, "tok".into(), "octocat".into(), "notes".into())
    }

    #[tokio::test]
    async fn submit_lands_note_in_inbox() {
        let api = Arc::new(FakeApi::new());
        let result = backend(api.clone())
            .submit_note("buy milk", &NoteMetadata::default())
            .await
            .unwrap();

        assert_eq!(result, SubmitResult::Sent);
        let paths = api.created_paths();
        assert_eq!(paths.len(), 1);
        assert!(paths[0].starts_with("inbox/"));
        assert!(paths[0].ends_with(".md"));
    }

    #[tokio::test]
    async fn auth_rejection_is_an_outcome_not_an_error() {
        let api = Arc::new(FakeApi::new());
        api.script_create(Err(StorageError::AuthRejected));
        let result = backend(api)
            .submit_note("x", &NoteMetadata::default())
            .await
            .unwrap();
        assert_eq!(result, SubmitResult::AuthFailed);
    }

    #[tokio::test]
    async fn transient_failure_bubbles_up() {
        let api = Arc::new(FakeApi::new());
        api.script_create(Err(StorageError::Transient("503".into())));
        let result = backend(api).submit_note("x", &NoteMetadata::default()).await;
        assert!(matches!(result, Err(StorageError::Transient(_))));
    }

    #[tokio::test]
    async fn missing_topic_file_means_no_topic() {
        let api = Arc::new(FakeApi::new());
        assert_eq!(backend(api).fetch_current_topic().await, None);
    }

    #[tokio::test]
    async fn topic_is_trimmed_and_blank_is_none() {
        let api = Arc::new(FakeApi::new());
        api.files
            .lock()
            .unwrap()
            .insert(".current_topic".into(), "  groceries \n".into());
        assert_eq!(
            backend(api.clone()).fetch_current_topic().await.as_deref(),
            Some("groceries")
        );

        api.files
            .lock()
            .unwrap()
            .insert(".current_topic".into(), "   \n".into());
        assert_eq!(backend(api).fetch_current_topic().await, None);
    }

    #[tokio::test]
    async fn directory_listing_sorts_directories_first() {
        let api = Arc::new(FakeApi::new());
        {
            let mut files = api.files.lock().unwrap();
            files.insert("inbox/b.md".into(), "b".into());
            files.insert("inbox/a.md".into(), "a".into());
        }
        let entries = backend(api).fetch_directory_contents("inbox").await.unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.md", "b.md"]);
    }
}
