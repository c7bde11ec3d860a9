use std::sync::Arc;

use crate::auth::AuthManager;
use crate::config::{Settings, StorageMode};
use crate::db::{Store, Submission};
use crate::error::StorageError;
use crate::storage::files::FileManager;
use crate::storage::github::{GitHubBackend, note_filename};
use crate::storage::local::LocalOrgBackend;
use crate::storage::{Backend, FileEntry, NoteMetadata, SubmitResult};
use crate::sync::github::ContentApi;
use crate::sync::SyncManager;
use crate::worker::{JobKind, JobScheduler};

/// Coordinates submissions between the active backend, the durable queue
/// and the background workers.
///
/// For the remote backend the contract is queue-first: once preconditions
/// pass, the note is persisted before any network attempt, so a crash or
/// dropped connection can delay delivery but never lose the note.
pub struct NoteRepository<A: ContentApi> {
    store: Arc<Store>,
    scheduler: Arc<JobScheduler>,
    settings: Settings,
    auth: AuthManager,
    api: Arc<A>,
}

impl<A: ContentApi> NoteRepository<A> {
    pub fn new(
        store: Arc<Store>,
        scheduler: Arc<JobScheduler>,
        settings: Settings,
        auth: AuthManager,
        api: Arc<A>,
    ) -> Self {
        Self {
            store,
            scheduler,
            settings,
            auth,
            api,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Validate the stored token against the remote and confirm the
    /// configured repository is reachable. Records the authenticated login
    /// in the settings and returns it. Called after sign-in and from the
    /// settings screen's connection check.
    pub async fn verify_connection(&mut self) -> Result<String, StorageError> {
        let token = self
            .auth
            .access_token()
            .await
            .ok_or(StorageError::NotAuthenticated)?;
        let (owner, repo) = self.settings.repo().ok_or(StorageError::NoRepoConfigured)?;
        let (owner, repo) = (owner.to_string(), repo.to_string());

        let user = self.api.get_user(&token).await?;
        let repository = self.api.get_repository(&token, &owner, &repo).await?;
        log::info!(
            "connected as {} to {}",
            user.login,
            repository.full_name
        );

        self.settings.username = Some(user.login.clone());
        Ok(user.login)
    }

    /// Submit a note to the active backend.
    ///
    /// Precondition failures (signed out, no repository or folder
    /// configured) are returned immediately and nothing is queued. After
    /// that, a remote note always reaches durable storage: direct delivery
    /// reports `Sent`, a rejected token reports `AuthFailed`, and anything
    /// transient reports `Queued` with a retry job scheduled.
    pub async fn submit_note(
        &self,
        text: &str,
        metadata: &NoteMetadata,
    ) -> Result<SubmitResult, StorageError> {
        match self.settings.storage_mode {
            StorageMode::Github => self.submit_remote(text, metadata).await,
            StorageMode::LocalOrg => self.submit_local(text, metadata),
        }
    }

    async fn submit_remote(
        &self,
        text: &str,
        metadata: &NoteMetadata,
    ) -> Result<SubmitResult, StorageError> {
        let token = self
            .auth
            .access_token()
            .await
            .ok_or(StorageError::NotAuthenticated)?;
        let (owner, repo) = self.settings.repo().ok_or(StorageError::NoRepoConfigured)?;
        let (owner, repo) = (owner.to_string(), repo.to_string());

        // Queue-first: the note is durable before the network is touched.
        let now = chrono::Utc::now().timestamp_millis();
        let note_id = self.store.insert_pending_note(text, &note_filename(), now)?;

        let backend = GitHubBackend::new(self.api.clone(), token, owner, repo);
        match backend.submit_note(text, metadata).await {
            Ok(SubmitResult::Sent) => {
                let preview: String = text.chars().take(50).collect();
                self.store.insert_submission(now, &preview, true)?;
                self.store.delete_note(note_id)?;
                Ok(SubmitResult::Sent)
            }
            Ok(SubmitResult::AuthFailed) => {
                // Retrying a rejected token cannot succeed; drop the row.
                self.store.delete_note(note_id)?;
                Ok(SubmitResult::AuthFailed)
            }
            Ok(SubmitResult::Queued) => {
                self.scheduler.enqueue(JobKind::UploadRetry);
                Ok(SubmitResult::Queued)
            }
            Err(e) => {
                log::info!("direct delivery failed, note queued: {e}");
                self.scheduler.enqueue(JobKind::UploadRetry);
                Ok(SubmitResult::Queued)
            }
        }
    }

    fn submit_local(
        &self,
        text: &str,
        metadata: &NoteMetadata,
    ) -> Result<SubmitResult, StorageError> {
        let backend = self.local_backend()?;
        let result = backend.submit_note(text, metadata)?;
        if result == SubmitResult::Sent {
            let now = chrono::Utc::now().timestamp_millis();
            let preview: String = text.chars().take(50).collect();
            self.store.insert_submission(now, &preview, true)?;
        }
        Ok(result)
    }

    fn local_backend(&self) -> Result<LocalOrgBackend, StorageError> {
        let root = self
            .settings
            .local_folder
            .clone()
            .ok_or(StorageError::NoFolderSelected)?;
        let sync = self.settings.sync_to_github.then(|| {
            Arc::new(SyncManager::new(self.store.clone(), self.scheduler.clone()))
        });
        Ok(LocalOrgBackend::new(
            FileManager::new(root),
            self.settings.capture_folder.clone(),
            self.settings.inbox_file.clone(),
            sync,
        ))
    }

    async fn active_backend(&self) -> Result<Backend<A>, StorageError> {
        match self.settings.storage_mode {
            StorageMode::Github => {
                let token = self
                    .auth
                    .access_token()
                    .await
                    .ok_or(StorageError::NotAuthenticated)?;
                let (owner, repo) =
                    self.settings.repo().ok_or(StorageError::NoRepoConfigured)?;
                Ok(Backend::Github(GitHubBackend::new(
                    self.api.clone(),
                    token,
                    owner.to_string(),
                    repo.to_string(),
                )))
            }
            StorageMode::LocalOrg => Ok(Backend::Local(self.local_backend()?)),
        }
    }

    pub async fn fetch_directory_contents(
        &self,
        path: &str,
    ) -> Result<Vec<FileEntry>, StorageError> {
        self.active_backend().await?.fetch_directory_contents(path).await
    }

    pub async fn fetch_file_content(&self, path: &str) -> Result<String, StorageError> {
        self.active_backend().await?.fetch_file_content(path).await
    }

    pub async fn fetch_current_topic(&self) -> Option<String> {
        match self.active_backend().await {
            Ok(backend) => backend.fetch_current_topic().await,
            Err(_) => None,
        }
    }

    pub fn recent_submissions(&self) -> Result<Vec<Submission>, StorageError> {
        self.store.recent_submissions()
    }

    pub fn pending_note_count(&self) -> Result<i64, StorageError> {
        self.store.pending_note_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::github::fake::FakeApi;

    fn github_settings() -> Settings {
        let mut settings = Settings::default();
        settings.repo_owner = Some("octocat".into());
        settings.repo_name = Some("notes".into());
        settings
    }

    fn repository(
        api: Arc<FakeApi>,
        settings: Settings,
        token: Option<&str>,
    ) -> NoteRepository<FakeApi> {
        NoteRepository::new(
            Arc::new(Store::open_in_memory().unwrap()),
            Arc::new(JobScheduler::new()),
            settings,
            AuthManager::with_fixed_token(token.map(str::to_string)),
            api,
        )
    }

    #[tokio::test]
    async fn direct_delivery_reports_sent_and_leaves_no_queue() {
        let api = Arc::new(FakeApi::new());
        let repo = repository(api.clone(), github_settings(), Some("tok"));

        let result = repo
            .submit_note("buy milk", &NoteMetadata::default())
            .await
            .unwrap();

        assert_eq!(result, SubmitResult::Sent);
        assert_eq!(repo.pending_note_count().unwrap(), 0);
        assert_eq!(repo.recent_submissions().unwrap().len(), 1);
        assert_eq!(api.created_paths().len(), 1);
    }

    #[tokio::test]
    async fn transient_failure_queues_the_note() {
        let api = Arc::new(FakeApi::new());
        api.script_create(Err(StorageError::Transient("offline".into())));
        let repo = repository(api, github_settings(), Some("tok"));

        let result = repo.submit_note("x", &NoteMetadata::default()).await.unwrap();

        assert_eq!(result, SubmitResult::Queued);
        assert_eq!(repo.pending_note_count().unwrap(), 1);
        assert_eq!(repo.scheduler.pending_jobs(), vec![JobKind::UploadRetry]);
        // Nothing in the audit log until the note actually lands.
        assert!(repo.recent_submissions().unwrap().is_empty());
    }

    #[tokio::test]
    async fn signed_out_fails_before_queuing() {
        let api = Arc::new(FakeApi::new());
        let repo = repository(api, github_settings(), None);

        let result = repo.submit_note("x", &NoteMetadata::default()).await;
        assert!(matches!(result, Err(StorageError::NotAuthenticated)));
        assert_eq!(repo.pending_note_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn missing_repo_fails_before_queuing() {
        let api = Arc::new(FakeApi::new());
        let repo = repository(api, Settings::default(), Some("tok"));

        let result = repo.submit_note("x", &NoteMetadata::default()).await;
        assert!(matches!(result, Err(StorageError::NoRepoConfigured)));
        assert_eq!(repo.pending_note_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn rejected_token_is_not_queued_for_retry() {
        let api = Arc::new(FakeApi::new());
        api.script_create(Err(StorageError::AuthRejected));
        let repo = repository(api, github_settings(), Some("bad"));

        let result = repo.submit_note("x", &NoteMetadata::default()).await.unwrap();
        assert_eq!(result, SubmitResult::AuthFailed);
        assert_eq!(repo.pending_note_count().unwrap(), 0);
        assert!(repo.scheduler.pending_jobs().is_empty());
    }

    #[tokio::test]
    async fn local_mode_writes_and_records_audit() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.storage_mode = StorageMode::LocalOrg;
        settings.local_folder = Some(dir.path().to_path_buf());

        let repo = repository(Arc::new(FakeApi::new()), settings, None);
        let meta = NoteMetadata {
            title: Some("Water plants".into()),
            ..NoteMetadata::default()
        };

        let result = repo.submit_note("water the plants", &meta).await.unwrap();
        assert_eq!(result, SubmitResult::Sent);
        assert_eq!(repo.recent_submissions().unwrap().len(), 1);

        let content = repo.fetch_file_content("inbox.org").await.unwrap();
        assert!(content.contains("* Water plants"));
    }

    #[tokio::test]
    async fn local_mode_without_folder_is_a_precondition_failure() {
        let mut settings = Settings::default();
        settings.storage_mode = StorageMode::LocalOrg;

        let repo = repository(Arc::new(FakeApi::new()), settings, None);
        let result = repo.submit_note("x", &NoteMetadata::default()).await;
        assert!(matches!(result, Err(StorageError::NoFolderSelected)));
    }

    #[tokio::test]
    async fn verify_connection_records_the_login() {
        let api = Arc::new(FakeApi::new());
        let mut repo = repository(api, github_settings(), Some("tok"));
        assert_eq!(repo.settings().username, None);

        let login = repo.verify_connection().await.unwrap();
        assert_eq!(login, "octocat");
        assert_eq!(repo.settings().username.as_deref(), Some("octocat"));
    }

    #[tokio::test]
    async fn verify_connection_requires_token_and_repo() {
        let api = Arc::new(FakeApi::new());
        let mut signed_out = repository(api.clone(), github_settings(), None);
        assert!(matches!(
            signed_out.verify_connection().await,
            Err(StorageError::NotAuthenticated)
        ));

        let mut unconfigured = repository(api, Settings::default(), Some("tok"));
        assert!(matches!(
            unconfigured.verify_connection().await,
            Err(StorageError::NoRepoConfigured)
        ));
    }

    #[tokio::test]
    async fn queued_note_is_delivered_by_the_worker() {
        let api = Arc::new(FakeApi::new());
        api.script_create(Err(StorageError::Transient("offline".into())));
        let repo = repository(api.clone(), github_settings(), Some("tok"));

        repo.submit_note("resilient", &NoteMetadata::default()).await.unwrap();
        assert_eq!(repo.pending_note_count().unwrap(), 1);

        let ctx = crate::worker::WorkerContext {
            store: repo.store.clone(),
            api,
            token: Some("tok".into()),
            owner: Some("octocat".into()),
            repo: Some("notes".into()),
        };
        repo.scheduler.run_pending(&ctx).await;

        assert_eq!(repo.pending_note_count().unwrap(), 0);
        assert_eq!(repo.recent_submissions().unwrap().len(), 1);
    }
}
