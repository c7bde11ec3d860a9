use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

const API_BASE: &str = "https://api.github.com";
const USER_AGENT: &str = concat!("jot/", env!("CARGO_PKG_VERSION"));

/// Remote content API the backends and workers talk to. The token is passed
/// per call so a single client serves any account.
pub trait ContentApi: Send + Sync {
    fn get_user(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<GitHubUser, StorageError>> + Send;

    fn get_repository(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
    ) -> impl std::future::Future<Output = Result<GitHubRepository, StorageError>> + Send;

    fn get_file_content(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        path: &str,
    ) -> impl std::future::Future<Output = Result<GitHubFileContent, StorageError>> + Send;

    fn get_directory_contents(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        path: &str,
    ) -> impl std::future::Future<Output = Result<Vec<GitHubDirectoryEntry>, StorageError>> + Send;

    /// Create a new file. Fails with `Conflict` when the path already exists.
    fn create_file(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        path: &str,
        message: &str,
        text: &str,
    ) -> impl std::future::Future<Output = Result<(), StorageError>> + Send;
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubUser {
    pub login: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubRepository {
    pub name: String,
    pub full_name: String,
    pub private: bool,
    pub default_branch: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubFileContent {
    pub name: String,
    pub path: String,
    pub sha: String,
    /// Base64 with embedded newlines, as the API returns it.
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubDirectoryEntry {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub entry_type: String,
    pub size: u64,
}

#[derive(Serialize)]
struct CreateFileRequest<'a> {
    message: &'a str,
    content: String,
}

/// Decode file content as the API delivers it: base64 broken into lines.
pub fn decode_content(encoded: &str) -> Result<String, StorageError> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = BASE64
        .decode(compact.as_bytes())
        .map_err(|e| StorageError::Transient(format!("invalid base64 content: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|e| StorageError::Transient(format!("file content is not UTF-8: {e}")))
}

/// Thin `reqwest` client for the GitHub contents API.
pub struct GitHubClient {
    http: reqwest::Client,
    base_url: String,
}

impl GitHubClient {
    pub fn new() -> Self {
        Self::with_base_url(API_BASE)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn request(&self, method: reqwest::Method, token: &str, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .header("Authorization", format!("Bearer {token}"))
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", USER_AGENT)
    }

    async fn check(
        response: reqwest::Response,
        path: &str,
    ) -> Result<reqwest::Response, StorageError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(StorageError::from_status(response.status(), path))
        }
    }
}

impl Default for GitHubClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentApi for GitHubClient {
    async fn get_user(&self, token: &str) -> Result<GitHubUser, StorageError> {
        let response = self.request(reqwest::Method::GET, token, "/user").send().await?;
        Ok(Self::check(response, "/user").await?.json().await?)
    }

    async fn get_repository(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
    ) -> Result<GitHubRepository, StorageError> {
        let path = format!("/repos/{owner}/{repo}");
        let response = self.request(reqwest::Method::GET, token, &path).send().await?;
        Ok(Self::check(response, &path).await?.json().await?)
    }

    async fn get_file_content(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        path: &str,
    ) -> Result<GitHubFileContent, StorageError> {
        let url = format!("/repos/{owner}/{repo}/contents/{path}");
        let response = self.request(reqwest::Method::GET, token, &url).send().await?;
        Ok(Self::check(response, path).await?.json().await?)
    }

    async fn get_directory_contents(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        path: &str,
    ) -> Result<Vec<GitHubDirectoryEntry>, StorageError> {
        // An empty path lists the repository root.
        let url = if path.is_empty() {
            format!("/repos/{owner}/{repo}/contents/")
        } else {
            format!("/repos/{owner}/{repo}/contents/{path}")
        };
        let response = self.request(reqwest::Method::GET, token, &url).send().await?;
        Ok(Self::check(response, path).await?.json().await?)
    }

    async fn create_file(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        path: &str,
        message: &str,
        text: &str,
    ) -> Result<(), StorageError> {
        let url = format!("/repos/{owner}/{repo}/contents/{path}");
        let body = CreateFileRequest {
            message,
            content: BASE64.encode(text.as_bytes()),
        };
        let response = self
            .request(reqwest::Method::PUT, token, &url)
            .json(&body)
            .send()
            .await?;
        Self::check(response, path).await?;
        log::debug!("created {path} in {owner}/{repo}");
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_strips_embedded_newlines() {
        // "hello world" encoded, split across lines as the API does.
        let encoded = "aGVsbG8g\nd29ybGQ=\n";
        assert_eq!(decode_content(encoded).unwrap(), "hello world");
    }

    #[test]
    fn decode_rejects_bad_base64() {
        assert!(matches!(
            decode_content("!!!not base64!!!"),
            Err(StorageError::Transient(_))
        ));
    }

    #[tokio::test]
    fn fake_create_then_conflict_on_same_path() {
        let api = fake::FakeApi::new();
        api.create_file("t", "o", "r", "inbox/a.md", "m", "body")
            .await
            .unwrap();
        let second = api.create_file("t", "o", "r", "inbox/a.md", "m", "body").await;
        assert!(matches!(second, Err(StorageError::Conflict(_))));
    }

    #[tokio::test]
    fn fake_round_trips_content() {
        let api = fake::FakeApi::new();
        api.create_file("t", "o", "r", "inbox/a.md", "m", "note text")
            .await
            .unwrap();
        let file = api.get_file_content("t", "o", "r", "inbox/a.md").await.unwrap();
        assert_eq!(decode_content(&file.content).unwrap(), "note text");
    }
}
