use reqwest::StatusCode;
use thiserror::Error;

/// Failure taxonomy for storage and submission operations.
///
/// `NotAuthenticated` and `NoRepoConfigured` are precondition failures and are
/// returned before anything is queued. `AuthRejected` is terminal per item.
/// Everything that maps to `Transient` is eligible for background retry.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("not authenticated")]
    NotAuthenticated,

    #[error("no repository configured")]
    NoRepoConfigured,

    #[error("no folder selected or permission revoked")]
    NoFolderSelected,

    #[error("authentication rejected by remote")]
    AuthRejected,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("naming conflict at {0}")]
    Conflict(String),

    #[error("operation not supported by this backend")]
    Unsupported,

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("transient error: {0}")]
    Transient(String),
}

impl StorageError {
    /// Classify an HTTP error status from the remote content API.
    /// 401/403 are terminal auth failures, 404 surfaces to the caller,
    /// 409/422 are naming conflicts, everything else is retryable.
    pub fn from_status(status: StatusCode, path: &str) -> Self {
        match status.as_u16() {
            401 | 403 => Self::AuthRejected,
            404 => Self::NotFound(path.to_string()),
            409 | 422 => Self::Conflict(path.to_string()),
            _ => Self::Transient(format!("HTTP {status} at {path}")),
        }
    }

    /// Whether a background retry can make progress on this failure.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transient(_) | Self::Io(_) | Self::Database(_)
        )
    }
}

impl From<reqwest::Error> for StorageError {
    fn from(e: reqwest::Error) -> Self {
        // Network errors, timeouts and body failures are all retryable.
        Self::Transient(e.to_string())
    }
}
