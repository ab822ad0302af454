use quarry_core::RepositoryError;
use quarry_retry::Interrupted;

pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors produced while transferring resources from a remote repository.
///
/// Urls in messages are sanitized; they never carry credentials or query values.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("resource not found: {url}")]
    NotFound { url: String },

    #[error("server returned status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("transport error for {url}: {message}")]
    Connection { url: String, message: String },

    #[error("io error while transferring {url}: {source}")]
    Io {
        url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("transfer of {url} was cancelled")]
    Cancelled { url: String },

    #[error(transparent)]
    Interrupted(#[from] Interrupted),

    #[error("unsupported repository url {url}")]
    UnsupportedUrl { url: String },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl TransportError {
    /// Whether another attempt may succeed.
    ///
    /// Connection problems, I/O errors and 408/429/5xx responses are transient. Missing
    /// resources, authorization failures and cancellation are not.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Connection { .. } | TransportError::Io { .. } => true,
            TransportError::Status { status, .. } => {
                matches!(status, 408 | 429) || (500..=599).contains(status)
            }
            TransportError::NotFound { .. }
            | TransportError::Cancelled { .. }
            | TransportError::Interrupted(_)
            | TransportError::UnsupportedUrl { .. }
            | TransportError::Repository(_) => false,
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, TransportError::NotFound { .. })
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            TransportError::Cancelled { .. } | TransportError::Interrupted(_)
        )
    }
}
