use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, LocalRepositoryError>;

/// Errors produced by the local repository and its tracking files.
#[derive(Debug, thiserror::Error)]
pub enum LocalRepositoryError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to read tracking file {path}: {source}")]
    TrackingRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create directory {path} for tracking file: {source}")]
    TrackingDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is outside the local repository", .path.display())]
    OutsideRepository { path: PathBuf },

    #[error("failed to lock tracking file {path}: {source}")]
    TrackingLock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to delete corrupted artifact {path}: {source}")]
    CorruptedArtifactRemoval {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
