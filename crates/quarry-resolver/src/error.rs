use std::path::PathBuf;

use quarry_config::ConfigError;
use quarry_core::{CoordinateError, RepositoryError, VersionError};
use quarry_local::LocalRepositoryError;
use quarry_transport::TransportError;

pub type Result<T> = std::result::Result<T, ResolutionError>;

/// Coarse classification of a [`ResolutionError`], for callers deciding whether to retry,
/// report, or give up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed coordinates, versions, repository urls or configuration.
    InvalidInput,
    /// Network trouble that outlived the retry policy.
    Transient,
    Cancelled,
    NotFound,
    Fatal,
}

#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error(transparent)]
    InvalidVersion(#[from] VersionError),

    #[error(transparent)]
    InvalidCoordinate(#[from] CoordinateError),

    #[error(transparent)]
    InvalidRepository(#[from] RepositoryError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("could not find artifact {artifact} in {}{}", repositories_display(.repositories), offline_suffix(.offline))]
    ArtifactNotFound {
        artifact: String,
        repositories: Vec<String>,
        offline: bool,
    },

    #[error("no version of {key} matches {constraint:?}")]
    NoMatchingVersion { key: String, constraint: String },

    #[error("failed to transfer {artifact}: {source}")]
    Transfer {
        artifact: String,
        #[source]
        source: TransportError,
    },

    #[error("failed to parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("parent chain of {artifact} loops back through {parent}")]
    ParentCycle { artifact: String, parent: String },

    #[error(transparent)]
    Local(#[from] LocalRepositoryError),

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn repositories_display(repositories: &[String]) -> String {
    if repositories.is_empty() {
        "no repositories".to_string()
    } else {
        repositories.join(", ")
    }
}

fn offline_suffix(offline: &bool) -> &'static str {
    if *offline {
        " (offline)"
    } else {
        ""
    }
}

impl ResolutionError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResolutionError::InvalidVersion(_)
            | ResolutionError::InvalidCoordinate(_)
            | ResolutionError::InvalidRepository(_)
            | ResolutionError::Config(_)
            | ResolutionError::Local(LocalRepositoryError::OutsideRepository { .. }) => {
                ErrorKind::InvalidInput
            }
            ResolutionError::ArtifactNotFound { .. } | ResolutionError::NoMatchingVersion { .. } => {
                ErrorKind::NotFound
            }
            ResolutionError::Transfer { source, .. } => {
                if source.is_cancelled() {
                    ErrorKind::Cancelled
                } else if source.is_not_found() {
                    ErrorKind::NotFound
                } else if source.is_retryable() {
                    ErrorKind::Transient
                } else {
                    ErrorKind::Fatal
                }
            }
            ResolutionError::Parse { .. }
            | ResolutionError::ParentCycle { .. }
            | ResolutionError::Local(_)
            | ResolutionError::Io { .. } => ErrorKind::Fatal,
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::Cancelled
    }
}
