use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use quarry_core::{ArtifactCoordinate, RemoteRepository};

use crate::error::{LocalRepositoryError, Result};
use crate::layout;
use crate::tracking::{FileTrackingFileManager, TrackingFileManager};

/// Outcome of looking an artifact up in the local repository.
///
/// `file` is set whenever the file exists on disk; `available` says whether it may be used
/// for a request against the given repositories.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LocalArtifactResult {
    pub file: Option<PathBuf>,
    pub available: bool,
    /// Id of the repository the file was downloaded from, if tracked.
    pub repository: Option<String>,
}

impl LocalArtifactResult {
    #[must_use]
    pub fn missing() -> Self {
        Self::default()
    }
}

pub trait LocalRepositoryManager: Send + Sync {
    fn basedir(&self) -> &Path;

    /// Fails unless `path` lies below [`LocalRepositoryManager::basedir`] without any `..`
    /// component. Checked before anything is written to `path`.
    fn ensure_contains(&self, path: &Path) -> Result<()> {
        let contained = path.strip_prefix(self.basedir()).is_ok_and(|rest| {
            rest.components()
                .all(|component| matches!(component, Component::Normal(_)))
        });
        if contained {
            Ok(())
        } else {
            Err(LocalRepositoryError::OutsideRepository {
                path: path.to_path_buf(),
            })
        }
    }

    /// Where a locally installed artifact lives.
    fn path_for_local_artifact(&self, artifact: &ArtifactCoordinate) -> PathBuf;

    /// Where an artifact downloaded from `repository` is cached.
    fn path_for_remote_artifact(
        &self,
        artifact: &ArtifactCoordinate,
        repository: &RemoteRepository,
    ) -> PathBuf;

    /// Where metadata downloaded from `repository` is cached.
    fn path_for_remote_metadata(
        &self,
        group_id: &str,
        artifact_id: &str,
        version: Option<&str>,
        repository: &RemoteRepository,
    ) -> PathBuf;

    fn find(
        &self,
        artifact: &ArtifactCoordinate,
        repositories: &[RemoteRepository],
    ) -> Result<LocalArtifactResult>;

    /// Record that the file for `artifact` now exists, downloaded from `repository` or
    /// installed locally when `None`.
    fn add(&self, artifact: &ArtifactCoordinate, repository: Option<&RemoteRepository>)
        -> Result<()>;
}

/// Local repository that remembers where each file was downloaded from.
///
/// Every version directory carries a `_remote.repositories` file with one
/// `<fileName>><repositoryId>` key per origin; an empty repository id marks a locally
/// installed file. A cached file is only handed out for requests that include its origin.
#[derive(Clone)]
pub struct EnhancedLocalRepositoryManager {
    basedir: PathBuf,
    tracking: Arc<dyn TrackingFileManager>,
}

impl std::fmt::Debug for EnhancedLocalRepositoryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnhancedLocalRepositoryManager")
            .field("basedir", &self.basedir)
            .finish_non_exhaustive()
    }
}

impl EnhancedLocalRepositoryManager {
    pub fn new(basedir: impl Into<PathBuf>) -> Self {
        Self::with_tracking(basedir, Arc::new(FileTrackingFileManager::new()))
    }

    pub fn with_tracking(basedir: impl Into<PathBuf>, tracking: Arc<dyn TrackingFileManager>) -> Self {
        Self {
            basedir: basedir.into(),
            tracking,
        }
    }

    #[must_use]
    pub fn tracking(&self) -> &Arc<dyn TrackingFileManager> {
        &self.tracking
    }

    fn tracking_file(&self, artifact: &ArtifactCoordinate) -> PathBuf {
        self.basedir
            .join(layout::version_directory(artifact))
            .join(layout::REMOTE_REPOSITORIES_FILE_NAME)
    }
}

fn origin_key(file_name: &str, repository_id: &str) -> String {
    format!("{file_name}>{repository_id}")
}

fn is_tracked(props: &BTreeMap<String, String>, file_name: &str) -> bool {
    let prefix = format!("{file_name}>");
    props.keys().any(|key| key.starts_with(&prefix))
}

impl LocalRepositoryManager for EnhancedLocalRepositoryManager {
    fn basedir(&self) -> &Path {
        &self.basedir
    }

    fn path_for_local_artifact(&self, artifact: &ArtifactCoordinate) -> PathBuf {
        self.basedir.join(layout::artifact_path(artifact))
    }

    fn path_for_remote_artifact(
        &self,
        artifact: &ArtifactCoordinate,
        _repository: &RemoteRepository,
    ) -> PathBuf {
        self.basedir.join(layout::artifact_path(artifact))
    }

    fn path_for_remote_metadata(
        &self,
        group_id: &str,
        artifact_id: &str,
        version: Option<&str>,
        repository: &RemoteRepository,
    ) -> PathBuf {
        self.basedir.join(layout::local_metadata_path(
            group_id,
            artifact_id,
            version,
            &repository.id,
        ))
    }

    fn find(
        &self,
        artifact: &ArtifactCoordinate,
        repositories: &[RemoteRepository],
    ) -> Result<LocalArtifactResult> {
        let path = self.path_for_local_artifact(artifact);
        if !path.is_file() {
            return Ok(LocalArtifactResult::missing());
        }

        let file_name = layout::artifact_file_name(artifact);
        let mut result = LocalArtifactResult {
            file: Some(path),
            available: false,
            repository: None,
        };

        let props = self
            .tracking
            .read(&self.tracking_file(artifact))?
            .unwrap_or_default();
        if props.contains_key(&origin_key(&file_name, "")) {
            result.available = true;
        } else if let Some(repository) = repositories
            .iter()
            .find(|repo| props.contains_key(&origin_key(&file_name, &repo.id)))
        {
            result.available = true;
            result.repository = Some(repository.id.clone());
        } else if !is_tracked(&props, &file_name) {
            // Copied in by hand or by another tool; nothing says where it came from.
            result.available = true;
        }

        tracing::debug!(
            target = "quarry.local",
            artifact = %artifact,
            available = result.available,
            repository = result.repository.as_deref().unwrap_or(""),
            "found artifact in local repository"
        );
        Ok(result)
    }

    fn add(
        &self,
        artifact: &ArtifactCoordinate,
        repository: Option<&RemoteRepository>,
    ) -> Result<()> {
        let key = origin_key(
            &layout::artifact_file_name(artifact),
            repository.map(|repo| repo.id.as_str()).unwrap_or(""),
        );
        let updates = BTreeMap::from([(key, Some(String::new()))]);
        self.tracking.update(&self.tracking_file(artifact), &updates)?;
        Ok(())
    }
}
