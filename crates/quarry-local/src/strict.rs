use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use quarry_core::{ArtifactCoordinate, RemoteRepository};
use zip::ZipArchive;

use crate::error::{LocalRepositoryError, Result};
use crate::manager::{LocalArtifactResult, LocalRepositoryManager};

/// Decorator that refuses to hand out broken archives from the local repository.
///
/// With strict validation on, every available `.jar`/`.zip` hit is opened as a zip archive.
/// Archives that can't be opened or have no entries are deleted and reported as missing so
/// the resolver downloads them again. Everything else is forwarded untouched.
#[derive(Debug, Clone)]
pub struct StrictLocalRepositoryManager<M> {
    delegate: M,
    strict: bool,
}

impl<M: LocalRepositoryManager> StrictLocalRepositoryManager<M> {
    pub fn new(delegate: M, strict: bool) -> Self {
        Self { delegate, strict }
    }

    #[must_use]
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    #[must_use]
    pub fn delegate(&self) -> &M {
        &self.delegate
    }
}

fn is_archive(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jar") || ext.eq_ignore_ascii_case("zip"))
}

/// Number of entries in the archive, or the reason it couldn't be read.
fn archive_entry_count(path: &Path) -> std::result::Result<usize, String> {
    let file = File::open(path).map_err(|err| err.to_string())?;
    let archive = ZipArchive::new(file).map_err(|err| err.to_string())?;
    Ok(archive.len())
}

fn remove_corrupted(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(LocalRepositoryError::CorruptedArtifactRemoval {
            path: path.to_path_buf(),
            source,
        }),
    }
}

impl<M: LocalRepositoryManager> LocalRepositoryManager for StrictLocalRepositoryManager<M> {
    fn basedir(&self) -> &Path {
        self.delegate.basedir()
    }

    fn path_for_local_artifact(&self, artifact: &ArtifactCoordinate) -> PathBuf {
        self.delegate.path_for_local_artifact(artifact)
    }

    fn path_for_remote_artifact(
        &self,
        artifact: &ArtifactCoordinate,
        repository: &RemoteRepository,
    ) -> PathBuf {
        self.delegate.path_for_remote_artifact(artifact, repository)
    }

    fn path_for_remote_metadata(
        &self,
        group_id: &str,
        artifact_id: &str,
        version: Option<&str>,
        repository: &RemoteRepository,
    ) -> PathBuf {
        self.delegate
            .path_for_remote_metadata(group_id, artifact_id, version, repository)
    }

    fn find(
        &self,
        artifact: &ArtifactCoordinate,
        repositories: &[RemoteRepository],
    ) -> Result<LocalArtifactResult> {
        let result = self.delegate.find(artifact, repositories)?;
        if !self.strict || !result.available {
            return Ok(result);
        }
        let Some(path) = result.file.clone().filter(|path| is_archive(path)) else {
            return Ok(result);
        };

        let problem = match archive_entry_count(&path) {
            Ok(0) => "archive has no entries".to_string(),
            Ok(_) => return Ok(result),
            Err(err) => err,
        };

        tracing::warn!(
            target = "quarry.local",
            artifact = %artifact,
            path = %path.display(),
            problem = %problem,
            "deleting corrupted artifact from local repository"
        );
        remove_corrupted(&path)?;
        Ok(LocalArtifactResult::missing())
    }

    fn add(
        &self,
        artifact: &ArtifactCoordinate,
        repository: Option<&RemoteRepository>,
    ) -> Result<()> {
        self.delegate.add(artifact, repository)
    }
}
