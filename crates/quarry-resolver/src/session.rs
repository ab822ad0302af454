//! One resolution call's view of the local repository and the remote repositories.
//!
//! Transporters and the raw POM cache live for a single call; nothing is shared between
//! calls except what the local repository holds on disk.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use quarry_core::{ArtifactCoordinate, ArtifactKind, RemoteRepository, Version, VersionConstraint};
use quarry_local::{layout, LocalRepositoryManager, UpdateCheckManager};
use quarry_retry::Retry;
use quarry_transport::{sanitize_url, TransferListener, TransportError, Transporter};

use crate::error::{ResolutionError, Result};
use crate::metadata::Metadata;
use crate::model::{EffectiveModel, ModelBuilder, PomSource};
use crate::pom::{parse_pom, RawPom};
use crate::profile::{ActivationContext, ProfileActivator};
use crate::ResolvedArtifact;

/// Repository id used for metadata of locally installed artifacts.
const LOCAL_METADATA_ID: &str = "local";

pub(crate) struct RepositorySession<'a> {
    local: &'a dyn LocalRepositoryManager,
    repositories: &'a [RemoteRepository],
    /// One per repository, in the same order. Empty when offline.
    transporters: Vec<Box<dyn Transporter>>,
    retry: &'a Retry,
    listener: &'a dyn TransferListener,
    update_checks: &'a UpdateCheckManager,
    offline: bool,
    activator: &'a dyn ProfileActivator,
    activation: &'a ActivationContext,
    poms: RefCell<HashMap<String, RawPom>>,
}

impl<'a> RepositorySession<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        local: &'a dyn LocalRepositoryManager,
        repositories: &'a [RemoteRepository],
        transporters: Vec<Box<dyn Transporter>>,
        retry: &'a Retry,
        listener: &'a dyn TransferListener,
        update_checks: &'a UpdateCheckManager,
        offline: bool,
        activator: &'a dyn ProfileActivator,
        activation: &'a ActivationContext,
    ) -> Self {
        Self {
            local,
            repositories,
            transporters,
            retry,
            listener,
            update_checks,
            offline,
            activator,
            activation,
            poms: RefCell::new(HashMap::new()),
        }
    }

    fn not_found(&self, artifact: &ArtifactCoordinate) -> ResolutionError {
        ResolutionError::ArtifactNotFound {
            artifact: artifact.to_string(),
            repositories: self.repositories.iter().map(|r| r.id.clone()).collect(),
            offline: self.offline,
        }
    }

    fn download(
        &self,
        transporter: &dyn Transporter,
        resource: &str,
        dest: &Path,
    ) -> std::result::Result<(), TransportError> {
        self.retry.retry_when(
            &format!("download {resource} from {}", transporter.repository().id),
            || transporter.get(resource, dest, self.listener),
            TransportError::is_retryable,
        )
    }

    /// Find `artifact` in the local repository or download it.
    ///
    /// Repositories are tried in order; a 404 moves on to the next one. A cancelled transfer
    /// stops immediately. Other failures are remembered and reported if no repository has
    /// the file.
    pub(crate) fn resolve_artifact(&self, artifact: &ArtifactCoordinate) -> Result<ResolvedArtifact> {
        let local = self.local.find(artifact, self.repositories)?;
        if local.available {
            if let Some(file) = local.file {
                return Ok(ResolvedArtifact {
                    artifact: artifact.clone(),
                    file,
                    repository: local.repository,
                });
            }
        }
        if self.offline {
            return Err(self.not_found(artifact));
        }

        let mut last_error = None;
        for transporter in &self.transporters {
            let repository = transporter.repository();
            let dest = self.local.path_for_remote_artifact(artifact, repository);
            self.local.ensure_contains(&dest)?;
            let resource = self.remote_resource(transporter.as_ref(), artifact)?;

            match self.download(transporter.as_ref(), &resource, &dest) {
                Ok(()) => {
                    self.local.add(artifact, Some(repository))?;
                    self.update_checks.clear(&dest);
                    tracing::debug!(
                        target = "quarry.resolver",
                        artifact = %artifact,
                        repository = %repository.id,
                        path = %dest.display(),
                        "downloaded artifact"
                    );
                    return Ok(ResolvedArtifact {
                        artifact: artifact.clone(),
                        file: dest,
                        repository: Some(repository.id.clone()),
                    });
                }
                Err(err) => {
                    self.record_failure(repository, &resource, &dest, &err);
                    if err.is_cancelled() {
                        return Err(ResolutionError::Transfer {
                            artifact: artifact.to_string(),
                            source: err,
                        });
                    }
                    if err.is_not_found() {
                        tracing::debug!(
                            target = "quarry.resolver",
                            artifact = %artifact,
                            repository = %repository.id,
                            "artifact not found in repository"
                        );
                        continue;
                    }
                    tracing::warn!(
                        target = "quarry.resolver",
                        artifact = %artifact,
                        repository = %repository.id,
                        error = %err,
                        "failed to download artifact"
                    );
                    last_error = Some(err);
                }
            }
        }

        match last_error {
            Some(source) => Err(ResolutionError::Transfer {
                artifact: artifact.to_string(),
                source,
            }),
            None => Err(self.not_found(artifact)),
        }
    }

    fn record_failure(
        &self,
        repository: &RemoteRepository,
        resource: &str,
        dest: &Path,
        err: &TransportError,
    ) {
        let url = repository
            .resource_url(resource)
            .map(|url| sanitize_url(url.as_str()))
            .unwrap_or_else(|_| resource.to_string());
        let message = (!err.is_not_found()).then(|| err.to_string());
        if let Err(record_err) = self
            .update_checks
            .record_failure(dest, &url, message.as_deref())
        {
            tracing::debug!(
                target = "quarry.resolver",
                path = %dest.display(),
                error = %record_err,
                "failed to record download failure"
            );
        }
    }

    /// Layout path of `artifact` in the transporter's repository.
    ///
    /// Snapshots are published under timestamped names listed in the version directory's
    /// metadata; without usable metadata the plain `-SNAPSHOT` name is requested.
    fn remote_resource(
        &self,
        transporter: &dyn Transporter,
        artifact: &ArtifactCoordinate,
    ) -> Result<String> {
        let plain = layout::artifact_path(artifact);
        if !artifact.version.ends_with("-SNAPSHOT") {
            return Ok(plain);
        }

        let repository = transporter.repository();
        let base_version = artifact.base_version();
        let resource =
            layout::remote_metadata_path(&artifact.group_id, &artifact.artifact_id, Some(&base_version));
        let dest = self.local.path_for_remote_metadata(
            &artifact.group_id,
            &artifact.artifact_id,
            Some(&base_version),
            repository,
        );
        self.local.ensure_contains(&dest)?;
        match self.download(transporter, &resource, &dest) {
            Ok(()) => {}
            Err(err) if err.is_cancelled() => {
                return Err(ResolutionError::Transfer {
                    artifact: artifact.to_string(),
                    source: err,
                })
            }
            Err(err) => {
                tracing::debug!(
                    target = "quarry.resolver",
                    artifact = %artifact,
                    repository = %repository.id,
                    error = %err,
                    "no snapshot metadata, requesting plain snapshot name"
                );
                return Ok(plain);
            }
        }

        let timestamped = read_metadata(&dest).and_then(|metadata| {
            metadata.snapshot_version(&base_version, &artifact.classifier, &artifact.extension)
        });
        match timestamped {
            Some(version) => {
                ArtifactCoordinate::validate_version(&version)?;
                Ok(layout::artifact_path(&artifact.with_version(version)))
            }
            None => Ok(plain),
        }
    }

    /// Versions of `group_id:artifact_id` known to the local repository and every remote
    /// repository, filtered by `constraint`, ascending.
    pub(crate) fn available_versions(
        &self,
        group_id: &str,
        artifact_id: &str,
        constraint: &VersionConstraint,
    ) -> Result<Vec<Version>> {
        ArtifactCoordinate::validate_key(group_id, artifact_id)?;
        let mut versions = BTreeSet::new();
        let installed = self.local.basedir().join(layout::local_metadata_path(
            group_id,
            artifact_id,
            None,
            LOCAL_METADATA_ID,
        ));
        collect_versions(&installed, &mut versions);

        let resource = layout::remote_metadata_path(group_id, artifact_id, None);
        for (idx, repository) in self.repositories.iter().enumerate() {
            let dest = self
                .local
                .path_for_remote_metadata(group_id, artifact_id, None, repository);
            self.local.ensure_contains(&dest)?;
            if let Some(transporter) = self.transporters.get(idx) {
                match self.download(transporter.as_ref(), &resource, &dest) {
                    Ok(()) => {}
                    Err(err) if err.is_cancelled() => {
                        return Err(ResolutionError::Transfer {
                            artifact: format!("{group_id}:{artifact_id}"),
                            source: err,
                        })
                    }
                    Err(err) if err.is_not_found() => continue,
                    Err(err) => tracing::warn!(
                        target = "quarry.resolver",
                        repository = %repository.id,
                        error = %err,
                        "failed to refresh metadata, using cached copy"
                    ),
                }
            }
            collect_versions(&dest, &mut versions);
        }

        Ok(versions
            .into_iter()
            .filter(|version| constraint.contains(version))
            .collect())
    }

    /// Pick the version a constraint resolves to: exact versions as written, otherwise the
    /// highest available match.
    pub(crate) fn resolve_version(
        &self,
        group_id: &str,
        artifact_id: &str,
        constraint: &VersionConstraint,
    ) -> Result<String> {
        if let VersionConstraint::Exact(version) = constraint {
            return Ok(version.as_str().to_string());
        }
        self.available_versions(group_id, artifact_id, constraint)?
            .pop()
            .map(|version| version.as_str().to_string())
            .ok_or_else(|| ResolutionError::NoMatchingVersion {
                key: format!("{group_id}:{artifact_id}"),
                constraint: constraint.to_string(),
            })
    }

    pub(crate) fn model(&self, group_id: &str, artifact_id: &str, version: &str) -> Result<EffectiveModel> {
        ModelBuilder::new(self, self.activator, self.activation).build(group_id, artifact_id, version)
    }

    /// A `system`-scoped dependency points at a file outside any repository.
    pub(crate) fn resolve_system(
        &self,
        artifact: &ArtifactCoordinate,
        path: &Path,
    ) -> Result<ResolvedArtifact> {
        if path.is_file() {
            Ok(ResolvedArtifact {
                artifact: artifact.clone(),
                file: path.to_path_buf(),
                repository: None,
            })
        } else {
            Err(ResolutionError::ArtifactNotFound {
                artifact: artifact.to_string(),
                repositories: vec![path.display().to_string()],
                offline: self.offline,
            })
        }
    }
}

impl PomSource for RepositorySession<'_> {
    fn load_pom(&self, group_id: &str, artifact_id: &str, version: &str) -> Result<RawPom> {
        let key = format!("{group_id}:{artifact_id}:{version}");
        if let Some(pom) = self.poms.borrow().get(&key) {
            return Ok(pom.clone());
        }

        let pom = ArtifactKind::Pom;
        let artifact = ArtifactCoordinate::try_new(
            group_id,
            artifact_id,
            pom.classifier(),
            pom.extension(),
            version,
        )?;
        let resolved = self.resolve_artifact(&artifact)?;
        let text = std::fs::read_to_string(&resolved.file).map_err(|source| ResolutionError::Io {
            path: resolved.file.clone(),
            source,
        })?;
        let pom = parse_pom(&text).map_err(|err| ResolutionError::Parse {
            path: resolved.file.clone(),
            message: err.to_string(),
        })?;
        self.poms.borrow_mut().insert(key, pom.clone());
        Ok(pom)
    }
}

fn read_metadata(path: &Path) -> Option<Metadata> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
        Err(err) => {
            tracing::debug!(
                target = "quarry.resolver",
                path = %path.display(),
                error = %err,
                "failed to read metadata"
            );
            return None;
        }
    };
    match Metadata::parse(&text) {
        Ok(metadata) => Some(metadata),
        Err(err) => {
            tracing::warn!(
                target = "quarry.resolver",
                path = %path.display(),
                error = %err,
                "ignoring malformed metadata"
            );
            None
        }
    }
}

/// Adds the versions listed in the metadata at `path`, skipping any that can't name a
/// version directory.
fn collect_versions(path: &Path, out: &mut BTreeSet<Version>) {
    let Some(metadata) = read_metadata(path) else {
        return;
    };
    for version in &metadata.versions {
        match ArtifactCoordinate::validate_version(version) {
            Ok(()) if !version.is_empty() => {
                out.insert(Version::new(version));
            }
            Ok(()) => {}
            Err(err) => tracing::warn!(
                target = "quarry.resolver",
                path = %path.display(),
                error = %err,
                "ignoring unusable version in metadata"
            ),
        }
    }
}

