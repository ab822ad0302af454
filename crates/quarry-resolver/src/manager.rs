use std::path::{Path, PathBuf};
use std::sync::Arc;

use quarry_config::QuarryConfig;
use quarry_core::{
    ArtifactCoordinate, ArtifactKind, ProgressConsumer, RemoteRepository, Version,
    VersionConstraint,
};
use quarry_local::{
    EnhancedLocalRepositoryManager, LocalRepositoryManager, StrictLocalRepositoryManager,
    UpdateCheckManager,
};
use quarry_retry::Retry;
use quarry_transport::{
    transporter_for, NoopTransferListener, ProgressTransferListener, ProxyAdapter,
    TransferListener, Transporter,
};
use serde::Serialize;

use crate::collector::{collect, resolve_graph, CollectRequest, DependencyNode};
use crate::error::{ResolutionError, Result};
use crate::pom::Exclusion;
use crate::profile::{ActivationContext, DeterministicProfileActivator};
use crate::session::RepositorySession;

/// A file in the local repository together with the coordinate it was resolved for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedArtifact {
    pub artifact: ArtifactCoordinate,
    pub file: PathBuf,
    /// Repository the file was downloaded from; `None` for locally installed or untracked
    /// files.
    pub repository: Option<String>,
}

/// Resolves Maven coordinates to files in a local repository, downloading from remote
/// repositories as needed.
///
/// Each call is self-contained: transporters and parsed POMs are not kept between calls.
/// Reconfiguration goes through `&mut self`, so it cannot race with a running resolution.
pub struct ArtifactRepositoryManager {
    local: StrictLocalRepositoryManager<EnhancedLocalRepositoryManager>,
    repositories: Vec<RemoteRepository>,
    progress: Option<Arc<dyn ProgressConsumer>>,
    retry: Retry,
    proxies: ProxyAdapter,
    activator: DeterministicProfileActivator,
    activation: ActivationContext,
    update_checks: UpdateCheckManager,
    offline: bool,
}

impl std::fmt::Debug for ArtifactRepositoryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactRepositoryManager")
            .field("local", &self.local.basedir())
            .field("repositories", &self.repositories)
            .field("offline", &self.offline)
            .field("strict", &self.local.is_strict())
            .finish_non_exhaustive()
    }
}

impl ArtifactRepositoryManager {
    /// A manager over `local_repository` with the default retry policy, no strict archive
    /// validation, proxies from the environment and the host's profile activation context.
    pub fn new(
        local_repository: impl Into<PathBuf>,
        repositories: Vec<RemoteRepository>,
        progress: Option<Arc<dyn ProgressConsumer>>,
    ) -> Self {
        let enhanced = EnhancedLocalRepositoryManager::new(local_repository);
        let update_checks = UpdateCheckManager::new(enhanced.tracking().clone());
        Self {
            local: StrictLocalRepositoryManager::new(enhanced, false),
            repositories,
            progress,
            retry: Retry::standard(),
            proxies: ProxyAdapter::default(),
            activator: DeterministicProfileActivator::default(),
            activation: ActivationContext::host(),
            update_checks,
            offline: false,
        }
    }

    /// A manager configured from a loaded [`QuarryConfig`].
    pub fn from_config(
        config: &QuarryConfig,
        progress: Option<Arc<dyn ProgressConsumer>>,
    ) -> Result<Self> {
        let local = config.local_repository_path()?;
        let repositories = config.remote_repositories()?;
        let retry = config.retry_policy()?;
        let proxies = ProxyAdapter::default().with_properties(config.proxy.properties.clone());

        Ok(Self::new(local, repositories, progress)
            .with_retry(retry)
            .with_strict_validation(config.strict_validation)
            .with_offline(config.offline)
            .with_proxies(proxies)
            .with_activation_context(ActivationContext::from_config(&config.profiles)))
    }

    #[must_use]
    pub fn with_retry(mut self, retry: Retry) -> Self {
        self.retry = retry;
        self
    }

    /// Validate cached jar/zip files before trusting them.
    #[must_use]
    pub fn with_strict_validation(mut self, strict: bool) -> Self {
        let basedir = self.local.basedir().to_path_buf();
        let tracking = self.local.delegate().tracking().clone();
        self.local = StrictLocalRepositoryManager::new(
            EnhancedLocalRepositoryManager::with_tracking(basedir, tracking),
            strict,
        );
        self
    }

    #[must_use]
    pub fn with_offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    #[must_use]
    pub fn with_proxies(mut self, proxies: ProxyAdapter) -> Self {
        self.proxies = proxies;
        self
    }

    #[must_use]
    pub fn with_activation_context(mut self, activation: ActivationContext) -> Self {
        self.activation = activation;
        self
    }

    pub fn local_repository(&self) -> &Path {
        self.local.basedir()
    }

    pub fn repositories(&self) -> &[RemoteRepository] {
        &self.repositories
    }

    pub fn is_offline(&self) -> bool {
        self.offline
    }

    /// Append a remote repository; later repositories are consulted after earlier ones.
    pub fn add_remote_repository(&mut self, id: &str, url: &str) -> Result<()> {
        let repository = Self::create_remote_repository(id, url)?;
        self.repositories.push(repository);
        Ok(())
    }

    pub fn create_remote_repository(id: &str, url: &str) -> Result<RemoteRepository> {
        Ok(RemoteRepository::new(id, url)?)
    }

    pub fn as_version(text: &str) -> Result<Version> {
        Ok(text.parse()?)
    }

    pub fn as_version_constraint(text: &str) -> Result<VersionConstraint> {
        Ok(VersionConstraint::parse(text)?)
    }

    fn with_session<T>(
        &self,
        f: impl FnOnce(&RepositorySession<'_>) -> Result<T>,
    ) -> Result<T> {
        let transporters = if self.offline {
            Vec::new()
        } else {
            self.repositories
                .iter()
                .map(|repository| {
                    transporter_for(repository, &self.proxies).map_err(|source| {
                        ResolutionError::Transfer {
                            artifact: repository.id.clone(),
                            source,
                        }
                    })
                })
                .collect::<Result<Vec<Box<dyn Transporter>>>>()?
        };
        let listener: Box<dyn TransferListener> = match &self.progress {
            Some(progress) => Box::new(ProgressTransferListener::new(progress.clone())),
            None => Box::new(NoopTransferListener),
        };

        let session = RepositorySession::new(
            &self.local,
            &self.repositories,
            transporters,
            &self.retry,
            listener.as_ref(),
            &self.update_checks,
            self.offline,
            &self.activator,
            &self.activation,
        );
        f(&session)
    }

    /// Resolve `group_id:artifact_id` at `version_constraint` into files, one collection per
    /// requested kind.
    ///
    /// Failing to resolve a primary kind (the artifact itself) fails the call. Attachment
    /// kinds such as sources or javadoc keep whatever was found. Repeated kinds are resolved
    /// once; results follow the order of `kinds`.
    pub fn resolve_dependency_as_artifact(
        &self,
        group_id: &str,
        artifact_id: &str,
        version_constraint: &str,
        kinds: &[ArtifactKind],
        include_transitively: bool,
        excluded_dependencies: &[String],
    ) -> Result<Vec<ResolvedArtifact>> {
        let constraint = Self::as_version_constraint(version_constraint)?;
        let exclusions: Vec<Exclusion> = excluded_dependencies
            .iter()
            .filter_map(|text| Exclusion::parse(text))
            .collect();

        let mut requested = Vec::new();
        for kind in kinds {
            if !requested.contains(kind) {
                requested.push(*kind);
            }
        }

        self.with_session(|session| {
            let mut resolved = Vec::new();
            for kind in requested {
                let request = CollectRequest {
                    group_id,
                    artifact_id,
                    constraint: &constraint,
                    kind,
                    transitive: include_transitively,
                    exclusions: &exclusions,
                };
                let result = collect(session, &request)
                    .and_then(|root| resolve_graph(session, &root, kind));
                match result {
                    Ok(artifacts) => resolved.extend(artifacts),
                    Err(err) if kind.is_primary() || err.is_cancelled() => return Err(err),
                    Err(err) => tracing::debug!(
                        target = "quarry.resolver",
                        group_id,
                        artifact_id,
                        kind = kind.name(),
                        error = %err,
                        "skipping unavailable kind"
                    ),
                }
            }
            tracing::debug!(
                target = "quarry.resolver",
                group_id,
                artifact_id,
                constraint = %constraint,
                count = resolved.len(),
                "resolved dependency"
            );
            Ok(resolved)
        })
    }

    /// Files of `group_id:artifact_id` and its transitive compile dependencies.
    pub fn resolve_dependency(
        &self,
        group_id: &str,
        artifact_id: &str,
        version_constraint: &str,
    ) -> Result<Vec<PathBuf>> {
        Ok(self
            .resolve_dependency_as_artifact(
                group_id,
                artifact_id,
                version_constraint,
                &[ArtifactKind::Artifact],
                true,
                &[],
            )?
            .into_iter()
            .map(|artifact| artifact.file)
            .collect())
    }

    /// The mediated dependency graph of `group_id:artifact_id`, including rejected nodes.
    pub fn collect_dependencies(
        &self,
        group_id: &str,
        artifact_id: &str,
        version_constraint: &str,
    ) -> Result<DependencyNode> {
        let constraint = Self::as_version_constraint(version_constraint)?;
        self.with_session(|session| {
            collect(
                session,
                &CollectRequest {
                    group_id,
                    artifact_id,
                    constraint: &constraint,
                    kind: ArtifactKind::Artifact,
                    transitive: true,
                    exclusions: &[],
                },
            )
        })
    }

    /// Versions matching `version_constraint`, ascending.
    ///
    /// An exact version is returned as-is without consulting repository metadata.
    pub fn get_available_versions(
        &self,
        group_id: &str,
        artifact_id: &str,
        version_constraint: &str,
        kind: ArtifactKind,
    ) -> Result<Vec<Version>> {
        let constraint = Self::as_version_constraint(version_constraint)?;
        if let VersionConstraint::Exact(version) = &constraint {
            return Ok(vec![version.clone()]);
        }
        tracing::debug!(
            target = "quarry.resolver",
            group_id,
            artifact_id,
            kind = kind.name(),
            constraint = %constraint,
            "listing available versions"
        );
        self.with_session(|session| session.available_versions(group_id, artifact_id, &constraint))
    }
}
