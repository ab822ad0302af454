//! Dependency collection: expands a root coordinate into the graph of its transitive
//! dependencies, mediating versions the way Maven does.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::path::PathBuf;

use quarry_core::{ArtifactCoordinate, ArtifactKind, VersionConstraint, COMPILE_SCOPE};
use serde::Serialize;

use crate::error::{ErrorKind, ResolutionError, Result};
use crate::model::EffectiveModel;
use crate::pom::{Dependency, Exclusion};
use crate::session::RepositorySession;
use crate::ResolvedArtifact;

const RUNTIME_SCOPE: &str = "runtime";
const SYSTEM_SCOPE: &str = "system";

/// One node of a collected dependency graph.
///
/// A node that lost version mediation to a nearer declaration of the same artifact is kept
/// with `rejected` set and no children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyNode {
    pub artifact: ArtifactCoordinate,
    pub scope: String,
    pub rejected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DependencyNode>,
}

impl DependencyNode {
    /// Pre-order walk that skips rejected subtrees.
    pub fn winners(&self) -> Vec<&DependencyNode> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if node.rejected {
                continue;
            }
            out.push(node);
            stack.extend(node.children.iter().rev());
        }
        out
    }

    /// Whether the node belongs on a compile classpath.
    #[must_use]
    pub fn is_compile_classpath(&self) -> bool {
        self.scope == COMPILE_SCOPE || self.scope == SYSTEM_SCOPE
    }

    fn fmt_tree(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        write!(f, "{:indent$}{} [{}]", "", self.artifact, self.scope, indent = depth * 2)?;
        if self.rejected {
            f.write_str(" (rejected)")?;
        }
        writeln!(f)?;
        for child in &self.children {
            child.fmt_tree(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for DependencyNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_tree(f, 0)
    }
}

/// What to collect.
#[derive(Debug, Clone)]
pub(crate) struct CollectRequest<'a> {
    pub group_id: &'a str,
    pub artifact_id: &'a str,
    pub constraint: &'a VersionConstraint,
    pub kind: ArtifactKind,
    pub transitive: bool,
    pub exclusions: &'a [Exclusion],
}

struct NodeData {
    artifact: ArtifactCoordinate,
    scope: String,
    rejected: bool,
    system_path: Option<PathBuf>,
    children: Vec<usize>,
}

struct Expansion {
    node: usize,
    depth: usize,
    scope: String,
    exclusions: Vec<Exclusion>,
    dependencies: Vec<Dependency>,
}

/// Errors that only mean "this artifact's POM is unusable": the artifact is kept without
/// dependencies instead of failing the whole collection.
fn is_invalid_descriptor(err: &ResolutionError) -> bool {
    err.kind() == ErrorKind::NotFound
        || matches!(
            err,
            ResolutionError::Parse { .. } | ResolutionError::ParentCycle { .. }
        )
}

/// Scope of a transitive dependency given the scope its parent was reached with.
fn derive_scope(parent: &str, declared: &str) -> String {
    if declared == SYSTEM_SCOPE {
        SYSTEM_SCOPE.to_string()
    } else if parent == RUNTIME_SCOPE || declared == RUNTIME_SCOPE {
        RUNTIME_SCOPE.to_string()
    } else {
        COMPILE_SCOPE.to_string()
    }
}

/// Only compile and runtime dependencies of a dependency are inherited; system paths are
/// honoured as declared.
fn is_transitive(dep: &Dependency) -> bool {
    !dep.optional && matches!(dep.scope(), "compile" | "runtime" | "system")
}

pub(crate) fn collect(
    session: &RepositorySession<'_>,
    request: &CollectRequest<'_>,
) -> Result<DependencyNode> {
    ArtifactCoordinate::validate_key(request.group_id, request.artifact_id)?;
    let version =
        session.resolve_version(request.group_id, request.artifact_id, request.constraint)?;
    let root_artifact = ArtifactCoordinate::try_new(
        request.group_id,
        request.artifact_id,
        request.kind.classifier(),
        request.kind.extension(),
        version.as_str(),
    )?;

    let mut arena = vec![NodeData {
        artifact: root_artifact.clone(),
        scope: COMPILE_SCOPE.to_string(),
        rejected: false,
        system_path: None,
        children: Vec::new(),
    }];
    if !request.transitive {
        return Ok(into_tree(&mut arena, 0));
    }

    let root_model = match session.model(request.group_id, request.artifact_id, &version) {
        Ok(model) => model,
        Err(err) if is_invalid_descriptor(&err) => {
            tracing::warn!(
                target = "quarry.resolver",
                artifact = %root_artifact,
                error = %err,
                "invalid artifact descriptor, resolving without dependencies"
            );
            EffectiveModel::default()
        }
        Err(err) => return Err(err),
    };

    let mut winners = HashSet::from([root_artifact.versionless_id()]);
    let mut queue = VecDeque::from([Expansion {
        node: 0,
        depth: 1,
        scope: COMPILE_SCOPE.to_string(),
        exclusions: request.exclusions.to_vec(),
        dependencies: root_model.dependencies.clone(),
    }]);

    while let Some(expansion) = queue.pop_front() {
        for declared in expansion.dependencies {
            if !is_transitive(&declared) {
                continue;
            }
            if expansion
                .exclusions
                .iter()
                .any(|e| e.matches(&declared.group_id, &declared.artifact_id))
            {
                tracing::trace!(
                    target = "quarry.resolver",
                    dependency = %declared.management_key(),
                    "excluded"
                );
                continue;
            }

            let mut dep = declared;
            if expansion.depth >= 2 {
                manage(&mut dep, &root_model);
            }
            let scope = derive_scope(&expansion.scope, dep.scope());

            ArtifactCoordinate::validate_key(&dep.group_id, &dep.artifact_id)?;
            let version = match dep.version.as_deref() {
                Some(spec) if scope != SYSTEM_SCOPE => {
                    let constraint = VersionConstraint::parse(spec)?;
                    session.resolve_version(&dep.group_id, &dep.artifact_id, &constraint)?
                }
                Some(spec) => spec.to_string(),
                None => String::new(),
            };
            let artifact = ArtifactCoordinate::try_new(
                dep.group_id.as_str(),
                dep.artifact_id.as_str(),
                dep.effective_classifier(),
                dep.extension(),
                version,
            )?;

            let key = artifact.versionless_id();
            let rejected = winners.contains(&key);
            let system_path = (scope == SYSTEM_SCOPE)
                .then(|| dep.system_path.as_deref().map(PathBuf::from))
                .flatten();
            let idx = arena.len();
            arena.push(NodeData {
                artifact: artifact.clone(),
                scope: scope.clone(),
                rejected,
                system_path,
                children: Vec::new(),
            });
            arena[expansion.node].children.push(idx);

            if rejected {
                tracing::debug!(
                    target = "quarry.resolver",
                    artifact = %artifact,
                    "omitted for conflict with a nearer version"
                );
                continue;
            }
            winners.insert(key);
            if scope == SYSTEM_SCOPE {
                continue;
            }

            let model = match session.model(
                &artifact.group_id,
                &artifact.artifact_id,
                &artifact.version,
            ) {
                Ok(model) => model,
                Err(err) if is_invalid_descriptor(&err) => {
                    tracing::warn!(
                        target = "quarry.resolver",
                        artifact = %artifact,
                        error = %err,
                        "invalid artifact descriptor, resolving without dependencies"
                    );
                    continue;
                }
                Err(err) => return Err(err),
            };

            let mut exclusions = expansion.exclusions.clone();
            exclusions.extend(dep.exclusions.iter().cloned());
            queue.push_back(Expansion {
                node: idx,
                depth: expansion.depth + 1,
                scope,
                exclusions,
                dependencies: model.dependencies,
            });
        }
    }

    Ok(into_tree(&mut arena, 0))
}

/// Apply the root's dependency management to a transitive dependency.
fn manage(dep: &mut Dependency, root: &EffectiveModel) {
    let Some(managed) = root.managed(dep) else {
        return;
    };
    if managed.version.is_some() {
        dep.version = managed.version.clone();
    }
    if managed.scope.is_some() {
        dep.scope = managed.scope.clone();
    }
    dep.exclusions.extend(managed.exclusions.iter().cloned());
}

fn into_tree(arena: &mut [NodeData], idx: usize) -> DependencyNode {
    let children = std::mem::take(&mut arena[idx].children);
    let children = children
        .into_iter()
        .map(|child| into_tree(arena, child))
        .collect();
    let data = &arena[idx];
    DependencyNode {
        artifact: data.artifact.clone(),
        scope: data.scope.clone(),
        rejected: data.rejected,
        system_path: data.system_path.clone(),
        children,
    }
}

/// Resolve the files of a collected graph's compile classpath.
///
/// For a primary kind every node's own artifact is resolved and any failure is returned.
/// For an attachment kind (sources, javadoc...) each node is asked for that attachment and
/// nodes without one are skipped.
pub(crate) fn resolve_graph(
    session: &RepositorySession<'_>,
    root: &DependencyNode,
    kind: ArtifactKind,
) -> Result<Vec<ResolvedArtifact>> {
    let mut seen = HashSet::new();
    let mut resolved = Vec::new();

    for (position, node) in root.winners().into_iter().enumerate() {
        let is_root = position == 0;
        if !is_root && !node.is_compile_classpath() {
            continue;
        }
        let artifact = if is_root || kind.is_primary() {
            node.artifact.clone()
        } else {
            node.artifact.with_kind(kind)
        };
        if !seen.insert(artifact.clone()) {
            continue;
        }

        let result = match &node.system_path {
            Some(path) if !is_root => session.resolve_system(&artifact, path),
            _ => session.resolve_artifact(&artifact),
        };
        match result {
            Ok(artifact) => resolved.push(artifact),
            Err(err) if kind.is_primary() || err.is_cancelled() => return Err(err),
            Err(err) => tracing::debug!(
                target = "quarry.resolver",
                artifact = %artifact,
                error = %err,
                "skipping unavailable attachment"
            ),
        }
    }
    Ok(resolved)
}
