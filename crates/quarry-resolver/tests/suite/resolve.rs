use pretty_assertions::assert_eq;
use quarry_core::ArtifactKind;
use quarry_resolver::{ActivationContext, ErrorKind, ResolutionError};

use super::fixtures::{dep, dep_with, deps, file_names, manager, RemoteFixture};

fn app_repository() -> RemoteFixture {
    let remote = RemoteFixture::new("fixture");
    remote
        .library(
            "org.app",
            "app",
            "1.0",
            &deps(&[
                dep("org.lib", "lib", "1.0"),
                dep_with("junit", "junit", "4.13.2", "<scope>test</scope>"),
                dep_with("org.opt", "opt", "1.0", "<optional>true</optional>"),
            ]),
        )
        .library(
            "org.lib",
            "lib",
            "1.0",
            &deps(&[
                dep("org.util", "util", "1.0"),
                dep_with("org.rt", "rt", "1.0", "<scope>runtime</scope>"),
                dep_with("org.prov", "prov", "1.0", "<scope>provided</scope>"),
            ]),
        )
        .library("org.util", "util", "1.0", "")
        .library("org.rt", "rt", "1.0", "");
    remote
}

#[test]
fn resolves_compile_classpath_transitively() {
    let remote = app_repository();
    let local = tempfile::tempdir().unwrap();
    let manager = manager(local.path(), vec![remote.repository()]);

    let files = manager.resolve_dependency("org.app", "app", "1.0").unwrap();
    let names: Vec<String> = files
        .iter()
        .map(|f| f.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["app-1.0.jar", "lib-1.0.jar", "util-1.0.jar"]);
    assert!(files.iter().all(|f| f.starts_with(local.path())));
}

#[test]
fn non_transitive_resolution_returns_only_the_root() {
    let remote = app_repository();
    let local = tempfile::tempdir().unwrap();
    let manager = manager(local.path(), vec![remote.repository()]);

    let artifacts = manager
        .resolve_dependency_as_artifact(
            "org.app",
            "app",
            "1.0",
            &[ArtifactKind::Artifact],
            false,
            &[],
        )
        .unwrap();
    assert_eq!(file_names(&artifacts), vec!["app-1.0.jar"]);
    assert_eq!(artifacts[0].repository.as_deref(), Some("fixture"));
}

#[test]
fn missing_sources_are_skipped() {
    let remote = app_repository();
    let local = tempfile::tempdir().unwrap();
    let manager = manager(local.path(), vec![remote.repository()]);

    let artifacts = manager
        .resolve_dependency_as_artifact(
            "org.app",
            "app",
            "1.0",
            &[ArtifactKind::Artifact, ArtifactKind::Sources],
            false,
            &[],
        )
        .unwrap();
    assert_eq!(file_names(&artifacts), vec!["app-1.0.jar"]);
}

#[test]
fn sources_are_resolved_for_every_node_that_has_them() {
    let remote = app_repository();
    remote
        .jar("org.app", "app", "1.0", "sources")
        .jar("org.util", "util", "1.0", "sources");
    let local = tempfile::tempdir().unwrap();
    let manager = manager(local.path(), vec![remote.repository()]);

    let artifacts = manager
        .resolve_dependency_as_artifact(
            "org.app",
            "app",
            "1.0",
            &[ArtifactKind::Sources, ArtifactKind::Artifact, ArtifactKind::Sources],
            true,
            &[],
        )
        .unwrap();
    assert_eq!(
        file_names(&artifacts),
        vec![
            "app-1.0-sources.jar",
            "util-1.0-sources.jar",
            "app-1.0.jar",
            "lib-1.0.jar",
            "util-1.0.jar",
        ]
    );
}

#[test]
fn missing_primary_artifact_fails() {
    let remote = RemoteFixture::new("fixture");
    remote.pom("org.app", "pom-only", "1.0", "");
    let local = tempfile::tempdir().unwrap();
    let manager = manager(local.path(), vec![remote.repository()]);

    let err = manager
        .resolve_dependency("org.app", "pom-only", "1.0")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound, "{err}");
    assert!(
        matches!(&err, ResolutionError::ArtifactNotFound { artifact, .. } if artifact == "org.app:pom-only:jar:1.0"),
        "{err}"
    );
}

#[test]
fn missing_pom_resolves_without_dependencies() {
    let remote = RemoteFixture::new("fixture");
    remote.jar("org.bare", "bare", "1.0", "");
    let local = tempfile::tempdir().unwrap();
    let manager = manager(local.path(), vec![remote.repository()]);

    let files = manager.resolve_dependency("org.bare", "bare", "1.0").unwrap();
    assert_eq!(files.len(), 1);
}

#[test]
fn excluded_dependencies_are_dropped_with_their_subtree() {
    let remote = app_repository();
    let local = tempfile::tempdir().unwrap();
    let manager = manager(local.path(), vec![remote.repository()]);

    let artifacts = manager
        .resolve_dependency_as_artifact(
            "org.app",
            "app",
            "1.0",
            &[ArtifactKind::Artifact],
            true,
            &["org.util:util".to_string()],
        )
        .unwrap();
    assert_eq!(file_names(&artifacts), vec!["app-1.0.jar", "lib-1.0.jar"]);

    let artifacts = manager
        .resolve_dependency_as_artifact(
            "org.app",
            "app",
            "1.0",
            &[ArtifactKind::Artifact],
            true,
            &["org.lib:*".to_string()],
        )
        .unwrap();
    assert_eq!(file_names(&artifacts), vec!["app-1.0.jar"]);
}

#[test]
fn pom_exclusions_apply_below_the_declaring_dependency() {
    let remote = app_repository();
    remote.library(
        "org.app",
        "trimmed",
        "1.0",
        &deps(&[dep_with(
            "org.lib",
            "lib",
            "1.0",
            "<exclusions><exclusion><groupId>org.util</groupId><artifactId>*</artifactId></exclusion></exclusions>",
        )]),
    );
    let local = tempfile::tempdir().unwrap();
    let manager = manager(local.path(), vec![remote.repository()]);

    let artifacts = manager
        .resolve_dependency_as_artifact(
            "org.app",
            "trimmed",
            "1.0",
            &[ArtifactKind::Artifact],
            true,
            &[],
        )
        .unwrap();
    assert_eq!(file_names(&artifacts), vec!["trimmed-1.0.jar", "lib-1.0.jar"]);
}

#[test]
fn nearest_declaration_wins_and_loser_is_rejected() {
    let remote = RemoteFixture::new("fixture");
    remote
        .library(
            "org.app",
            "app",
            "1.0",
            &deps(&[dep("org.lib", "lib", "1.0"), dep("org.common", "common", "2.0")]),
        )
        .library("org.lib", "lib", "1.0", &deps(&[dep("org.common", "common", "1.0")]))
        .library("org.common", "common", "1.0", "")
        .library("org.common", "common", "2.0", "");
    let local = tempfile::tempdir().unwrap();
    let manager = manager(local.path(), vec![remote.repository()]);

    let tree = manager.collect_dependencies("org.app", "app", "1.0").unwrap();
    assert_eq!(
        tree.to_string(),
        "org.app:app:jar:1.0 [compile]\n\
         \x20 org.lib:lib:jar:1.0 [compile]\n\
         \x20   org.common:common:jar:1.0 [compile] (rejected)\n\
         \x20 org.common:common:jar:2.0 [compile]\n"
    );

    let files = manager.resolve_dependency("org.app", "app", "1.0").unwrap();
    let names: Vec<String> = files
        .iter()
        .map(|f| f.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["app-1.0.jar", "lib-1.0.jar", "common-2.0.jar"]);
}

#[test]
fn cycles_are_cut() {
    let remote = RemoteFixture::new("fixture");
    remote
        .library("org.a", "a", "1.0", &deps(&[dep("org.b", "b", "1.0")]))
        .library("org.b", "b", "1.0", &deps(&[dep("org.a", "a", "1.0")]));
    let local = tempfile::tempdir().unwrap();
    let manager = manager(local.path(), vec![remote.repository()]);

    let tree = manager.collect_dependencies("org.a", "a", "1.0").unwrap();
    let back_edge = &tree.children[0].children[0];
    assert!(back_edge.rejected);
    assert_eq!(manager.resolve_dependency("org.a", "a", "1.0").unwrap().len(), 2);
}

#[test]
fn root_dependency_management_overrides_transitive_versions() {
    let remote = RemoteFixture::new("fixture");
    remote
        .library(
            "org.app",
            "app",
            "1.0",
            &format!(
                "<dependencyManagement>{}</dependencyManagement>{}",
                deps(&[dep("org.util", "util", "2.0")]),
                deps(&[dep("org.lib", "lib", "1.0")]),
            ),
        )
        .library("org.lib", "lib", "1.0", &deps(&[dep("org.util", "util", "1.0")]))
        .library("org.util", "util", "1.0", "")
        .library("org.util", "util", "2.0", "");
    let local = tempfile::tempdir().unwrap();
    let manager = manager(local.path(), vec![remote.repository()]);

    let files = manager.resolve_dependency("org.app", "app", "1.0").unwrap();
    assert!(files.iter().any(|f| f.ends_with("org/util/util/2.0/util-2.0.jar")), "{files:?}");
    assert!(!files.iter().any(|f| f.ends_with("util-1.0.jar")), "{files:?}");
}

#[test]
fn jdk_gated_profiles_are_always_applied() {
    let remote = RemoteFixture::new("fixture");
    remote
        .library(
            "org.app",
            "modular",
            "1.0",
            &format!(
                "<profiles><profile><id>java9</id><activation><jdk>9</jdk></activation>{}</profile>\
                 <profile><id>extras</id><activation><property><name>with.extras</name></property></activation>{}</profile></profiles>",
                deps(&[dep("org.jdk9", "shim", "1.0")]),
                deps(&[dep("org.extra", "extra", "1.0")]),
            ),
        )
        .library("org.jdk9", "shim", "1.0", "");
    let local = tempfile::tempdir().unwrap();
    // The configured JDK doesn't match the `<jdk>9</jdk>` prefix.
    let context = ActivationContext {
        jdk: Some("17".into()),
        ..ActivationContext::host()
    };
    let manager =
        manager(local.path(), vec![remote.repository()]).with_activation_context(context);

    let files = manager.resolve_dependency("org.app", "modular", "1.0").unwrap();
    assert_eq!(files.len(), 2);
    assert!(files[1].ends_with("shim-1.0.jar"));
}

#[test]
fn repositories_are_tried_in_order() {
    let empty = RemoteFixture::new("empty");
    let full = RemoteFixture::new("full");
    full.library("org.lib", "lib", "1.0", "");
    let local = tempfile::tempdir().unwrap();
    let manager = manager(local.path(), vec![empty.repository(), full.repository()]);

    let artifacts = manager
        .resolve_dependency_as_artifact("org.lib", "lib", "1.0", &[ArtifactKind::Artifact], false, &[])
        .unwrap();
    assert_eq!(artifacts[0].repository.as_deref(), Some("full"));

    let tracking = local.path().join("org/lib/lib/1.0/_remote.repositories");
    let text = std::fs::read_to_string(tracking).unwrap();
    assert!(text.contains("lib-1.0.jar>full="), "{text}");
}

#[test]
fn added_repositories_are_consulted() {
    let remote = RemoteFixture::new("late");
    remote.library("org.lib", "lib", "1.0", "");
    let local = tempfile::tempdir().unwrap();
    let mut manager = manager(local.path(), Vec::new());

    let err = manager.resolve_dependency("org.lib", "lib", "1.0").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    manager
        .add_remote_repository("late", remote.repository().url().as_str())
        .unwrap();
    assert_eq!(manager.resolve_dependency("org.lib", "lib", "1.0").unwrap().len(), 1);
}

#[test]
fn invalid_input_is_reported_before_any_transfer() {
    let local = tempfile::tempdir().unwrap();
    let manager = manager(local.path(), Vec::new());

    let err = manager.resolve_dependency("org.lib", "lib", "[1.0").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let err = quarry_resolver::ArtifactRepositoryManager::create_remote_repository("x", "ftp://host/")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[test]
fn strict_validation_replaces_corrupted_cached_jars() {
    let remote = RemoteFixture::new("fixture");
    remote.library("org.lib", "lib", "1.0", "");
    let local = tempfile::tempdir().unwrap();
    let cached = local.path().join("org/lib/lib/1.0/lib-1.0.jar");
    std::fs::create_dir_all(cached.parent().unwrap()).unwrap();
    std::fs::write(&cached, b"not a zip").unwrap();

    let lenient = manager(local.path(), vec![remote.repository()]);
    let files = lenient.resolve_dependency("org.lib", "lib", "1.0").unwrap();
    assert_eq!(std::fs::read(&files[0]).unwrap(), b"not a zip");

    let strict = manager(local.path(), vec![remote.repository()]).with_strict_validation(true);
    let files = strict.resolve_dependency("org.lib", "lib", "1.0").unwrap();
    assert_eq!(files[0], cached);
    assert_ne!(std::fs::read(&files[0]).unwrap(), b"not a zip");
}

struct CancelAll;

impl quarry_core::ProgressConsumer for CancelAll {
    fn consume(&self, _message: &str) {}

    fn is_canceled(&self) -> bool {
        true
    }
}

#[test]
fn cancellation_stops_resolution() {
    let remote = app_repository();
    let local = tempfile::tempdir().unwrap();
    let manager = quarry_resolver::ArtifactRepositoryManager::new(
        local.path(),
        vec![remote.repository()],
        Some(std::sync::Arc::new(CancelAll)),
    )
    .with_retry(quarry_retry::Retry::disabled());

    let err = manager.resolve_dependency("org.app", "app", "1.0").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled, "{err}");
    assert!(!local.path().join("org/app/app/1.0/app-1.0.jar").exists());
}
