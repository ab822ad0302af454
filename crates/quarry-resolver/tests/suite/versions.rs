use pretty_assertions::assert_eq;
use quarry_core::{ArtifactKind, Version};
use quarry_resolver::{ErrorKind, ResolutionError};

use super::fixtures::{dep, deps, manager, RemoteFixture};

fn versioned_repository() -> RemoteFixture {
    let remote = RemoteFixture::new("fixture");
    remote
        .metadata("org.lib", "lib", &["1.0", "1.5", "2.0"])
        .library("org.lib", "lib", "1.0", "")
        .library("org.lib", "lib", "1.5", "")
        .library("org.lib", "lib", "2.0", "");
    remote
}

fn strings(versions: &[Version]) -> Vec<&str> {
    versions.iter().map(Version::as_str).collect()
}

#[test]
fn range_resolves_to_highest_match() {
    let remote = versioned_repository();
    let local = tempfile::tempdir().unwrap();
    let manager = manager(local.path(), vec![remote.repository()]);

    let files = manager.resolve_dependency("org.lib", "lib", "[1.0,2.0)").unwrap();
    assert_eq!(files.len(), 1);
    assert!(files[0].ends_with("org/lib/lib/1.5/lib-1.5.jar"), "{files:?}");
}

#[test]
fn ranged_transitive_dependencies_are_resolved_through_metadata() {
    let remote = versioned_repository();
    remote.library("org.app", "app", "1.0", &deps(&[dep("org.lib", "lib", "[1.0,)")]));
    let local = tempfile::tempdir().unwrap();
    let manager = manager(local.path(), vec![remote.repository()]);

    let tree = manager.collect_dependencies("org.app", "app", "1.0").unwrap();
    assert_eq!(tree.children.len(), 1);
    assert_eq!(tree.children[0].artifact.version, "2.0");
}

#[test]
fn lists_available_versions_in_ascending_order() {
    let remote = versioned_repository();
    let local = tempfile::tempdir().unwrap();
    let manager = manager(local.path(), vec![remote.repository()]);

    let versions = manager
        .get_available_versions("org.lib", "lib", "[1.0,)", ArtifactKind::Artifact)
        .unwrap();
    assert_eq!(strings(&versions), vec!["1.0", "1.5", "2.0"]);

    let versions = manager
        .get_available_versions("org.lib", "lib", "(1.0,2.0]", ArtifactKind::Artifact)
        .unwrap();
    assert_eq!(strings(&versions), vec!["1.5", "2.0"]);
}

#[test]
fn versions_from_every_repository_are_merged() {
    let first = RemoteFixture::new("first");
    first.metadata("org.lib", "lib", &["1.0", "1.5"]);
    let second = RemoteFixture::new("second");
    second.metadata("org.lib", "lib", &["1.5", "3.0"]);
    let local = tempfile::tempdir().unwrap();
    let manager = manager(local.path(), vec![first.repository(), second.repository()]);

    let versions = manager
        .get_available_versions("org.lib", "lib", "[0,)", ArtifactKind::Artifact)
        .unwrap();
    assert_eq!(strings(&versions), vec!["1.0", "1.5", "3.0"]);
}

#[test]
fn exact_version_is_returned_without_metadata() {
    let local = tempfile::tempdir().unwrap();
    let manager = manager(local.path(), Vec::new());

    let versions = manager
        .get_available_versions("org.lib", "lib", "1.5", ArtifactKind::Artifact)
        .unwrap();
    assert_eq!(strings(&versions), vec!["1.5"]);
}

#[test]
fn unmatched_range_reports_no_matching_version() {
    let remote = versioned_repository();
    let local = tempfile::tempdir().unwrap();
    let manager = manager(local.path(), vec![remote.repository()]);

    let err = manager.resolve_dependency("org.lib", "lib", "[5.0,6.0)").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(
        matches!(&err, ResolutionError::NoMatchingVersion { key, .. } if key == "org.lib:lib"),
        "{err}"
    );
}
