use quarry_resolver::{ErrorKind, ResolutionError};

use super::fixtures::{dep, deps, manager, RemoteFixture};

#[test]
fn offline_resolution_uses_the_local_repository() {
    let remote = RemoteFixture::new("fixture");
    remote
        .library("org.app", "app", "1.0", &deps(&[dep("org.lib", "lib", "1.0")]))
        .library("org.lib", "lib", "1.0", "");
    let repository = remote.repository();
    let local = tempfile::tempdir().unwrap();

    let online = manager(local.path(), vec![repository.clone()]);
    let cached = online.resolve_dependency("org.app", "app", "1.0").unwrap();
    assert_eq!(cached.len(), 2);
    drop(remote);

    let offline = manager(local.path(), vec![repository]).with_offline(true);
    assert!(offline.is_offline());
    let files = offline.resolve_dependency("org.app", "app", "1.0").unwrap();
    assert_eq!(files, cached);
}

#[test]
fn offline_miss_names_the_offline_mode() {
    let remote = RemoteFixture::new("fixture");
    remote.library("org.lib", "lib", "1.0", "");
    let local = tempfile::tempdir().unwrap();
    let manager = manager(local.path(), vec![remote.repository()]).with_offline(true);

    let err = manager.resolve_dependency("org.lib", "lib", "1.0").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(
        matches!(err, ResolutionError::ArtifactNotFound { offline: true, .. }),
        "{err}"
    );
    assert!(err.to_string().contains("offline"), "{err}");
    assert!(!local.path().join("org/lib/lib/1.0/lib-1.0.jar").exists());
}
