use std::sync::{Arc, Mutex};

use httpmock::prelude::*;
use quarry_core::{ProgressConsumer, RemoteRepository};
use quarry_resolver::{ArtifactRepositoryManager, ErrorKind, ResolutionError};
use quarry_retry::Retry;
use quarry_transport::{ProxyAdapter, ProxyCandidate, ProxySelector};
use url::Url;

struct NoProxies;

impl ProxySelector for NoProxies {
    fn select(&self, _url: &Url) -> std::io::Result<Vec<ProxyCandidate>> {
        Ok(vec![])
    }
}

#[derive(Default)]
struct RecordingProgress {
    messages: Mutex<Vec<String>>,
}

impl ProgressConsumer for RecordingProgress {
    fn consume(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

fn jar_bytes() -> Vec<u8> {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("demo.jar");
    super::fixtures::write_jar(&path);
    std::fs::read(path).unwrap()
}

fn http_manager(
    local: &std::path::Path,
    server: &MockServer,
    progress: Option<Arc<dyn ProgressConsumer>>,
) -> ArtifactRepositoryManager {
    let repository = RemoteRepository::new("remote", &server.url("/maven2/")).unwrap();
    ArtifactRepositoryManager::new(local, vec![repository], progress)
        .with_retry(Retry::disabled())
        .with_proxies(ProxyAdapter::new(Arc::new(NoProxies)))
}

#[test]
fn downloads_over_http_once_and_reports_progress() {
    let server = MockServer::start();
    let pom = server.mock(|when, then| {
        when.method(GET).path("/maven2/org/example/demo/1.0/demo-1.0.pom");
        then.status(200).body(
            "<project><groupId>org.example</groupId><artifactId>demo</artifactId><version>1.0</version></project>",
        );
    });
    let jar = server.mock(|when, then| {
        when.method(GET).path("/maven2/org/example/demo/1.0/demo-1.0.jar");
        then.status(200).body(jar_bytes());
    });

    let local = tempfile::tempdir().unwrap();
    let progress = Arc::new(RecordingProgress::default());
    let manager = http_manager(local.path(), &server, Some(progress.clone()));

    let files = manager.resolve_dependency("org.example", "demo", "1.0").unwrap();
    assert_eq!(
        files,
        vec![local.path().join("org/example/demo/1.0/demo-1.0.jar")]
    );
    {
        let messages = progress.messages.lock().unwrap();
        assert!(
            messages
                .iter()
                .any(|m| m.starts_with("Downloading ") && m.ends_with("demo-1.0.jar")),
            "{messages:?}"
        );
    }

    let again = manager.resolve_dependency("org.example", "demo", "1.0").unwrap();
    assert_eq!(again, files);
    pom.assert_hits(1);
    jar.assert_hits(1);
}

#[test]
fn server_errors_are_transient() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/maven2/org/example/flaky/1.0/flaky-1.0.pom");
        then.status(200).body(
            "<project><groupId>org.example</groupId><artifactId>flaky</artifactId><version>1.0</version></project>",
        );
    });
    server.mock(|when, then| {
        when.method(GET).path("/maven2/org/example/flaky/1.0/flaky-1.0.jar");
        then.status(503);
    });

    let local = tempfile::tempdir().unwrap();
    let manager = http_manager(local.path(), &server, None);

    let err = manager.resolve_dependency("org.example", "flaky", "1.0").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transient, "{err}");
    assert!(!local.path().join("org/example/flaky/1.0/flaky-1.0.jar").exists());
}

#[test]
fn versions_are_read_from_remote_metadata() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/maven2/org/example/demo/maven-metadata.xml");
        then.status(200).body(
            "<metadata><groupId>org.example</groupId><artifactId>demo</artifactId>\
             <versioning><versions><version>0.9</version><version>1.0</version><version>1.1</version></versions></versioning></metadata>",
        );
    });

    let local = tempfile::tempdir().unwrap();
    let manager = http_manager(local.path(), &server, None);

    let versions = manager
        .get_available_versions("org.example", "demo", "[1.0,)", quarry_core::ArtifactKind::Artifact)
        .unwrap();
    let versions: Vec<&str> = versions.iter().map(|v| v.as_str()).collect();
    assert_eq!(versions, vec!["1.0", "1.1"]);
    assert!(local
        .path()
        .join("org/example/demo/maven-metadata-remote.xml")
        .is_file());
}

#[test]
fn dependencies_with_path_segments_are_rejected_before_download() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/maven2/x/root/1/root-1.pom");
        then.status(200).body(
            "<project><groupId>x</groupId><artifactId>root</artifactId><version>1</version>\
             <dependencies><dependency><groupId>x</groupId><artifactId>../../escape</artifactId>\
             <version>1</version></dependency></dependencies></project>",
        );
    });
    server.mock(|when, then| {
        when.method(GET).path("/maven2/x/root/1/root-1.jar");
        then.status(200).body(jar_bytes());
    });
    let escape = server.mock(|when, then| {
        when.method(GET).path_contains("escape");
        then.status(200).body(jar_bytes());
    });

    let work = tempfile::tempdir().unwrap();
    let local = work.path().join("repo");
    let manager = http_manager(&local, &server, None);

    let err = manager.resolve_dependency("x", "root", "1").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput, "{err}");
    assert!(
        matches!(err, ResolutionError::InvalidCoordinate(_)),
        "{err:?}"
    );
    assert!(err.to_string().contains("../../escape"), "{err}");
    escape.assert_hits(0);
    assert!(!work.path().join("escape-1.jar").exists());
    assert!(!work.path().join("escape").exists());
}

#[test]
fn metadata_versions_that_are_not_single_segments_are_ignored() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/maven2/org/example/demo/maven-metadata.xml");
        then.status(200).body(
            "<metadata><groupId>org.example</groupId><artifactId>demo</artifactId>\
             <versioning><versions><version>1.0</version><version>9/../../../escape</version>\
             </versions></versioning></metadata>",
        );
    });

    let local = tempfile::tempdir().unwrap();
    let manager = http_manager(local.path(), &server, None);

    let versions = manager
        .get_available_versions("org.example", "demo", "", quarry_core::ArtifactKind::Artifact)
        .unwrap();
    let versions: Vec<&str> = versions.iter().map(|v| v.as_str()).collect();
    assert_eq!(versions, vec!["1.0"]);
}
