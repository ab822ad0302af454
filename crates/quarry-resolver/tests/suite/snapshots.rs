use pretty_assertions::assert_eq;

use super::fixtures::{manager, RemoteFixture};

const TIMESTAMPED: &str = "1.0-20240101.101010-1";

fn publish_timestamped_snapshot(remote: &RemoteFixture) {
    remote
        .pom("org.snap", "demo", TIMESTAMPED, "")
        .jar("org.snap", "demo", TIMESTAMPED, "");
    std::fs::write(
        remote.path("org/snap/demo/1.0-SNAPSHOT/maven-metadata.xml"),
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<metadata modelVersion="1.1.0">
  <groupId>org.snap</groupId>
  <artifactId>demo</artifactId>
  <version>1.0-SNAPSHOT</version>
  <versioning>
    <snapshot>
      <timestamp>20240101.101010</timestamp>
      <buildNumber>1</buildNumber>
    </snapshot>
    <lastUpdated>20240101101010</lastUpdated>
    <snapshotVersions>
      <snapshotVersion>
        <extension>jar</extension>
        <value>{TIMESTAMPED}</value>
        <updated>20240101101010</updated>
      </snapshotVersion>
      <snapshotVersion>
        <extension>pom</extension>
        <value>{TIMESTAMPED}</value>
        <updated>20240101101010</updated>
      </snapshotVersion>
    </snapshotVersions>
  </versioning>
</metadata>
"#
        ),
    )
    .unwrap();
}

#[test]
fn snapshots_download_the_timestamped_build() {
    let remote = RemoteFixture::new("snapshots");
    publish_timestamped_snapshot(&remote);
    let local = tempfile::tempdir().unwrap();
    let manager = manager(local.path(), vec![remote.repository()]);

    let files = manager.resolve_dependency("org.snap", "demo", "1.0-SNAPSHOT").unwrap();
    assert_eq!(
        files,
        vec![local.path().join("org/snap/demo/1.0-SNAPSHOT/demo-1.0-SNAPSHOT.jar")]
    );
    let published = std::fs::read(remote.path(&format!(
        "org/snap/demo/1.0-SNAPSHOT/demo-{TIMESTAMPED}.jar"
    )))
    .unwrap();
    assert_eq!(std::fs::read(&files[0]).unwrap(), published);
    assert!(local
        .path()
        .join("org/snap/demo/1.0-SNAPSHOT/demo-1.0-SNAPSHOT.pom")
        .is_file());
}

#[test]
fn snapshots_without_metadata_use_the_plain_name() {
    let remote = RemoteFixture::new("snapshots");
    remote.library("org.snap", "plain", "2.0-SNAPSHOT", "");
    let local = tempfile::tempdir().unwrap();
    let manager = manager(local.path(), vec![remote.repository()]);

    let files = manager.resolve_dependency("org.snap", "plain", "2.0-SNAPSHOT").unwrap();
    assert_eq!(files.len(), 1);
    assert!(files[0].ends_with("org/snap/plain/2.0-SNAPSHOT/plain-2.0-SNAPSHOT.jar"));
}
