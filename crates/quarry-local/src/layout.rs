//! `default` repository layout: coordinate to relative path mapping.
//!
//! Paths are `/`-separated so they can be joined onto repository urls as well as local roots.

use quarry_core::ArtifactCoordinate;

pub const METADATA_FILE_NAME: &str = "maven-metadata.xml";

/// Tracking file listing which repository each file in a version directory came from.
pub const REMOTE_REPOSITORIES_FILE_NAME: &str = "_remote.repositories";

/// Suffix of tracking files recording failed download attempts.
pub const LAST_UPDATED_SUFFIX: &str = ".lastUpdated";

fn group_path(group_id: &str) -> String {
    group_id.replace('.', "/")
}

/// `artifactId-version[-classifier].extension`
#[must_use]
pub fn artifact_file_name(artifact: &ArtifactCoordinate) -> String {
    let mut name = format!("{}-{}", artifact.artifact_id, artifact.version);
    if !artifact.classifier.is_empty() {
        name.push('-');
        name.push_str(&artifact.classifier);
    }
    if !artifact.extension.is_empty() {
        name.push('.');
        name.push_str(&artifact.extension);
    }
    name
}

/// `group/path/artifactId/baseVersion/`
#[must_use]
pub fn version_directory(artifact: &ArtifactCoordinate) -> String {
    format!(
        "{}/{}/{}/",
        group_path(&artifact.group_id),
        artifact.artifact_id,
        artifact.base_version()
    )
}

#[must_use]
pub fn artifact_path(artifact: &ArtifactCoordinate) -> String {
    format!(
        "{}{}",
        version_directory(artifact),
        artifact_file_name(artifact)
    )
}

/// Directory holding metadata for `groupId:artifactId`, or for one version when given.
#[must_use]
pub fn metadata_directory(group_id: &str, artifact_id: &str, version: Option<&str>) -> String {
    match version {
        Some(version) => format!("{}/{artifact_id}/{version}/", group_path(group_id)),
        None => format!("{}/{artifact_id}/", group_path(group_id)),
    }
}

/// Remote metadata resource, e.g. `org/example/demo/maven-metadata.xml`.
#[must_use]
pub fn remote_metadata_path(group_id: &str, artifact_id: &str, version: Option<&str>) -> String {
    format!(
        "{}{METADATA_FILE_NAME}",
        metadata_directory(group_id, artifact_id, version)
    )
}

/// Local copy of a repository's metadata, e.g. `org/example/demo/maven-metadata-central.xml`.
#[must_use]
pub fn local_metadata_path(
    group_id: &str,
    artifact_id: &str,
    version: Option<&str>,
    repository_id: &str,
) -> String {
    format!(
        "{}maven-metadata-{repository_id}.xml",
        metadata_directory(group_id, artifact_id, version)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_coordinates_to_default_layout() {
        let jar: ArtifactCoordinate = "org.example.sub:demo:1.2".parse().unwrap();
        assert_eq!(artifact_path(&jar), "org/example/sub/demo/1.2/demo-1.2.jar");

        let sources: ArtifactCoordinate = "org.example:demo:jar:sources:1.2".parse().unwrap();
        assert_eq!(
            artifact_path(&sources),
            "org/example/demo/1.2/demo-1.2-sources.jar"
        );
    }

    #[test]
    fn timestamped_snapshots_live_in_base_version_directory() {
        let snapshot: ArtifactCoordinate = "org.example:demo:1.0-20240101.120000-3".parse().unwrap();
        assert_eq!(
            artifact_path(&snapshot),
            "org/example/demo/1.0-SNAPSHOT/demo-1.0-20240101.120000-3.jar"
        );
    }

    #[test]
    fn metadata_paths() {
        assert_eq!(
            remote_metadata_path("org.example", "demo", None),
            "org/example/demo/maven-metadata.xml"
        );
        assert_eq!(
            local_metadata_path("org.example", "demo", Some("1.0-SNAPSHOT"), "central"),
            "org/example/demo/1.0-SNAPSHOT/maven-metadata-central.xml"
        );
    }
}
