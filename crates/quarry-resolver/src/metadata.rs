//! `maven-metadata.xml`: the version listing for an artifact and the timestamped builds of a
//! snapshot version.

use crate::xml::{child_element, child_text};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub timestamp: Option<String>,
    pub build_number: Option<u32>,
    pub local_copy: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotVersion {
    pub classifier: String,
    pub extension: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub group_id: Option<String>,
    pub artifact_id: Option<String>,
    pub version: Option<String>,
    pub latest: Option<String>,
    pub release: Option<String>,
    pub versions: Vec<String>,
    pub snapshot: Option<Snapshot>,
    pub snapshot_versions: Vec<SnapshotVersion>,
    pub last_updated: Option<String>,
}

impl Metadata {
    pub fn parse(text: &str) -> Result<Self, roxmltree::Error> {
        let doc = roxmltree::Document::parse(text)?;
        let root = doc.root_element();

        let mut metadata = Metadata {
            group_id: child_text(root, "groupId"),
            artifact_id: child_text(root, "artifactId"),
            version: child_text(root, "version"),
            ..Metadata::default()
        };

        let Some(versioning) = child_element(root, "versioning") else {
            return Ok(metadata);
        };
        metadata.latest = child_text(versioning, "latest");
        metadata.release = child_text(versioning, "release");
        metadata.last_updated = child_text(versioning, "lastUpdated");

        if let Some(versions) = child_element(versioning, "versions") {
            metadata.versions = versions
                .children()
                .filter(|n| n.is_element() && n.has_tag_name("version"))
                .filter_map(|n| n.text())
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
        }

        if let Some(snapshot) = child_element(versioning, "snapshot") {
            metadata.snapshot = Some(Snapshot {
                timestamp: child_text(snapshot, "timestamp"),
                build_number: child_text(snapshot, "buildNumber").and_then(|n| n.parse().ok()),
                local_copy: child_text(snapshot, "localCopy").is_some_and(|v| v == "true"),
            });
        }

        if let Some(snapshot_versions) = child_element(versioning, "snapshotVersions") {
            metadata.snapshot_versions = snapshot_versions
                .children()
                .filter(|n| n.is_element() && n.has_tag_name("snapshotVersion"))
                .filter_map(|n| {
                    Some(SnapshotVersion {
                        classifier: child_text(n, "classifier").unwrap_or_default(),
                        extension: child_text(n, "extension")?,
                        value: child_text(n, "value")?,
                    })
                })
                .collect();
        }

        Ok(metadata)
    }

    /// The timestamped version of a snapshot file, e.g. `1.0-20240101.101010-3` for
    /// `1.0-SNAPSHOT`.
    ///
    /// Prefers the per-file `snapshotVersions` entry and falls back to the legacy
    /// `snapshot` timestamp/build number. `None` means the snapshot was installed locally
    /// or the metadata says nothing useful.
    #[must_use]
    pub fn snapshot_version(
        &self,
        base_version: &str,
        classifier: &str,
        extension: &str,
    ) -> Option<String> {
        if let Some(entry) = self
            .snapshot_versions
            .iter()
            .find(|v| v.classifier == classifier && v.extension == extension)
        {
            return Some(entry.value.clone());
        }

        let snapshot = self.snapshot.as_ref()?;
        if snapshot.local_copy {
            return None;
        }
        let timestamp = snapshot.timestamp.as_deref()?;
        let build_number = snapshot.build_number?;
        let prefix = base_version.strip_suffix("-SNAPSHOT")?;
        Some(format!("{prefix}-{timestamp}-{build_number}"))
    }
}
