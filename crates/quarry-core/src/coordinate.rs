use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoordinateError;
use crate::kind::ArtifactKind;

const SNAPSHOT: &str = "SNAPSHOT";

/// `(groupId, artifactId, classifier, extension, version)` identifying one resolvable file.
///
/// `version` is either a concrete version or, before collection, a version constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArtifactCoordinate {
    pub group_id: String,
    pub artifact_id: String,
    pub classifier: String,
    pub extension: String,
    pub version: String,
}

impl ArtifactCoordinate {
    pub fn new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        classifier: impl Into<String>,
        extension: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            classifier: classifier.into(),
            extension: extension.into(),
            version: version.into(),
        }
    }

    /// Like [`ArtifactCoordinate::new`], but rejects fields that can't be mapped onto a
    /// repository path.
    pub fn try_new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        classifier: impl Into<String>,
        extension: impl Into<String>,
        version: impl Into<String>,
    ) -> Result<Self, CoordinateError> {
        let coordinate = Self::new(group_id, artifact_id, classifier, extension, version);
        coordinate.validate()?;
        Ok(coordinate)
    }

    pub fn of_kind(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        version: impl Into<String>,
        kind: ArtifactKind,
    ) -> Self {
        Self::new(
            group_id,
            artifact_id,
            kind.classifier(),
            kind.extension(),
            version,
        )
    }

    pub fn validate(&self) -> Result<(), CoordinateError> {
        Self::validate_key(&self.group_id, &self.artifact_id)?;
        Self::validate_version(&self.version)?;
        validate_segment("classifier", &self.classifier)?;
        validate_segment("extension", &self.extension)
    }

    /// Group and artifact ids are limited to `[A-Za-z0-9_\-.]+`.
    ///
    /// Every `.`-separated part of a group id becomes a directory, so none may be empty.
    pub fn validate_key(group_id: &str, artifact_id: &str) -> Result<(), CoordinateError> {
        validate_id("groupId", group_id)?;
        if group_id.split('.').any(str::is_empty) {
            return Err(invalid("groupId", group_id, "has an empty path segment"));
        }
        validate_id("artifactId", artifact_id)?;
        if matches!(artifact_id, "." | "..") {
            return Err(invalid("artifactId", artifact_id, "is not a directory name"));
        }
        Ok(())
    }

    /// Versions (and constraints) may be empty but must stay a single path segment.
    pub fn validate_version(version: &str) -> Result<(), CoordinateError> {
        validate_segment("version", version)
    }

    #[must_use]
    pub fn with_kind(&self, kind: ArtifactKind) -> Self {
        Self {
            classifier: kind.classifier().to_string(),
            extension: kind.extension().to_string(),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_version(&self, version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn kind(&self) -> Option<ArtifactKind> {
        ArtifactKind::find(&self.classifier, &self.extension)
    }

    /// `groupId:artifactId`, the key used for exclusions and conflict detection.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}:{}", self.group_id, self.artifact_id)
    }

    /// Key identifying the same file across versions.
    #[must_use]
    pub fn versionless_id(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.group_id, self.artifact_id, self.extension, self.classifier
        )
    }

    #[must_use]
    pub fn is_snapshot(&self) -> bool {
        is_snapshot_version(&self.version)
    }

    /// The version directory name: timestamped snapshots collapse to `X-SNAPSHOT`.
    #[must_use]
    pub fn base_version(&self) -> String {
        base_version(&self.version)
    }
}

fn invalid(field: &'static str, value: &str, reason: &'static str) -> CoordinateError {
    CoordinateError::InvalidField {
        field,
        value: value.to_string(),
        reason,
    }
}

fn validate_id(field: &'static str, value: &str) -> Result<(), CoordinateError> {
    if value.is_empty() {
        return Err(invalid(field, value, "is empty"));
    }
    if !value
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.'))
    {
        return Err(invalid(field, value, "may only contain A-Z, a-z, 0-9, '_', '-' and '.'"));
    }
    Ok(())
}

fn validate_segment(field: &'static str, value: &str) -> Result<(), CoordinateError> {
    if matches!(value, "." | "..") {
        return Err(invalid(field, value, "is not a file name"));
    }
    if value
        .chars()
        .any(|c| matches!(c, '/' | '\\' | ':') || c.is_control())
    {
        return Err(invalid(field, value, "contains a path separator or control character"));
    }
    Ok(())
}

pub(crate) fn is_snapshot_version(version: &str) -> bool {
    version.ends_with(SNAPSHOT) || timestamped_snapshot_prefix(version).is_some()
}

fn base_version(version: &str) -> String {
    match timestamped_snapshot_prefix(version) {
        Some(prefix) => format!("{prefix}-{SNAPSHOT}"),
        None => version.to_string(),
    }
}

/// For `1.0-20240101.101010-3`, returns `1.0`.
fn timestamped_snapshot_prefix(version: &str) -> Option<&str> {
    // <prefix>-<yyyyMMdd>.<HHmmss>-<buildNumber>
    let (rest, build) = version.rsplit_once('-')?;
    if build.is_empty() || !build.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let (prefix, stamp) = rest.rsplit_once('-')?;
    let (date, time) = stamp.split_once('.')?;
    let digits = |s: &str, len: usize| s.len() == len && s.bytes().all(|b| b.is_ascii_digit());
    if prefix.is_empty() || !digits(date, 8) || !digits(time, 6) {
        return None;
    }
    Some(prefix)
}

impl fmt::Display for ArtifactCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.extension)?;
        if !self.classifier.is_empty() {
            write!(f, ":{}", self.classifier)?;
        }
        write!(f, ":{}", self.version)
    }
}

impl FromStr for ArtifactCoordinate {
    type Err = CoordinateError;

    /// Parses `g:a:v`, `g:a:ext:v` or `g:a:ext:classifier:v`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        let (group_id, artifact_id, extension, classifier, version) = match parts.as_slice() {
            [g, a, v] => (*g, *a, "jar", "", *v),
            [g, a, e, v] => (*g, *a, *e, "", *v),
            [g, a, e, c, v] => (*g, *a, *e, *c, *v),
            _ => return Err(CoordinateError::Malformed(s.to_string())),
        };
        for (field, value) in [("groupId", group_id), ("artifactId", artifact_id)] {
            if value.is_empty() {
                return Err(CoordinateError::EmptyField {
                    coordinate: s.to_string(),
                    field,
                });
            }
        }
        Self::try_new(
            group_id,
            artifact_id,
            classifier,
            if extension.is_empty() { "jar" } else { extension },
            version,
        )
    }
}
