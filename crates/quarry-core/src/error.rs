use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("invalid version specification {spec:?}: {reason}")]
    InvalidSpecification { spec: String, reason: String },
}

impl VersionError {
    pub(crate) fn invalid(spec: &str, reason: impl Into<String>) -> Self {
        Self::InvalidSpecification {
            spec: spec.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinateError {
    #[error("bad artifact coordinates {0:?}, expected format <groupId>:<artifactId>[:<extension>[:<classifier>]]:<version>")]
    Malformed(String),

    #[error("artifact coordinate {coordinate:?} has an empty {field}")]
    EmptyField {
        coordinate: String,
        field: &'static str,
    },

    #[error("invalid {field} {value:?}: {reason}")]
    InvalidField {
        field: &'static str,
        value: String,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("invalid repository url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("repository id must not be empty")]
    EmptyId,
}
