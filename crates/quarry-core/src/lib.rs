//! Core value types shared by every Quarry crate.
//!
//! - [`ArtifactCoordinate`] and the fixed [`ArtifactKind`] vocabulary
//! - Maven [`Version`] ordering and [`VersionConstraint`] parsing
//! - [`RemoteRepository`] descriptors (plus the two built-in well-known repositories)
//! - the [`ProgressConsumer`] callback, the only inbound dependency from a host environment

mod coordinate;
mod error;
mod kind;
mod progress;
mod repository;
mod version;

pub use coordinate::ArtifactCoordinate;
pub use error::{CoordinateError, RepositoryError, VersionError};
pub use kind::ArtifactKind;
pub use progress::{ProgressConsumer, SilentProgress};
pub use repository::{
    Authentication, RemoteRepository, DEFAULT_CONTENT_TYPE, JBOSS_COMMUNITY_REPOSITORY_URL,
    MAVEN_CENTRAL_REPOSITORY_URL,
};
pub use version::{Bound, Version, VersionConstraint, VersionRange};

/// Scope used for every dependency-collection request issued by the resolver.
pub const COMPILE_SCOPE: &str = "compile";
