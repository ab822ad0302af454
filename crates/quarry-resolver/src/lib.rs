//! Maven dependency resolution on top of the Quarry local repository and transports.
//!
//! [`ArtifactRepositoryManager`] is the entry point. It reads POMs (with parents, profiles,
//! properties and imported BOMs), lists versions from repository metadata, collects the
//! mediated dependency graph and resolves each node to a file in the local repository.

mod collector;
mod error;
mod manager;
pub mod metadata;
pub mod model;
pub mod pom;
pub mod profile;
mod session;
mod xml;

pub use crate::collector::DependencyNode;
pub use crate::error::{ErrorKind, ResolutionError, Result};
pub use crate::manager::{ArtifactRepositoryManager, ResolvedArtifact};
pub use crate::profile::{
    ActivationContext, DeterministicProfileActivator, FileProfileActivator,
    JdkVersionProfileActivator, OperatingSystemProfileActivator, ProfileActivator,
    PropertyProfileActivator,
};
