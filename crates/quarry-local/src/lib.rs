//! Local Maven-style repository: layout, origin tracking, failure records and strict archive
//! validation.

mod error;
pub mod layout;
mod lock;
mod manager;
mod strict;
mod tracking;
mod update_check;
mod util;

pub use crate::error::{LocalRepositoryError, Result};
pub use crate::lock::{canonical_path, PathLocks};
pub use crate::manager::{EnhancedLocalRepositoryManager, LocalArtifactResult, LocalRepositoryManager};
pub use crate::strict::StrictLocalRepositoryManager;
pub use crate::tracking::{FileTrackingFileManager, TrackingFileManager};
pub use crate::update_check::UpdateCheckManager;
pub use crate::util::write_replacing;
