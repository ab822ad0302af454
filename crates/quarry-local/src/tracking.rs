use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use crate::error::{LocalRepositoryError, Result};
use crate::lock::{PathLocks, TrackingLock};
use crate::util::write_replacing;

const TRACKING_FILE_COMMENT: &str =
    "NOTE: This is a Quarry internal implementation file, its format can be changed without prior notice.";

/// Reads and updates the small key/value files kept next to cached artifacts.
pub trait TrackingFileManager: Send + Sync {
    /// Returns `Ok(None)` when the file is missing or can't be opened.
    fn read(&self, path: &Path) -> Result<Option<BTreeMap<String, String>>>;

    /// Applies `updates` (`None` removes the key) and returns the resulting mapping.
    ///
    /// Failing to create the parent directory, take the lock or read the existing file is an
    /// error. A failed write is logged and the merged mapping is still returned; the file on
    /// disk then keeps its previous contents.
    fn update(
        &self,
        path: &Path,
        updates: &BTreeMap<String, Option<String>>,
    ) -> Result<BTreeMap<String, String>>;
}

/// [`TrackingFileManager`] storing ISO-8859-1 `.properties` files.
#[derive(Debug, Clone, Copy)]
pub struct FileTrackingFileManager {
    locks: &'static PathLocks,
}

impl Default for FileTrackingFileManager {
    fn default() -> Self {
        Self {
            locks: PathLocks::global(),
        }
    }
}

impl FileTrackingFileManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a dedicated lock table instead of the process-wide one.
    #[must_use]
    pub fn with_locks(locks: &'static PathLocks) -> Self {
        Self { locks }
    }
}

impl TrackingFileManager for FileTrackingFileManager {
    fn read(&self, path: &Path) -> Result<Option<BTreeMap<String, String>>> {
        let mutex = self.locks.lock_for(path);
        let _guard = mutex
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(bytes) = read_existing(path)? else {
            return Ok(None);
        };
        Ok(Some(quarry_properties::parse_latin1(&bytes).into_map()))
    }

    fn update(
        &self,
        path: &Path,
        updates: &BTreeMap<String, Option<String>>,
    ) -> Result<BTreeMap<String, String>> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| {
                LocalRepositoryError::TrackingDirectory {
                    path: parent.to_path_buf(),
                    source,
                }
            })?;
        }

        let mutex = self.locks.lock_for(path);
        let _lock = TrackingLock::exclusive(&mutex, path).map_err(|source| {
            LocalRepositoryError::TrackingLock {
                path: path.to_path_buf(),
                source,
            }
        })?;

        let mut props = match read_existing(path)? {
            Some(bytes) => quarry_properties::parse_latin1(&bytes).into_map(),
            None => BTreeMap::new(),
        };
        apply_updates(&mut props, updates);

        let encoded = quarry_properties::store_latin1(&props, &[TRACKING_FILE_COMMENT]);
        if let Err(err) = write_replacing(path, |file| file.write_all(&encoded)) {
            tracing::warn!(
                target = "quarry.local",
                path = %path.display(),
                error = %err,
                "failed to update tracking file"
            );
        }
        Ok(props)
    }
}

/// The file's bytes, or `None` when it doesn't exist or can't be opened.
fn read_existing(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) if err.kind() == io::ErrorKind::PermissionDenied => {
            tracing::debug!(
                target = "quarry.local",
                path = %path.display(),
                error = %err,
                "tracking file is not readable"
            );
            Ok(None)
        }
        Err(source) => Err(LocalRepositoryError::TrackingRead {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn apply_updates(props: &mut BTreeMap<String, String>, updates: &BTreeMap<String, Option<String>>) {
    for (key, value) in updates {
        match value {
            Some(value) => {
                props.insert(key.clone(), value.clone());
            }
            None => {
                props.remove(key);
            }
        }
    }
}
