use fs2::FileExt as _;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

/// Table of in-process mutexes keyed by canonical path.
///
/// Advisory file locks don't reliably exclude threads of the same process, so every tracking
/// file access also goes through the mutex for its path. Entries are created on first use and
/// never removed.
#[derive(Debug, Default)]
pub struct PathLocks {
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl PathLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The table shared by every tracking file manager in this process.
    pub fn global() -> &'static PathLocks {
        static GLOBAL: OnceLock<PathLocks> = OnceLock::new();
        GLOBAL.get_or_init(PathLocks::new)
    }

    /// Returns the mutex guarding `path`, keyed by its canonical form.
    pub fn lock_for(&self, path: &Path) -> Arc<Mutex<()>> {
        let key = canonical_path(path);
        let mut map = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(map.entry(key).or_default())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Canonicalize `path` for use as a lock key.
///
/// Tracking files usually don't exist yet when they are first updated, so this falls back to
/// the canonical parent joined with the file name, and finally to the absolute path.
pub fn canonical_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = dunce::canonicalize(path) {
        return canonical;
    }

    if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
        let parent = if parent.as_os_str().is_empty() {
            Path::new(".")
        } else {
            parent
        };
        if let Ok(parent) = dunce::canonicalize(parent) {
            return parent.join(name);
        }
    }

    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Holds the in-process mutex for a tracking file plus an advisory lock on its `.lock`
/// sibling.
///
/// Tracking files are replaced by rename, so the lock lives on a separate file that is never
/// replaced.
pub(crate) struct TrackingLock<'a> {
    file: File,
    _guard: MutexGuard<'a, ()>,
}

impl<'a> TrackingLock<'a> {
    pub(crate) fn exclusive(mutex: &'a Mutex<()>, tracking_file: &Path) -> std::io::Result<Self> {
        let guard = mutex
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(lock_file_path(tracking_file))?;
        file.lock_exclusive()?;
        Ok(Self {
            file,
            _guard: guard,
        })
    }
}

impl Drop for TrackingLock<'_> {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

fn lock_file_path(tracking_file: &Path) -> PathBuf {
    let mut name = tracking_file.as_os_str().to_os_string();
    name.push(".lock");
    PathBuf::from(name)
}
