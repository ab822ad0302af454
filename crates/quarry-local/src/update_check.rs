use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::Result;
use crate::layout::LAST_UPDATED_SUFFIX;
use crate::tracking::TrackingFileManager;
use crate::util::remove_file_best_effort;

/// Records failed download attempts in `<file>.lastUpdated` tracking files.
///
/// Entries are keyed by resource url: `<url>.lastUpdated` holds the attempt time in epoch
/// millis and `<url>.error` the failure message (empty for "not found"). They are kept for
/// diagnostics only and never suppress a later attempt.
#[derive(Clone)]
pub struct UpdateCheckManager {
    tracking: Arc<dyn TrackingFileManager>,
}

impl UpdateCheckManager {
    pub fn new(tracking: Arc<dyn TrackingFileManager>) -> Self {
        Self { tracking }
    }

    fn touch_file(file: &Path) -> PathBuf {
        let mut name = file.as_os_str().to_os_string();
        name.push(LAST_UPDATED_SUFFIX);
        PathBuf::from(name)
    }

    /// Remember that fetching `url` into `file` failed with `error`.
    pub fn record_failure(&self, file: &Path, url: &str, error: Option<&str>) -> Result<()> {
        let updates = BTreeMap::from([
            (format!("{url}.lastUpdated"), Some(now_millis().to_string())),
            (
                format!("{url}.error"),
                Some(error.unwrap_or_default().to_string()),
            ),
        ]);
        self.tracking.update(&Self::touch_file(file), &updates)?;
        Ok(())
    }

    /// The error recorded for `url`, if any. `Some("")` means the resource was not found.
    pub fn last_failure(&self, file: &Path, url: &str) -> Result<Option<String>> {
        Ok(self
            .tracking
            .read(&Self::touch_file(file))?
            .and_then(|mut props| props.remove(&format!("{url}.error"))))
    }

    /// Drop all failure records for `file` after a successful download.
    pub fn clear(&self, file: &Path) {
        remove_file_best_effort(&Self::touch_file(file), "update_check.clear");
    }
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}
