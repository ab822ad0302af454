use std::ffi::OsString;
use std::fs::{self, File};
use std::io;
use std::path::Path;

/// Removes a stale tracking or part file; a file that is already gone counts as removed.
pub(crate) fn remove_file_best_effort(path: &Path, reason: &'static str) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(err) if err.kind() == io::ErrorKind::NotFound => true,
        Err(err) => {
            tracing::debug!(
                target = "quarry.local",
                path = %path.display(),
                reason,
                error = %err,
                "failed to remove file"
            );
            false
        }
    }
}

/// Writes `dest` through a `.<name>.*.part` file in the same directory, then renames it over
/// `dest`.
///
/// Downloads and tracking files go through here so a reader sees either the previous file or
/// the complete new one. When `write` or the rename fails the part file is deleted and `dest`
/// keeps its previous contents.
pub fn write_replacing(
    dest: &Path,
    write: impl FnOnce(&mut File) -> io::Result<()>,
) -> io::Result<()> {
    let parent = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let Some(name) = dest.file_name() else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} does not name a file", dest.display()),
        ));
    };
    fs::create_dir_all(parent)?;

    let mut prefix = OsString::from(".");
    prefix.push(name);
    prefix.push(".");
    let mut part = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".part")
        .tempfile_in(parent)?;
    write(part.as_file_mut())?;
    part.as_file().sync_all()?;
    part.persist(dest).map_err(|err| err.error)?;
    Ok(())
}
