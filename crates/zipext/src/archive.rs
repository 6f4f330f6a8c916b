//! Entry lookup and extraction for the bundled archive.
//!
//! The archive is any random-access zip container; entries are addressed by
//! their path relative to the tree the archive was built from, always with
//! forward slashes.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::ResolveError;

/// Compute the entry name for `filename` located in directory `root`, where
/// the archive was built from the tree rooted at `archive_path`.
///
/// When `root` is the archive root itself the entry name is `filename`
/// alone; a `./` prefix would produce a key no archive contains.
pub(crate) fn entry_name(
    root: &Path,
    archive_path: &Path,
    filename: &str,
) -> Result<String, ResolveError> {
    let relative = root
        .strip_prefix(archive_path)
        .map_err(|_| ResolveError::OutsideArchive {
            path: root.to_path_buf(),
            archive: archive_path.to_path_buf(),
        })?;

    if relative.as_os_str().is_empty() {
        return Ok(filename.to_string());
    }

    let mut name = String::new();
    for component in relative.components() {
        name.push_str(&component.as_os_str().to_string_lossy());
        name.push('/');
    }
    name.push_str(filename);
    Ok(name)
}

/// Read the decompressed bytes of `entry` out of the archive.
pub(crate) fn read_entry(archive_path: &Path, entry: &str) -> Result<Vec<u8>, ResolveError> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file).map_err(|source| ResolveError::Archive {
        archive: archive_path.to_path_buf(),
        source,
    })?;

    let mut entry_file = match archive.by_name(entry) {
        Ok(f) => f,
        Err(ZipError::FileNotFound) => {
            return Err(ResolveError::ArchiveEntryNotFound {
                archive: archive_path.to_path_buf(),
                entry: entry.to_string(),
            })
        }
        Err(source) => {
            return Err(ResolveError::Archive {
                archive: archive_path.to_path_buf(),
                source,
            })
        }
    };

    let mut buf = Vec::with_capacity(entry_file.size() as usize);
    entry_file.read_to_end(&mut buf)?;
    Ok(buf)
}
