//! Loader context: where the calling code was itself loaded from.
//!
//! Code loaded from an unpacked directory tree resolves its extensions
//! against the filesystem. Code loaded out of a bundled archive resolves
//! them against entries of that archive. The context is an explicit value
//! passed into every resolution call; there is no process-wide state.

use std::path::{Path, PathBuf};

/// Describes how the code requesting an extension was itself loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoaderContext {
    /// Caller lives in a plain directory tree on disk.
    FileSystem,

    /// Caller was loaded out of the archive at `prefix/archive_name`.
    Archive {
        /// Directory containing the archive.
        prefix: PathBuf,
        /// Archive file name under `prefix`.
        archive_name: PathBuf,
    },
}

impl LoaderContext {
    /// Context for code loaded from an unpacked directory.
    pub fn filesystem() -> Self {
        LoaderContext::FileSystem
    }

    /// Context for code loaded out of an archive.
    pub fn archive(prefix: impl Into<PathBuf>, archive_name: impl Into<PathBuf>) -> Self {
        LoaderContext::Archive {
            prefix: prefix.into(),
            archive_name: archive_name.into(),
        }
    }

    /// Full path of the backing archive, or `None` in filesystem mode.
    pub fn archive_path(&self) -> Option<PathBuf> {
        match self {
            LoaderContext::FileSystem => None,
            LoaderContext::Archive {
                prefix,
                archive_name,
            } => Some(prefix.join(archive_name)),
        }
    }

    /// Whether this context resolves against an archive.
    pub fn is_archived(&self) -> bool {
        matches!(self, LoaderContext::Archive { .. })
    }
}

/// Directory portion of a reference file path.
///
/// Mirrors `dirname`: a bare file name yields the empty path, which joins
/// transparently with relative module file names.
pub(crate) fn root_of(reference_file: &Path) -> &Path {
    reference_file.parent().unwrap_or_else(|| Path::new(""))
}
