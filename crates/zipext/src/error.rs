//! Error types for extension and file resolution.

use std::path::PathBuf;
use thiserror::Error;

use crate::loader::LoadError;

/// Errors that can occur while resolving an extension or bundled file.
///
/// Resolution is one-shot and deterministic; every failure surfaces
/// immediately and nothing is retried. A memory-backed file created before
/// a later step fails is released on the failure path.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The archive has no entry under the computed name
    #[error("archive {archive} has no entry {entry:?}")]
    ArchiveEntryNotFound {
        /// Path of the archive that was searched
        archive: PathBuf,
        /// Entry name that was looked up
        entry: String,
    },

    /// Disk or descriptor I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The archive could not be opened or is malformed
    #[error("cannot read archive {archive}: {source}")]
    Archive {
        /// Path of the offending archive
        archive: PathBuf,
        /// Underlying container error
        source: zip::result::ZipError,
    },

    /// The dynamic loader rejected the resolved source
    #[error(transparent)]
    Load(#[from] LoadError),

    /// The reference file does not live inside the archive tree
    #[error("path {path} is not inside archive tree {archive}")]
    OutsideArchive {
        /// Directory that was being resolved
        path: PathBuf,
        /// Root the archive was built from
        archive: PathBuf,
    },
}
