//! Resolution of native extensions and bundled files.
//!
//! Both operations share the same branch: compute the directory of the
//! reference file, then either use it directly on disk or pull the matching
//! archive entry into an anonymous memory-backed file and use that file's
//! path instead. Each call is self-contained; nothing is cached or retained
//! between invocations beyond what the returned value owns.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::archive;
use crate::context::{root_of, LoaderContext};
use crate::error::ResolveError;
use crate::loader::{Library, LoadError};
use crate::memfile::{MemoryFile, MemoryFileFlags};

/// A live native extension module.
///
/// Owns both the library handle and, for archive loads, the memory file the
/// library was loaded out of. The loader may map the file lazily, so the
/// backing descriptor must not close before the library unloads; dropping
/// this value tears both down in that order.
#[derive(Debug)]
pub struct LoadedExtension {
    name: String,
    // Declared before `backing` so the mapping goes away before its
    // descriptor does.
    library: Library,
    backing: Option<MemoryFile>,
    location: PathBuf,
}

impl LoadedExtension {
    /// Name the extension was bound under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The open library handle.
    pub fn library(&self) -> &Library {
        &self.library
    }

    /// Look up a symbol in the extension.
    ///
    /// # Safety
    ///
    /// Same contract as [`Library::symbol`]: the type `T` must match the
    /// symbol's actual signature, and the extension must outlive any use of
    /// the returned value.
    pub unsafe fn symbol<T>(&self, name: &str) -> Result<T, LoadError> {
        self.library.symbol(name)
    }

    /// Reported source location: the directory of the reference file, not
    /// the path the bytes were actually loaded from. Archive and disk loads
    /// report the same shape of location this way.
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Memory file backing an archive load, if any.
    pub fn backing_file(&self) -> Option<&MemoryFile> {
        self.backing.as_ref()
    }

    /// Split into the library handle and its keep-alive file.
    ///
    /// The caller takes over the lifetime coupling: the memory file must
    /// outlive the library.
    pub fn into_parts(self) -> (Library, Option<MemoryFile>) {
        (self.library, self.backing)
    }
}

/// A bundled file made reachable through a filesystem path.
#[derive(Debug)]
pub struct ExposedFile {
    path: PathBuf,
    backing: Option<MemoryFile>,
}

impl ExposedFile {
    /// Path under which the file can be opened.
    ///
    /// For archive-mode resolutions this is the memory file's proc path and
    /// stays valid only while the backing handle is held.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the file was extracted out of an archive.
    pub fn is_extracted(&self) -> bool {
        self.backing.is_some()
    }

    /// The owned memory file, when one was created.
    pub fn backing_file(&self) -> Option<&MemoryFile> {
        self.backing.as_ref()
    }

    /// Take the backing memory file, leaving the path.
    pub fn into_backing_file(self) -> Option<MemoryFile> {
        self.backing
    }
}

/// Load the native extension `module_filename` as `name`.
///
/// `reference_file` is a path inside the tree the archive (if any) was
/// built from; its directory is the root the module file name is resolved
/// against. In archive mode the entry's decompressed bytes are copied into
/// a close-on-exec memory file tagged with `name` and the library is loaded
/// from its proc path; on disk the library is loaded in place.
pub fn resolve_extension(
    context: &LoaderContext,
    name: &str,
    reference_file: &Path,
    module_filename: &str,
) -> Result<LoadedExtension, ResolveError> {
    let root = root_of(reference_file);

    let (source, backing) = match context.archive_path() {
        Some(archive_path) => {
            let flags = MemoryFileFlags::new().close_on_exec(true);
            let memfile = extract_entry(&archive_path, root, module_filename, name, flags)?;
            (memfile.path().to_path_buf(), Some(memfile))
        }
        None => (root.join(module_filename), None),
    };

    let library = Library::open(&source)?;

    Ok(LoadedExtension {
        name: name.to_string(),
        library,
        backing,
        location: root.to_path_buf(),
    })
}

/// Resolve a bundled non-module file to an openable path.
///
/// Disk mode returns `root/filename` directly with no handle. Archive mode
/// extracts the entry into a memory file tagged with `tag` and returns its
/// proc path together with the owned handle; the path dies with the handle.
pub fn expose_file(
    context: &LoaderContext,
    tag: &str,
    reference_file: &Path,
    filename: &str,
    close_on_exec: bool,
) -> Result<ExposedFile, ResolveError> {
    let root = root_of(reference_file);

    match context.archive_path() {
        Some(archive_path) => {
            let flags = MemoryFileFlags::new().close_on_exec(close_on_exec);
            let memfile = extract_entry(&archive_path, root, filename, tag, flags)?;
            Ok(ExposedFile {
                path: memfile.path().to_path_buf(),
                backing: Some(memfile),
            })
        }
        None => Ok(ExposedFile {
            path: root.join(filename),
            backing: None,
        }),
    }
}

/// Copy an archive entry into a fresh memory file.
fn extract_entry(
    archive_path: &Path,
    root: &Path,
    filename: &str,
    tag: &str,
    flags: MemoryFileFlags,
) -> Result<MemoryFile, ResolveError> {
    let entry = archive::entry_name(root, archive_path, filename)?;
    let bytes = archive::read_entry(archive_path, &entry)?;

    let mut memfile = MemoryFile::create(tag, flags)?;
    memfile.write_all(&bytes)?;

    log::debug!(
        "extracted {} bytes of entry {:?} from {} into {}",
        bytes.len(),
        entry,
        archive_path.display(),
        memfile.path().display()
    );

    Ok(memfile)
}
