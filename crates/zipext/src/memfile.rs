//! Anonymous memory-backed files.
//!
//! A memory file is created with `memfd_create(2)` and carries a
//! `/proc/<pid>/fd/<fd>` path, so facilities that only take file names (the
//! dynamic loader in particular) can open its content without anything ever
//! touching persistent disk. The backing memory lives until the last
//! descriptor referring to it is closed.

use std::ffi::CString;
use std::fs::File;
use std::io::{self, Write};
use std::os::fd::{AsRawFd, FromRawFd, RawFd};
use std::path::{Path, PathBuf};

/// Creation flags for [`MemoryFile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryFileFlags {
    close_on_exec: bool,
    allow_sealing: bool,
}

impl MemoryFileFlags {
    /// No flags set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep the descriptor out of child processes spawned after creation.
    pub fn close_on_exec(mut self, yes: bool) -> Self {
        self.close_on_exec = yes;
        self
    }

    /// Permit sealing operations (`F_ADD_SEALS`) on the descriptor.
    pub fn allow_sealing(mut self, yes: bool) -> Self {
        self.allow_sealing = yes;
        self
    }

    fn to_memfd(self) -> libc::c_uint {
        let mut out = 0;
        if self.close_on_exec {
            out |= libc::MFD_CLOEXEC;
        }
        if self.allow_sealing {
            out |= libc::MFD_ALLOW_SEALING;
        }
        out
    }
}

/// An anonymous in-memory file with a filesystem-visible path.
pub struct MemoryFile {
    file: File,
    path: PathBuf,
}

impl MemoryFile {
    /// Create a new memory file tagged with `name`.
    ///
    /// The name shows up in `/proc/<pid>/fd` for diagnostics; it does not
    /// have to be unique.
    pub fn create(name: &str, flags: MemoryFileFlags) -> io::Result<Self> {
        let c_name = CString::new(name).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("memory file name contains NUL: {:?}", name),
            )
        })?;

        let fd = unsafe { libc::memfd_create(c_name.as_ptr(), flags.to_memfd()) };
        if fd < 0 {
            let err = io::Error::last_os_error();
            log::error!("cannot create memory fd for name {:?}: {}", name, err);
            return Err(err);
        }

        // The proc path must name this exact descriptor number, so the
        // descriptor is wrapped as-is and never renumbered afterwards.
        let file = unsafe { File::from_raw_fd(fd) };
        let path = PathBuf::from(format!("/proc/{}/fd/{}", std::process::id(), fd));

        Ok(MemoryFile { file, path })
    }

    /// Path under which the content can be opened by name.
    ///
    /// Valid only within this process and only while the descriptor stays
    /// open.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Duplicate the descriptor.
    ///
    /// The clone shares the backing memory but owns an independent
    /// descriptor with its own proc path; either can be closed without
    /// affecting the other.
    pub fn try_clone(&self) -> io::Result<MemoryFile> {
        let file = self.file.try_clone()?;
        let path = PathBuf::from(format!(
            "/proc/{}/fd/{}",
            std::process::id(),
            file.as_raw_fd()
        ));
        Ok(MemoryFile { file, path })
    }

    /// Give up the path and hand out the underlying file.
    pub fn into_file(self) -> File {
        self.file
    }
}

impl Write for MemoryFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl AsRawFd for MemoryFile {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

impl std::fmt::Debug for MemoryFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryFile")
            .field("fd", &self.file.as_raw_fd())
            .field("path", &self.path)
            .finish()
    }
}
