//! Native extension loading for archive-packaged applications.
//!
//! When an application ships as a single archive instead of an unpacked
//! directory tree, its native extension modules cannot be `dlopen`ed in
//! place. This crate resolves, for a given module name, whether the bytes
//! live on disk or inside the archive; in the archive case it copies the
//! entry into an anonymous close-on-exec memory file and loads the library
//! from that file's `/proc` path, so nothing is ever written to persistent
//! disk. It provides:
//!
//! - Loader contexts ([`LoaderContext`]) describing where the caller was
//!   itself loaded from
//! - Extension loading ([`resolve_extension`]) with explicit ownership of
//!   the library handle and its keep-alive memory file
//! - Access to arbitrary bundled files ([`expose_file`]) through an
//!   openable path
//! - Anonymous memory-backed files ([`MemoryFile`]) built on
//!   `memfd_create(2)`

#[cfg(not(target_os = "linux"))]
compile_error!("zipext requires Linux: memory-backed loading uses memfd_create(2)");

mod archive;
pub mod context;
pub mod error;
pub mod loader;
pub mod memfile;
pub mod resolver;

pub use context::LoaderContext;
pub use error::ResolveError;
pub use loader::{Library, LoadError};
pub use memfile::{MemoryFile, MemoryFileFlags};
pub use resolver::{expose_file, resolve_extension, ExposedFile, LoadedExtension};
