//! Dynamic library loading.
//!
//! Thin wrapper over `dlopen`/`dlsym` used as the final step of extension
//! resolution. The handle unloads the library on drop, so whoever owns it
//! decides how long the extension's code stays mapped.

use std::ffi::{CStr, CString};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during library loading
#[derive(Debug, Error)]
pub enum LoadError {
    /// The loader rejected the source (missing file, bad format, ABI
    /// mismatch)
    #[error("cannot load library {path}: {reason}")]
    Open {
        /// Path that was attempted
        path: String,
        /// Loader diagnostic from `dlerror`
        reason: String,
    },

    /// Symbol not found in library
    #[error("symbol not found: {symbol} in {library}")]
    SymbolNotFound {
        /// Symbol name that was not found
        symbol: String,
        /// Library path
        library: String,
    },

    /// Path or symbol name not representable for the loader
    #[error("invalid load path or name: {0}")]
    InvalidPath(String),
}

/// An open dynamic library handle.
pub struct Library {
    handle: *mut std::ffi::c_void,
    path: String,
}

impl Library {
    /// Load a dynamic library from the given path.
    ///
    /// Resolves all symbols immediately (`RTLD_NOW`) and keeps them out of
    /// the global namespace (`RTLD_LOCAL`). The path may name a regular
    /// file or a `/proc/<pid>/fd/<fd>` pseudo-file; the loader may map the
    /// content lazily, so the underlying descriptor has to stay open for
    /// the lifetime of the handle.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let path_ref = path.as_ref();
        let path_str = path_ref
            .to_str()
            .ok_or_else(|| LoadError::InvalidPath(format!("{:?}", path_ref)))?;

        let c_path = CString::new(path_str)
            .map_err(|_| LoadError::InvalidPath(path_str.to_string()))?;

        let handle = unsafe { libc::dlopen(c_path.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL) };

        if handle.is_null() {
            return Err(LoadError::Open {
                path: path_str.to_string(),
                reason: last_dl_error(),
            });
        }

        Ok(Library {
            handle,
            path: path_str.to_string(),
        })
    }

    /// Get a function or object pointer by symbol name.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    /// - The symbol's actual signature matches the type `T`
    /// - The library remains loaded while the symbol is in use
    pub unsafe fn symbol<T>(&self, name: &str) -> Result<T, LoadError> {
        let c_name =
            CString::new(name).map_err(|_| LoadError::InvalidPath(name.to_string()))?;

        // Clear any stale error state before the lookup
        libc::dlerror();

        let symbol = libc::dlsym(self.handle, c_name.as_ptr());

        let err_ptr = libc::dlerror();
        if !err_ptr.is_null() {
            let reason = CStr::from_ptr(err_ptr).to_string_lossy().into_owned();
            return Err(LoadError::SymbolNotFound {
                symbol: name.to_string(),
                library: format!("{}: {}", self.path, reason),
            });
        }

        if symbol.is_null() {
            return Err(LoadError::SymbolNotFound {
                symbol: name.to_string(),
                library: self.path.clone(),
            });
        }

        Ok(std::mem::transmute_copy(&symbol))
    }

    /// Path this library was loaded from.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Drop for Library {
    fn drop(&mut self) {
        unsafe {
            libc::dlclose(self.handle);
        }
    }
}

// The handle is only ever passed to dlsym/dlclose, both thread-safe.
unsafe impl Send for Library {}
unsafe impl Sync for Library {}

impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library").field("path", &self.path).finish()
    }
}

fn last_dl_error() -> String {
    unsafe {
        let err_ptr = libc::dlerror();
        if err_ptr.is_null() {
            "unknown error".to_string()
        } else {
            CStr::from_ptr(err_ptr).to_string_lossy().into_owned()
        }
    }
}
