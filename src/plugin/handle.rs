//! Scoped ownership of one dynamically loaded library.

use crate::error::{Error, Result};
use libloading::Library;
use std::path::{Path, PathBuf};

/// An open plugin library.
///
/// The library is unloaded by [`close`](Self::close) or, at the latest, when
/// the handle is dropped. Function pointers obtained through
/// [`lookup`](Self::lookup) are only valid while the handle is open.
pub struct PluginHandle {
    path: PathBuf,
    library: Option<Library>,
}

impl PluginHandle {
    /// Load the library at `path`.
    ///
    /// A load failure is logged with the platform loader's diagnostic and
    /// returned as [`Error::PluginLoad`].
    ///
    /// # Safety
    ///
    /// Loading a library runs its initialisation routines. The library must be
    /// trusted and must implement the frame-processing ABI.
    pub unsafe fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // SAFETY: Caller guarantees the library is trusted.
        match unsafe { Library::new(path) } {
            Ok(library) => {
                tracing::debug!(path = %path.display(), "plugin library loaded");
                Ok(Self {
                    path: path.to_path_buf(),
                    library: Some(library),
                })
            }
            Err(e) => {
                let reason = e.to_string();
                tracing::warn!(path = %path.display(), reason = %reason, "failed to load plugin library");
                Err(Error::PluginLoad {
                    path: path.to_path_buf(),
                    reason,
                })
            }
        }
    }

    /// Resolve an exported symbol and copy it out of the library.
    ///
    /// # Safety
    ///
    /// `T` must match the actual type of the exported symbol, and the returned
    /// value must not be used after the handle is closed.
    pub unsafe fn lookup<T: Copy>(&self, symbol: &str) -> Result<T> {
        let library = self.library.as_ref().ok_or_else(|| Error::PluginLoad {
            path: self.path.clone(),
            reason: "library already closed".to_string(),
        })?;

        // SAFETY: Caller guarantees `T` matches the exported symbol.
        let resolved = unsafe { library.get::<T>(symbol.as_bytes()) };
        match resolved {
            Ok(sym) => Ok(*sym),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    symbol = symbol,
                    reason = %e,
                    "plugin symbol not found"
                );
                Err(Error::SymbolNotFound {
                    symbol: symbol.to_string(),
                })
            }
        }
    }

    /// Unload the library. Closing an already closed handle does nothing.
    pub fn close(&mut self) {
        if let Some(library) = self.library.take() {
            if let Err(e) = library.close() {
                tracing::warn!(path = %self.path.display(), reason = %e, "failed to unload plugin library");
            } else {
                tracing::debug!(path = %self.path.display(), "plugin library unloaded");
            }
        }
    }

    /// Whether the library is still loaded.
    pub fn is_open(&self) -> bool {
        self.library.is_some()
    }

    /// Path the library was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(all(test, unix))]
impl PluginHandle {
    /// A handle on the running test binary, which is itself a loadable image.
    pub(crate) fn current_process() -> Self {
        Self {
            path: PathBuf::from("<self>"),
            library: Some(libloading::os::unix::Library::this().into()),
        }
    }
}

impl Drop for PluginHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for PluginHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginHandle")
            .field("path", &self.path)
            .field("open", &self.is_open())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_open_nonexistent_library() {
        let result = unsafe { PluginHandle::open("/nonexistent/libnothing_here.so") };
        match result {
            Err(Error::PluginLoad { path, reason }) => {
                assert_eq!(path, PathBuf::from("/nonexistent/libnothing_here.so"));
                assert!(!reason.is_empty());
            }
            other => panic!("expected PluginLoad, got {other:?}"),
        }
    }

    #[test]
    fn test_open_non_library_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"definitely not an ELF, Mach-O or PE image").unwrap();

        let result = unsafe { PluginHandle::open(file.path()) };
        assert!(matches!(result, Err(Error::PluginLoad { .. })));
    }

    #[test]
    fn test_closed_handle_lookup_fails() {
        let mut handle = PluginHandle {
            path: PathBuf::from("/plugins/libclosed.so"),
            library: None,
        };
        handle.close();
        assert!(!handle.is_open());
        let result = unsafe { handle.lookup::<usize>("processFrame") };
        assert!(matches!(result, Err(Error::PluginLoad { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_double_close_is_harmless() {
        let mut handle = PluginHandle::current_process();
        assert!(handle.is_open());
        handle.close();
        handle.close();
        assert!(!handle.is_open());
    }

    #[cfg(unix)]
    #[test]
    fn test_missing_symbol() {
        let handle = PluginHandle::current_process();
        let result = unsafe { handle.lookup::<usize>("visionflow_no_such_export") };
        assert!(
            matches!(result, Err(Error::SymbolNotFound { ref symbol }) if symbol == "visionflow_no_such_export")
        );
    }
}
