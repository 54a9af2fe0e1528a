//! Reference-counted cache of loaded plugins.

use super::loader::LoadedPlugin;
use crate::error::Result;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Concurrent map from resolved library path to a shared loaded plugin.
///
/// The lock is held while a missing entry is loaded, so two requests for the
/// same uncached plugin never open the library twice. Evicting an entry only
/// drops the cache's reference; the library unloads once the last pipeline
/// holding it finishes.
#[derive(Default)]
pub struct PluginCache {
    plugins: Mutex<HashMap<PathBuf, Arc<LoadedPlugin>>>,
}

impl PluginCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, Arc<LoadedPlugin>>> {
        // A panic while loading leaves the map itself consistent.
        self.plugins.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the cached plugin for `path`, loading it with `load` on a miss.
    ///
    /// A failed load is not cached.
    pub fn get_or_load<F>(&self, path: &Path, load: F) -> Result<Arc<LoadedPlugin>>
    where
        F: FnOnce(&Path) -> Result<LoadedPlugin>,
    {
        let mut plugins = self.lock();
        if let Some(plugin) = plugins.get(path) {
            tracing::trace!(path = %path.display(), "plugin cache hit");
            return Ok(Arc::clone(plugin));
        }

        let plugin = Arc::new(load(path)?);
        plugins.insert(path.to_path_buf(), Arc::clone(&plugin));
        tracing::debug!(path = %path.display(), cached = plugins.len(), "plugin cached");
        Ok(plugin)
    }

    /// Drop the cache's reference to a plugin. Returns true if it was cached.
    pub fn evict(&self, path: &Path) -> bool {
        self.lock().remove(path).is_some()
    }

    /// Drop every cached reference.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Whether a plugin is cached for `path`.
    pub fn contains(&self, path: &Path) -> bool {
        self.lock().contains_key(path)
    }

    /// Number of cached plugins.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl std::fmt::Debug for PluginCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginCache")
            .field("plugins", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_failed_load_is_not_cached() {
        let cache = PluginCache::new();
        let attempts = AtomicUsize::new(0);
        let path = Path::new("/plugins/libmissing.so");

        for _ in 0..2 {
            let result = cache.get_or_load(path, |p| {
                attempts.fetch_add(1, Ordering::SeqCst);
                // SAFETY: The path does not exist, nothing gets loaded.
                unsafe { LoadedPlugin::load(p) }
            });
            assert!(matches!(result, Err(Error::PluginLoad { .. })));
        }

        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
        assert!(!cache.contains(path));
    }

    #[test]
    fn test_evict_and_clear_on_empty_cache() {
        let cache = PluginCache::new();
        assert!(!cache.evict(Path::new("/plugins/libx.so")));
        cache.clear();
        assert_eq!(cache.len(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_cache_hit_reuses_loaded_plugin() {
        let cache = PluginCache::new();
        let loads = AtomicUsize::new(0);
        let path = Path::new("/plugins/libinvert.so");

        let mut plugins = Vec::new();
        for _ in 0..3 {
            let plugin = cache
                .get_or_load(path, |_| {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok(LoadedPlugin::inverting())
                })
                .unwrap();
            plugins.push(plugin);
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&plugins[0], &plugins[1]));
        assert!(Arc::ptr_eq(&plugins[1], &plugins[2]));
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(path));
    }

    #[cfg(unix)]
    #[test]
    fn test_evicted_plugin_stays_valid_for_holders() {
        use crate::frame::FrameBuffer;
        use crate::graph::NodeParams;
        use crate::processor::{FrameProcessor, NativeProcessor};

        let cache = PluginCache::new();
        let path = Path::new("/plugins/libinvert.so");
        let plugin = cache.get_or_load(path, |_| Ok(LoadedPlugin::inverting())).unwrap();
        let processor = NativeProcessor::new("invert", plugin);

        assert!(cache.evict(path));
        assert!(!cache.contains(path));

        let frame = FrameBuffer::new(vec![0, 255, 10], 1, 1, 3).unwrap();
        let output = processor.apply(&frame, &NodeParams::new()).unwrap().unwrap();
        assert_eq!(output.data, vec![255, 0, 245]);

        // The next request loads afresh.
        let loads = AtomicUsize::new(0);
        cache
            .get_or_load(path, |_| {
                loads.fetch_add(1, Ordering::SeqCst);
                Ok(LoadedPlugin::inverting())
            })
            .unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }
}
