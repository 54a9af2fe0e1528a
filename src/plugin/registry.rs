//! Plugin registry: resolution, loading and optional caching.

use super::cache::PluginCache;
use super::loader::LoadedPlugin;
use super::resolver::PluginResolver;
use crate::error::Result;
use crate::graph::NodeDescriptor;
use crate::processor::{FrameProcessor, NativeProcessor, ProcessorSource};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Hands out native processors for node types backed by plugin libraries.
///
/// Without a cache every request opens the library afresh and the library is
/// unloaded as soon as the node that used it finishes. With a cache one
/// loaded plugin per resolved path is shared across pipeline runs.
pub struct PluginRegistry {
    resolver: PluginResolver,
    cache: Option<PluginCache>,
}

impl PluginRegistry {
    /// Create a registry that loads a fresh plugin for every node.
    pub fn new(resolver: PluginResolver) -> Self {
        Self {
            resolver,
            cache: None,
        }
    }

    /// Create a registry for a plugins directory using the host's naming convention.
    pub fn with_plugins_dir(dir: impl Into<PathBuf>) -> Self {
        Self::new(PluginResolver::new(dir))
    }

    /// Enable caching of loaded plugins across runs.
    pub fn with_cache(mut self) -> Self {
        self.cache = Some(PluginCache::new());
        self
    }

    /// The resolver in use.
    pub fn resolver(&self) -> &PluginResolver {
        &self.resolver
    }

    /// The plugin cache, if caching is enabled.
    pub fn cache(&self) -> Option<&PluginCache> {
        self.cache.as_ref()
    }

    /// Resolve and load the plugin for a type tag.
    pub fn load(&self, type_tag: &str) -> Result<Arc<LoadedPlugin>> {
        let path = self.resolver.resolve(type_tag);
        tracing::debug!(node_type = type_tag, path = %path.display(), "resolving plugin");

        match &self.cache {
            Some(cache) => cache.get_or_load(&path, load_library),
            None => load_library(&path).map(Arc::new),
        }
    }

    /// Drop a cached plugin so the next request reloads it from disk.
    ///
    /// Returns true if the plugin was cached.
    pub fn evict(&self, type_tag: &str) -> bool {
        let path = self.resolver.resolve(type_tag);
        self.cache.as_ref().is_some_and(|cache| cache.evict(&path))
    }
}

fn load_library(path: &Path) -> Result<LoadedPlugin> {
    // SAFETY: Libraries under the configured plugins directory are trusted
    // to implement the frame-processing ABI; a misbehaving plugin is an
    // accepted process-fatal risk.
    unsafe { LoadedPlugin::load(path) }
}

impl ProcessorSource for PluginRegistry {
    fn processor_for(&self, node: &NodeDescriptor) -> Result<Arc<dyn FrameProcessor>> {
        let plugin = self.load(&node.node_type)?;
        Ok(Arc::new(NativeProcessor::new(node.node_type.clone(), plugin)))
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins_dir", &self.resolver.plugins_dir())
            .field("cache", &self.cache)
            .finish()
    }
}
