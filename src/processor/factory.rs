//! Processor factory combining built-in processors with plugins.

use super::{FrameProcessor, PassThrough, ProcessorSource};
use crate::error::{Error, Result};
use crate::graph::NodeDescriptor;
use crate::plugin::PluginRegistry;
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of processors by node type.
///
/// Registered processors take precedence; any other type is looked up in the
/// plugin registry, when one is attached.
pub struct ProcessorFactory {
    builtins: HashMap<String, Arc<dyn FrameProcessor>>,
    /// Optional plugin registry for dynamically loaded node types.
    plugin_registry: Option<Arc<PluginRegistry>>,
}

impl ProcessorFactory {
    /// Create a factory with the built-in processors registered.
    pub fn new() -> Self {
        let mut factory = Self {
            builtins: HashMap::new(),
            plugin_registry: None,
        };
        factory.register("passthrough", PassThrough);
        factory
    }

    /// Create a factory backed by a plugin registry.
    pub fn with_plugin_registry(registry: Arc<PluginRegistry>) -> Self {
        let mut factory = Self::new();
        factory.plugin_registry = Some(registry);
        factory
    }

    /// The attached plugin registry, if any.
    pub fn plugin_registry(&self) -> Option<&Arc<PluginRegistry>> {
        self.plugin_registry.as_ref()
    }

    /// Register a processor under a node type, replacing any previous one.
    pub fn register(&mut self, node_type: &str, processor: impl FrameProcessor + 'static) {
        self.builtins.insert(node_type.to_string(), Arc::new(processor));
    }

    /// Check if a built-in processor is registered for a node type.
    pub fn is_registered(&self, node_type: &str) -> bool {
        self.builtins.contains_key(node_type)
    }

    /// List built-in node types.
    pub fn builtin_types(&self) -> Vec<String> {
        let mut names: Vec<String> = self.builtins.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for ProcessorFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessorSource for ProcessorFactory {
    fn processor_for(&self, node: &NodeDescriptor) -> Result<Arc<dyn FrameProcessor>> {
        if let Some(processor) = self.builtins.get(&node.node_type) {
            return Ok(Arc::clone(processor));
        }

        match &self.plugin_registry {
            Some(registry) => registry.processor_for(node),
            None => Err(Error::UnknownNodeType(node.node_type.clone())),
        }
    }
}

impl std::fmt::Debug for ProcessorFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorFactory")
            .field("builtins", &self.builtin_types())
            .field("plugin_registry", &self.plugin_registry)
            .finish()
    }
}
