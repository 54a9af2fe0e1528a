//! Pipeline execution.
//!
//! A pipeline is an ordered list of [`NodeDescriptor`](crate::graph::NodeDescriptor)s
//! applied to one frame. Each node either replaces the working frame or
//! leaves it as is; the frame left after the last node is the result.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use visionflow::graph::NodeDescriptor;
//! use visionflow::pipeline::PipelineExecutor;
//! use visionflow::plugin::PluginRegistry;
//! use visionflow::processor::ProcessorFactory;
//!
//! let registry = Arc::new(PluginRegistry::with_plugins_dir("plugins"));
//! let factory = ProcessorFactory::with_plugin_registry(registry);
//! let executor = PipelineExecutor::new(Arc::new(factory));
//!
//! let nodes = [NodeDescriptor::new("sobel_filter").with_param("ksize", 3)];
//! let output = executor.execute(frame, &nodes)?;
//! ```

mod executor;

pub use executor::{ExecutorConfig, NodeReport, PipelineExecutor, RunReport, RunState};
