//! # VisionFlow
//!
//! An image-processing pipeline engine that runs chains of natively
//! loaded frame processors.
//!
//! A request carries one image and a node graph. Each node names a plugin
//! library (for example `sobel_filter` resolves to `plugins/libsobel_filter.so`
//! on Linux) exporting the `processFrame` / `freeResult` C ABI. Nodes run in
//! order; each may replace the working frame or pass it through.
//!
//! ## Layers
//!
//! - [`frame`]: packed 8-bit frame buffers and their invariants
//! - [`graph`]: node descriptors and graph parsing
//! - [`plugin`]: the C ABI, library handles, path resolution and caching
//! - [`processor`]: the [`FrameProcessor`](processor::FrameProcessor) capability
//! - [`pipeline`]: the sequential executor
//! - [`codec`]: PNG/JPEG decoding and PNG encoding
//! - [`server`]: the HTTP front end
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use visionflow::prelude::*;
//!
//! let registry = Arc::new(PluginRegistry::with_plugins_dir("plugins").with_cache());
//! let executor = PipelineExecutor::new(Arc::new(ProcessorFactory::with_plugin_registry(registry)));
//!
//! let frame = visionflow::codec::decode_image(&std::fs::read("input.png")?)?;
//! let nodes = visionflow::graph::parse_graph(br#"[{"type":"blur_effect","params":{"blur_amount":5}}]"#)?;
//! let output = executor.execute(frame, &nodes)?;
//! std::fs::write("output.png", visionflow::codec::encode_png(&output)?)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod codec;
pub mod config;
pub mod error;
pub mod frame;
pub mod graph;
pub mod observability;
pub mod pipeline;
pub mod plugin;
pub mod processor;
pub mod server;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::frame::FrameBuffer;
    pub use crate::graph::{NodeDescriptor, NodeParams};
    pub use crate::pipeline::{ExecutorConfig, PipelineExecutor};
    pub use crate::plugin::PluginRegistry;
    pub use crate::processor::{FrameProcessor, ProcessorFactory, ProcessorSource};
}

pub use error::{Error, Result};
