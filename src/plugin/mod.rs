//! Native frame-processing plugins.
//!
//! A plugin is a shared library implementing one node type. The library for
//! type tag `sobel_filter` lives at `<plugins_dir>/libsobel_filter.so` on
//! Linux, `libsobel_filter.dylib` on macOS and `sobel_filter.dll` on Windows.
//!
//! # Plugin Structure
//!
//! Each library exports `processFrame` and `freeResult` (see [`abi`]). Rust
//! plugins can generate both with [`export_frame_processor!`]:
//!
//! ```ignore
//! use visionflow::frame::FrameBuffer;
//! use visionflow::graph::NodeParams;
//!
//! fn grayscale(frame: &FrameBuffer, _params: &NodeParams) -> Option<FrameBuffer> {
//!     // ...
//! #   None
//! }
//!
//! visionflow::export_frame_processor!(grayscale);
//! ```
//!
//! [`export_frame_processor!`]: crate::export_frame_processor

pub mod abi;
mod cache;
mod handle;
mod loader;
mod registry;
mod resolver;

pub use abi::{
    ExportedProcessFn, FREE_RESULT_SYMBOL, FreeResultFn, PROCESS_FRAME_SYMBOL, PluginResult,
    ProcessFrameFn, free_exported, params_from_ptr, run_exported,
};
pub use cache::PluginCache;
pub use handle::PluginHandle;
pub use loader::{LoadedPlugin, PluginBuffer, PluginExports};
pub use registry::PluginRegistry;
pub use resolver::{LibraryNaming, Platform, PluginResolver};
