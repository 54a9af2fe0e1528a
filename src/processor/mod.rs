//! Frame processors: the capability each pipeline node is executed through.
//!
//! The executor only sees [`FrameProcessor`] trait objects handed out by a
//! [`ProcessorSource`]. Native plugins are one implementation
//! ([`NativeProcessor`]); closures are another ([`FnProcessor`]), used for
//! built-in nodes and for exercising the executor without shared libraries.

mod factory;
mod native;

pub use factory::ProcessorFactory;
pub use native::NativeProcessor;

use crate::error::Result;
use crate::frame::FrameBuffer;
use crate::graph::{NodeDescriptor, NodeParams};
use std::sync::Arc;

/// Applies one node's transformation to a frame.
pub trait FrameProcessor: Send + Sync {
    /// Process a frame.
    ///
    /// Returns `Ok(Some(frame))` for a replacement frame or `Ok(None)` to
    /// leave the input unchanged. The input must not be retained.
    fn apply(&self, frame: &FrameBuffer, params: &NodeParams) -> Result<Option<FrameBuffer>>;

    /// Name used in logs and errors.
    fn name(&self) -> &str;
}

/// Looks up the processor for a node.
///
/// The returned processor is dropped by the executor as soon as the node
/// finishes.
pub trait ProcessorSource: Send + Sync {
    /// Acquire the processor for `node`.
    fn processor_for(&self, node: &NodeDescriptor) -> Result<Arc<dyn FrameProcessor>>;
}

impl<S: ProcessorSource + ?Sized> ProcessorSource for Arc<S> {
    fn processor_for(&self, node: &NodeDescriptor) -> Result<Arc<dyn FrameProcessor>> {
        (**self).processor_for(node)
    }
}

/// A processor backed by a closure.
pub struct FnProcessor<F> {
    name: String,
    func: F,
}

impl<F> FnProcessor<F>
where
    F: Fn(&FrameBuffer, &NodeParams) -> Result<Option<FrameBuffer>> + Send + Sync,
{
    /// Create a closure-backed processor.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> FrameProcessor for FnProcessor<F>
where
    F: Fn(&FrameBuffer, &NodeParams) -> Result<Option<FrameBuffer>> + Send + Sync,
{
    fn apply(&self, frame: &FrameBuffer, params: &NodeParams) -> Result<Option<FrameBuffer>> {
        (self.func)(frame, params)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<F> std::fmt::Debug for FnProcessor<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnProcessor")
            .field("name", &self.name)
            .finish()
    }
}

/// Processor that never replaces the frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThrough;

impl FrameProcessor for PassThrough {
    fn apply(&self, _frame: &FrameBuffer, _params: &NodeParams) -> Result<Option<FrameBuffer>> {
        Ok(None)
    }

    fn name(&self) -> &str {
        "passthrough"
    }
}
