//! Processor that calls into a native plugin.

use super::FrameProcessor;
use crate::error::{Error, Result};
use crate::frame::FrameBuffer;
use crate::graph::NodeParams;
use crate::plugin::{LoadedPlugin, PluginBuffer, PluginExports};
use std::ffi::{CString, c_int};
use std::sync::Arc;

/// Runs a node through a plugin's `processFrame`/`freeResult` exports.
pub struct NativeProcessor {
    name: String,
    exports: PluginExports,
    library: Option<Arc<LoadedPlugin>>,
}

impl NativeProcessor {
    /// Create a processor for a loaded plugin. The plugin stays loaded while
    /// the processor or any buffer it returned is alive.
    pub fn new(name: impl Into<String>, plugin: Arc<LoadedPlugin>) -> Self {
        Self {
            name: name.into(),
            exports: plugin.exports(),
            library: Some(plugin),
        }
    }

    /// Create a processor for exports linked into the current binary.
    ///
    /// # Safety
    ///
    /// `exports` must implement the frame-processing ABI and stay valid for
    /// the whole program.
    pub unsafe fn from_exports(name: impl Into<String>, exports: PluginExports) -> Self {
        Self {
            name: name.into(),
            exports,
            library: None,
        }
    }
}

impl FrameProcessor for NativeProcessor {
    fn apply(&self, frame: &FrameBuffer, params: &NodeParams) -> Result<Option<FrameBuffer>> {
        let to_c_int = |value: u32| {
            c_int::try_from(value).map_err(|_| {
                Error::InvalidFrame(format!("dimension {value} does not fit the plugin ABI"))
            })
        };
        let width = to_c_int(frame.width)?;
        let height = to_c_int(frame.height)?;
        let channels = c_int::from(frame.channels);

        let params_json = serde_json::to_string(params)
            .ok()
            .and_then(|json| CString::new(json).ok())
            .ok_or_else(|| Error::PluginInvocation("parameters are not valid JSON text".into()))?;

        // SAFETY: `frame.data` holds `width * height * channels` bytes (the
        // executor validated the frame) and outlives the call; `params_json`
        // is NUL-terminated. The plugin must not retain either pointer.
        let result = unsafe {
            (self.exports.process)(
                frame.data.as_ptr(),
                width,
                height,
                channels,
                params_json.as_ptr(),
            )
        };

        // SAFETY: `result` came from this plugin's `processFrame` and is freed
        // only through the matching `freeResult` when the buffer drops.
        let buffer = unsafe { PluginBuffer::adopt(result, self.exports.free, self.library.clone()) };
        match buffer {
            Some(buffer) => buffer.into_frame(&self.name).map(Some),
            None => Ok(None),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for NativeProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeProcessor")
            .field("name", &self.name)
            .field("library", &self.library.as_ref().map(|l| l.path()))
            .finish()
    }
}
