//! Loading plugins and adopting the buffers they return.

use super::abi::{
    FREE_RESULT_SYMBOL, FreeResultFn, PROCESS_FRAME_SYMBOL, PluginResult, ProcessFrameFn,
};
use super::handle::PluginHandle;
use crate::error::{Error, Result};
use crate::frame::{FrameBuffer, check_dimensions};
use crate::observability;
use std::path::Path;
use std::sync::Arc;

/// The two entry points of a frame-processing plugin.
#[derive(Debug, Clone, Copy)]
pub struct PluginExports {
    /// `processFrame`
    pub process: ProcessFrameFn,
    /// `freeResult`
    pub free: FreeResultFn,
}

/// A loaded plugin with its entry points resolved.
///
/// The library stays loaded for as long as the `LoadedPlugin` (or an `Arc`
/// to it) is alive.
pub struct LoadedPlugin {
    exports: PluginExports,
    handle: PluginHandle,
}

impl LoadedPlugin {
    /// Open the library at `path` and resolve `processFrame` and `freeResult`.
    ///
    /// # Safety
    ///
    /// Loading plugins executes code from shared libraries. The library must
    /// be trusted and its exports must have the documented ABI signatures.
    pub unsafe fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        // SAFETY: Caller guarantees the plugin is trusted.
        let handle = unsafe { PluginHandle::open(path)? };

        // SAFETY: Caller guarantees the exports match the ABI signatures.
        // The pointers are stored next to the handle that keeps them valid.
        let exports = unsafe {
            PluginExports {
                process: handle.lookup::<ProcessFrameFn>(PROCESS_FRAME_SYMBOL)?,
                free: handle.lookup::<FreeResultFn>(FREE_RESULT_SYMBOL)?,
            }
        };

        observability::record_plugin_load(path);
        Ok(Self { exports, handle })
    }

    /// The resolved entry points.
    pub fn exports(&self) -> PluginExports {
        self.exports
    }

    /// Path the plugin was loaded from.
    pub fn path(&self) -> &Path {
        self.handle.path()
    }
}

impl std::fmt::Debug for LoadedPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedPlugin")
            .field("path", &self.handle.path())
            .finish()
    }
}

#[cfg(all(test, unix))]
impl LoadedPlugin {
    /// A plugin backed by the test binary whose exports invert every byte.
    pub(crate) fn inverting() -> Self {
        use super::abi::{free_exported, run_exported};
        use crate::graph::NodeParams;
        use std::ffi::{c_char, c_int};

        fn invert(frame: &FrameBuffer, _params: &NodeParams) -> Option<FrameBuffer> {
            let mut out = frame.clone();
            out.data.iter_mut().for_each(|b| *b = 255 - *b);
            Some(out)
        }

        unsafe extern "C" fn process(
            pixels: *const u8,
            width: c_int,
            height: c_int,
            channels: c_int,
            params: *const c_char,
        ) -> PluginResult {
            unsafe { run_exported(pixels, width, height, channels, params, invert) }
        }

        unsafe extern "C" fn free(result: *mut PluginResult) {
            unsafe { free_exported(result) }
        }

        Self {
            exports: PluginExports { process, free },
            handle: PluginHandle::current_process(),
        }
    }
}

/// A plugin-allocated result buffer.
///
/// Owns the memory described by a [`PluginResult`] and hands it back to the
/// plugin's `freeResult` exactly once when dropped. The optional library
/// reference keeps the plugin loaded until then.
pub struct PluginBuffer {
    result: PluginResult,
    free: FreeResultFn,
    _library: Option<Arc<LoadedPlugin>>,
}

impl PluginBuffer {
    /// Take ownership of a result.
    ///
    /// Returns `None` without freeing anything when the result carries no
    /// data (`hasData == 0` or a null pointer).
    ///
    /// # Safety
    ///
    /// `result` must come from the `processFrame` paired with `free`, and must
    /// not be freed by anyone else.
    pub unsafe fn adopt(
        result: PluginResult,
        free: FreeResultFn,
        library: Option<Arc<LoadedPlugin>>,
    ) -> Option<Self> {
        if !result.has_data() {
            return None;
        }
        Some(Self {
            result,
            free,
            _library: library,
        })
    }

    /// Validate the declared shape and copy the pixels into a pipeline-owned frame.
    ///
    /// The plugin buffer is released either way; a shape violation is
    /// reported as [`Error::MalformedPluginResult`] attributed to `node`.
    pub fn into_frame(self, node: &str) -> Result<FrameBuffer> {
        let malformed = |expected: String, actual: String| Error::MalformedPluginResult {
            node: node.to_string(),
            expected,
            actual,
        };

        let PluginResult {
            width,
            height,
            channels,
            ..
        } = self.result;
        let (Ok(w), Ok(h), Ok(c)) = (
            u32::try_from(width),
            u32::try_from(height),
            u8::try_from(channels),
        ) else {
            return Err(malformed(
                "non-negative dimensions and channels in {1, 3, 4}".to_string(),
                format!("{width}x{height}x{channels}"),
            ));
        };
        let len = check_dimensions(w, h, c).map_err(|v| malformed(v.expected, v.actual))?;

        // SAFETY: The plugin declared `data` to hold `width * height * channels`
        // bytes and the buffer stays untouched until `self` drops.
        let data = unsafe { std::slice::from_raw_parts(self.result.data, len) }.to_vec();
        Ok(FrameBuffer {
            data,
            width: w,
            height: h,
            channels: c,
        })
    }
}

impl Drop for PluginBuffer {
    fn drop(&mut self) {
        // SAFETY: `adopt` guarantees `result` came from the matching
        // `processFrame` and has not been freed.
        unsafe { (self.free)(&mut self.result) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::c_int;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static FREED: AtomicUsize = AtomicUsize::new(0);

    unsafe extern "C" fn counting_free(result: *mut PluginResult) {
        FREED.fetch_add(1, Ordering::SeqCst);
        // SAFETY: Test results come from `leaked_result`.
        unsafe { super::super::abi::free_exported(result) };
    }

    fn leaked_result(width: c_int, height: c_int, channels: c_int, len: usize) -> PluginResult {
        let data = Box::into_raw(vec![7u8; len].into_boxed_slice()) as *mut u8;
        PluginResult {
            data,
            width,
            height,
            channels,
            has_data: 1,
        }
    }

    #[test]
    fn test_adopt_empty_result_does_not_free() {
        let before = FREED.load(Ordering::SeqCst);
        let buffer = unsafe { PluginBuffer::adopt(PluginResult::empty(), counting_free, None) };
        assert!(buffer.is_none());
        assert_eq!(FREED.load(Ordering::SeqCst), before);
    }

    #[test]
    fn test_into_frame_copies_and_frees() {
        let before = FREED.load(Ordering::SeqCst);
        let buffer =
            unsafe { PluginBuffer::adopt(leaked_result(2, 2, 3, 12), counting_free, None) }.unwrap();
        let frame = buffer.into_frame("test").unwrap();
        assert_eq!(frame.data, vec![7u8; 12]);
        assert_eq!((frame.width, frame.height, frame.channels), (2, 2, 3));
        assert!(FREED.load(Ordering::SeqCst) > before);
    }

    #[test]
    fn test_into_frame_rejects_bad_channels_and_frees() {
        let before = FREED.load(Ordering::SeqCst);
        // Two channels is not a supported layout; length matches so the free is sound.
        let buffer =
            unsafe { PluginBuffer::adopt(leaked_result(2, 2, 2, 8), counting_free, None) }.unwrap();
        let err = buffer.into_frame("bad").unwrap_err();
        assert!(matches!(err, Error::MalformedPluginResult { ref node, .. } if node == "bad"));
        assert!(FREED.load(Ordering::SeqCst) > before);
    }

    #[test]
    fn test_into_frame_rejects_negative_dimensions() {
        let data = Box::into_raw(vec![0u8; 4].into_boxed_slice()) as *mut u8;
        let result = PluginResult {
            data,
            width: -2,
            height: -2,
            channels: 1,
            has_data: 1,
        };

        unsafe extern "C" fn free_four(result: *mut PluginResult) {
            // SAFETY: The test allocated exactly four bytes.
            unsafe {
                let r = &mut *result;
                drop(Box::from_raw(std::ptr::slice_from_raw_parts_mut(r.data, 4)));
                *r = PluginResult::empty();
            }
        }

        let buffer = unsafe { PluginBuffer::adopt(result, free_four, None) }.unwrap();
        assert!(matches!(
            buffer.into_frame("neg"),
            Err(Error::MalformedPluginResult { .. })
        ));
    }

    #[test]
    fn test_load_missing_library() {
        let result = unsafe { LoadedPlugin::load("/nonexistent/libmissing.so") };
        assert!(matches!(result, Err(Error::PluginLoad { .. })));
    }
}
