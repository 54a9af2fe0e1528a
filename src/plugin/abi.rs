//! The C-compatible frame-processing ABI.
//!
//! A plugin is a shared library exporting two symbols:
//!
//! ```c
//! typedef struct {
//!     unsigned char *data;
//!     int width;
//!     int height;
//!     int channels;
//!     int hasData;
//! } PluginResult;
//!
//! PluginResult processFrame(const unsigned char *pixels, int width, int height,
//!                           int channels, const char *paramsJson);
//! void freeResult(PluginResult *result);
//! ```
//!
//! `processFrame` must not retain `pixels` after returning. Every result with
//! `hasData != 0` and non-null `data` is handed back to the same plugin's
//! `freeResult`; the host never frees plugin memory with its own allocator.

use crate::frame::{FrameBuffer, check_dimensions};
use crate::graph::NodeParams;
use std::ffi::{CStr, c_char, c_int};
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Name of the processing entry point.
pub const PROCESS_FRAME_SYMBOL: &str = "processFrame";

/// Name of the deallocation entry point.
pub const FREE_RESULT_SYMBOL: &str = "freeResult";

/// Result returned by value from `processFrame`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct PluginResult {
    /// Plugin-allocated pixel data, or null.
    pub data: *mut u8,
    /// Width in pixels.
    pub width: c_int,
    /// Height in pixels.
    pub height: c_int,
    /// Interleaved channels per pixel.
    pub channels: c_int,
    /// Non-zero when `data` holds a replacement frame.
    pub has_data: c_int,
}

impl PluginResult {
    /// A result that carries no replacement frame.
    pub const fn empty() -> Self {
        Self {
            data: std::ptr::null_mut(),
            width: 0,
            height: 0,
            channels: 0,
            has_data: 0,
        }
    }

    /// Whether the plugin produced a replacement buffer the host must take over.
    pub fn has_data(&self) -> bool {
        self.has_data != 0 && !self.data.is_null()
    }
}

/// Signature of `processFrame`.
pub type ProcessFrameFn = unsafe extern "C" fn(
    pixels: *const u8,
    width: c_int,
    height: c_int,
    channels: c_int,
    params_json: *const c_char,
) -> PluginResult;

/// Signature of `freeResult`.
pub type FreeResultFn = unsafe extern "C" fn(result: *mut PluginResult);

/// Signature of a Rust frame function exported through [`export_frame_processor!`].
///
/// Returning `None` leaves the frame unchanged.
pub type ExportedProcessFn = fn(&FrameBuffer, &NodeParams) -> Option<FrameBuffer>;

/// Plugin-side body of `processFrame`.
///
/// Copies the input into a [`FrameBuffer`], parses the parameters and calls
/// `process`. Invalid input, a panic, or an output that breaks the frame
/// invariants all yield [`PluginResult::empty`].
///
/// # Safety
///
/// `pixels` must be null or point to `width * height * channels` readable
/// bytes. `params_json` must be null or a valid NUL-terminated string.
pub unsafe fn run_exported(
    pixels: *const u8,
    width: c_int,
    height: c_int,
    channels: c_int,
    params_json: *const c_char,
    process: ExportedProcessFn,
) -> PluginResult {
    if pixels.is_null() {
        return PluginResult::empty();
    }
    let (Ok(width), Ok(height), Ok(channels)) = (
        u32::try_from(width),
        u32::try_from(height),
        u8::try_from(channels),
    ) else {
        return PluginResult::empty();
    };
    let Ok(len) = check_dimensions(width, height, channels) else {
        return PluginResult::empty();
    };

    // SAFETY: Caller guarantees `pixels` covers the declared shape.
    let data = unsafe { std::slice::from_raw_parts(pixels, len) }.to_vec();
    let input = FrameBuffer {
        data,
        width,
        height,
        channels,
    };
    // SAFETY: Caller guarantees `params_json` is null or NUL-terminated.
    let params = unsafe { params_from_ptr(params_json) };

    match catch_unwind(AssertUnwindSafe(|| process(&input, &params))) {
        Ok(Some(output)) => into_result(output),
        _ => PluginResult::empty(),
    }
}

/// Plugin-side body of `freeResult`.
///
/// Releases a buffer produced by [`run_exported`] and clears the result so a
/// second call is a no-op.
///
/// # Safety
///
/// `result` must be null or point to a result returned by [`run_exported`]
/// in the same library.
pub unsafe fn free_exported(result: *mut PluginResult) {
    if result.is_null() {
        return;
    }
    // SAFETY: Caller guarantees `result` is valid.
    let result = unsafe { &mut *result };
    if !result.data.is_null() {
        let len = result.width as usize * result.height as usize * result.channels as usize;
        // SAFETY: `data` came from `Box::<[u8]>::into_raw` with exactly this length.
        drop(unsafe { Box::from_raw(std::ptr::slice_from_raw_parts_mut(result.data, len)) });
    }
    *result = PluginResult::empty();
}

/// Parse the JSON parameter string, falling back to an empty map.
///
/// # Safety
///
/// `ptr` must be null or a valid NUL-terminated string.
pub unsafe fn params_from_ptr(ptr: *const c_char) -> NodeParams {
    if ptr.is_null() {
        return NodeParams::new();
    }
    // SAFETY: Caller guarantees `ptr` is NUL-terminated.
    let text = unsafe { CStr::from_ptr(ptr) };
    text.to_str()
        .ok()
        .and_then(|s| serde_json::from_str::<NodeParams>(s).ok())
        .unwrap_or_default()
}

fn into_result(frame: FrameBuffer) -> PluginResult {
    if frame.check_shape().is_err() {
        return PluginResult::empty();
    }
    let FrameBuffer {
        data,
        width,
        height,
        channels,
    } = frame;
    let data = Box::into_raw(data.into_boxed_slice()) as *mut u8;
    PluginResult {
        data,
        width: width as c_int,
        height: height as c_int,
        channels: channels as c_int,
        has_data: 1,
    }
}

/// Export a Rust frame function as `processFrame`/`freeResult`.
///
/// The function has the signature [`ExportedProcessFn`].
///
/// # Example
///
/// ```ignore
/// use visionflow::frame::FrameBuffer;
/// use visionflow::graph::NodeParams;
///
/// fn invert(frame: &FrameBuffer, _params: &NodeParams) -> Option<FrameBuffer> {
///     let mut out = frame.clone();
///     out.data.iter_mut().for_each(|b| *b = 255 - *b);
///     Some(out)
/// }
///
/// visionflow::export_frame_processor!(invert);
/// ```
#[macro_export]
macro_rules! export_frame_processor {
    ($process:path) => {
        /// Plugin entry point.
        ///
        /// # Safety
        ///
        /// See the visionflow plugin ABI.
        #[unsafe(no_mangle)]
        #[allow(non_snake_case)]
        pub unsafe extern "C" fn processFrame(
            pixels: *const u8,
            width: ::std::ffi::c_int,
            height: ::std::ffi::c_int,
            channels: ::std::ffi::c_int,
            params_json: *const ::std::ffi::c_char,
        ) -> $crate::plugin::PluginResult {
            let process: $crate::plugin::ExportedProcessFn = $process;
            // SAFETY: The host upholds the ABI contract for the arguments.
            unsafe { $crate::plugin::run_exported(pixels, width, height, channels, params_json, process) }
        }

        /// Release a result returned by `processFrame`.
        ///
        /// # Safety
        ///
        /// `result` must come from this library's `processFrame`.
        #[unsafe(no_mangle)]
        #[allow(non_snake_case)]
        pub unsafe extern "C" fn freeResult(result: *mut $crate::plugin::PluginResult) {
            // SAFETY: The host only passes results produced by `processFrame`.
            unsafe { $crate::plugin::free_exported(result) }
        }
    };
}
