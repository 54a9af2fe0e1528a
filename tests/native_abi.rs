//! Tests of the native plugin boundary: result ownership, validation and loading.

use std::ffi::{c_char, c_int};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use visionflow::error::Error;
use visionflow::frame::FrameBuffer;
use visionflow::graph::{NodeDescriptor, NodeParams};
use visionflow::pipeline::PipelineExecutor;
use visionflow::plugin::{
    FreeResultFn, PluginExports, PluginRegistry, PluginResult, ProcessFrameFn, params_from_ptr,
};
use visionflow::processor::{FrameProcessor, NativeProcessor, ProcessorFactory};

static mut SCRATCH: [u8; 64] = [0; 64];

fn scratch_ptr() -> *mut u8 {
    std::ptr::addr_of_mut!(SCRATCH).cast()
}

fn result(width: c_int, height: c_int, channels: c_int) -> PluginResult {
    PluginResult {
        data: scratch_ptr(),
        width,
        height,
        channels,
        has_data: 1,
    }
}

fn processor(process: ProcessFrameFn, free: FreeResultFn) -> NativeProcessor {
    // SAFETY: The exports are linked into this test binary.
    unsafe { NativeProcessor::from_exports("test_node", PluginExports { process, free }) }
}

fn input() -> FrameBuffer {
    FrameBuffer::zeroed(4, 4, 1).unwrap()
}

// Each scenario owns its counter so tests can run in parallel.
macro_rules! counting_free {
    ($name:ident, $counter:ident) => {
        static $counter: AtomicUsize = AtomicUsize::new(0);

        unsafe extern "C" fn $name(result: *mut PluginResult) {
            $counter.fetch_add(1, Ordering::SeqCst);
            // The scratch buffer is static; only mark the result released.
            unsafe { *result = PluginResult::empty() };
        }
    };
}

counting_free!(free_two_channel, TWO_CHANNEL_FREES);
counting_free!(free_oversized, OVERSIZED_FREES);
counting_free!(free_negative, NEGATIVE_FREES);
counting_free!(free_valid, VALID_FREES);
counting_free!(free_null, NULL_FREES);
counting_free!(free_pipeline_bad, PIPELINE_BAD_FREES);

unsafe extern "C" fn two_channel(
    _pixels: *const u8,
    _w: c_int,
    _h: c_int,
    _c: c_int,
    _params: *const c_char,
) -> PluginResult {
    result(4, 4, 2)
}

unsafe extern "C" fn oversized(
    _pixels: *const u8,
    _w: c_int,
    _h: c_int,
    _c: c_int,
    _params: *const c_char,
) -> PluginResult {
    result(c_int::MAX, c_int::MAX, 4)
}

unsafe extern "C" fn negative(
    _pixels: *const u8,
    _w: c_int,
    _h: c_int,
    _c: c_int,
    _params: *const c_char,
) -> PluginResult {
    result(-4, 4, 1)
}

unsafe extern "C" fn valid(
    _pixels: *const u8,
    _w: c_int,
    _h: c_int,
    _c: c_int,
    _params: *const c_char,
) -> PluginResult {
    result(8, 8, 1)
}

unsafe extern "C" fn null_data(
    _pixels: *const u8,
    _w: c_int,
    _h: c_int,
    _c: c_int,
    _params: *const c_char,
) -> PluginResult {
    PluginResult {
        data: std::ptr::null_mut(),
        width: 4,
        height: 4,
        channels: 1,
        has_data: 1,
    }
}

/// Writes the `value` parameter into every pixel of a 1x1 gray frame.
unsafe extern "C" fn echo_param(
    _pixels: *const u8,
    _w: c_int,
    _h: c_int,
    _c: c_int,
    params: *const c_char,
) -> PluginResult {
    let params = unsafe { params_from_ptr(params) };
    let value = params.get("value").and_then(|v| v.as_u64()).unwrap_or(0) as u8;
    let data = Box::into_raw(vec![value].into_boxed_slice()) as *mut u8;
    PluginResult {
        data,
        width: 1,
        height: 1,
        channels: 1,
        has_data: 1,
    }
}

unsafe extern "C" fn free_boxed(result: *mut PluginResult) {
    unsafe { visionflow::plugin::free_exported(result) }
}

#[test]
fn unsupported_channels_is_malformed_and_freed_once() {
    let node = processor(two_channel, free_two_channel);
    let err = node.apply(&input(), &NodeParams::new()).unwrap_err();

    match err {
        Error::MalformedPluginResult { node, actual, .. } => {
            assert_eq!(node, "test_node");
            assert_eq!(actual, "2 channels");
        }
        other => panic!("expected MalformedPluginResult, got {other:?}"),
    }
    assert_eq!(TWO_CHANNEL_FREES.load(Ordering::SeqCst), 1);
}

#[test]
fn oversized_result_is_malformed_and_freed_once() {
    let node = processor(oversized, free_oversized);
    let err = node.apply(&input(), &NodeParams::new()).unwrap_err();
    assert!(matches!(err, Error::MalformedPluginResult { .. }));
    assert_eq!(OVERSIZED_FREES.load(Ordering::SeqCst), 1);
}

#[test]
fn negative_dimensions_are_malformed_and_freed_once() {
    let node = processor(negative, free_negative);
    let err = node.apply(&input(), &NodeParams::new()).unwrap_err();
    assert!(matches!(err, Error::MalformedPluginResult { .. }));
    assert_eq!(NEGATIVE_FREES.load(Ordering::SeqCst), 1);
}

#[test]
fn valid_result_is_copied_then_freed_once() {
    let node = processor(valid, free_valid);
    let output = node.apply(&input(), &NodeParams::new()).unwrap().unwrap();
    assert_eq!((output.width, output.height, output.channels), (8, 8, 1));
    assert_eq!(output.len(), 64);
    assert_eq!(VALID_FREES.load(Ordering::SeqCst), 1);
}

#[test]
fn null_data_is_pass_through_and_not_freed() {
    let node = processor(null_data, free_null);
    assert!(node.apply(&input(), &NodeParams::new()).unwrap().is_none());
    assert_eq!(NULL_FREES.load(Ordering::SeqCst), 0);
}

#[test]
fn params_reach_the_plugin_as_json() {
    let mut factory = ProcessorFactory::new();
    factory.register("echo", processor(echo_param, free_boxed));
    let executor = PipelineExecutor::new(Arc::new(factory));

    let node = NodeDescriptor::new("echo").with_param("value", 42);
    let output = executor.execute(input(), &[node]).unwrap();
    assert_eq!(output.data, vec![42]);
}

#[test]
fn malformed_result_aborts_the_pipeline() {
    let mut factory = ProcessorFactory::new();
    factory.register("bad", processor(two_channel, free_pipeline_bad));
    factory.register("echo", processor(echo_param, free_boxed));
    let executor = PipelineExecutor::new(Arc::new(factory));

    let nodes = [NodeDescriptor::new("bad"), NodeDescriptor::new("echo")];
    let result = executor.execute(input(), &nodes);
    assert!(matches!(result, Err(Error::MalformedPluginResult { .. })));
}

#[cfg(all(target_os = "linux", target_env = "gnu"))]
#[test]
fn library_without_exports_is_symbol_not_found() {
    // SAFETY: libc is always present and has no `processFrame` export.
    let result = unsafe { visionflow::plugin::LoadedPlugin::load("libc.so.6") };
    match result {
        Err(Error::SymbolNotFound { symbol }) => assert_eq!(symbol, "processFrame"),
        other => panic!("expected SymbolNotFound, got {other:?}"),
    }
}

#[test]
fn cache_does_not_keep_failed_loads() {
    let dir = tempfile::tempdir().unwrap();
    let registry = PluginRegistry::with_plugins_dir(dir.path()).with_cache();

    assert!(matches!(registry.load("sobel_filter"), Err(Error::PluginLoad { .. })));
    assert!(matches!(registry.load("sobel_filter"), Err(Error::PluginLoad { .. })));
    assert!(registry.cache().unwrap().is_empty());
    assert!(!registry.evict("sobel_filter"));
}

fn built_plugins_dir() -> PathBuf {
    std::env::var_os("CARGO_TARGET_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("target"))
        .join("debug")
}

#[test]
#[ignore = "requires `cargo build -p sobel_filter -p blur_effect`"]
fn demo_plugins_run_from_disk() {
    let registry = Arc::new(PluginRegistry::with_plugins_dir(built_plugins_dir()).with_cache());
    let executor = PipelineExecutor::new(Arc::new(ProcessorFactory::with_plugin_registry(
        Arc::clone(&registry),
    )));

    let mut frame = FrameBuffer::zeroed(16, 16, 3).unwrap();
    frame.data[..16 * 8 * 3].fill(255);
    let nodes = [
        NodeDescriptor::new("blur_effect").with_param("blur_amount", 2),
        NodeDescriptor::new("sobel_filter").with_param("ksize", 3),
    ];

    let first = executor.execute(frame.clone(), &nodes).unwrap();
    let second = executor.execute(frame, &nodes).unwrap();
    assert_eq!(first, second);
    assert_eq!((first.width, first.height, first.channels), (16, 16, 3));
    assert_eq!(registry.cache().unwrap().len(), 2);

    assert!(registry.evict("sobel_filter"));
    assert_eq!(registry.cache().unwrap().len(), 1);
}
