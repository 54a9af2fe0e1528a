//! Metrics collection using metrics-rs.

use metrics::{Unit, counter, histogram};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Whether metrics have been initialized.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

// Metric names as constants for consistency
const PIPELINE_RUNS: &str = "visionflow_pipeline_runs";
const PIPELINE_FAILURES: &str = "visionflow_pipeline_failures";
const NODES_EXECUTED: &str = "visionflow_nodes_executed";
const NODES_PASSTHROUGH: &str = "visionflow_nodes_passthrough";
const NODE_TIME_NS: &str = "visionflow_node_time_ns";
const PLUGIN_LOADS: &str = "visionflow_plugin_loads";

/// Initialize metrics descriptions.
///
/// Call this once at application startup. Subsequent calls are no-ops.
pub fn init_metrics() {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }

    metrics::describe_counter!(PIPELINE_RUNS, Unit::Count, "Pipeline runs started");
    metrics::describe_counter!(
        PIPELINE_FAILURES,
        Unit::Count,
        "Pipeline runs aborted by a node error"
    );
    metrics::describe_counter!(NODES_EXECUTED, Unit::Count, "Nodes executed to completion");
    metrics::describe_counter!(
        NODES_PASSTHROUGH,
        Unit::Count,
        "Nodes that left the frame unchanged"
    );
    metrics::describe_histogram!(
        NODE_TIME_NS,
        Unit::Nanoseconds,
        "Time to acquire and run a single node"
    );
    metrics::describe_counter!(PLUGIN_LOADS, Unit::Count, "Plugin libraries loaded from disk");
}

/// Record the start of a pipeline run.
#[inline]
pub fn record_pipeline_run(nodes: usize) {
    counter!(PIPELINE_RUNS).increment(1);
    histogram!("visionflow_pipeline_nodes").record(nodes as f64);
}

/// Record a pipeline run aborted by an error.
#[inline]
pub fn record_pipeline_failure(kind: &'static str) {
    counter!(PIPELINE_FAILURES, "kind" => kind).increment(1);
}

/// Record a completed node.
#[inline]
pub fn record_node(node_type: &str, replaced: bool, elapsed: Duration) {
    counter!(NODES_EXECUTED, "node_type" => node_type.to_string()).increment(1);
    if !replaced {
        counter!(NODES_PASSTHROUGH, "node_type" => node_type.to_string()).increment(1);
    }
    histogram!(NODE_TIME_NS, "node_type" => node_type.to_string())
        .record(elapsed.as_nanos() as f64);
}

/// Record a plugin library loaded from disk.
#[inline]
pub fn record_plugin_load(path: &Path) {
    let library = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    counter!(PLUGIN_LOADS, "library" => library).increment(1);
}
