//! Observability features: metrics and tracing.
//!
//! ## Metrics
//!
//! | Metric | Type | Description |
//! |--------|------|-------------|
//! | `visionflow_pipeline_runs` | Counter | Pipeline runs started |
//! | `visionflow_pipeline_failures` | Counter | Runs aborted, labelled by error kind |
//! | `visionflow_pipeline_nodes` | Histogram | Nodes per run |
//! | `visionflow_nodes_executed` | Counter | Nodes completed, by node type |
//! | `visionflow_nodes_passthrough` | Counter | Nodes that kept the frame |
//! | `visionflow_node_time_ns` | Histogram | Acquire + run time per node |
//! | `visionflow_plugin_loads` | Counter | Libraries loaded from disk |
//!
//! Install any `metrics` recorder (prometheus, statsd, ...) to collect them.
//!
//! ## Tracing
//!
//! Every run is wrapped in a `pipeline` span and every node in a `node` span.

mod metrics;
mod tracing_support;

pub use self::metrics::{
    init_metrics, record_node, record_pipeline_failure, record_pipeline_run, record_plugin_load,
};
pub use self::tracing_support::{span_node, span_pipeline};
