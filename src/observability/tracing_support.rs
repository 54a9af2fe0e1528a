//! Tracing integration for structured logging and spans.

use tracing::{Level, Span, span};

/// Create a span for one pipeline run.
///
/// # Example
///
/// ```rust,ignore
/// use visionflow::observability::span_pipeline;
///
/// let span = span_pipeline(7, 3);
/// let _guard = span.enter();
/// // Pipeline execution here...
/// ```
#[inline]
pub fn span_pipeline(run: u64, nodes: usize) -> Span {
    span!(Level::INFO, "pipeline", run = run, nodes = nodes)
}

/// Create a span for a single node.
#[inline]
pub fn span_node(index: usize, label: &str, node_type: &str) -> Span {
    span!(
        Level::DEBUG,
        "node",
        index = index,
        label = %label,
        node_type = %node_type
    )
}
