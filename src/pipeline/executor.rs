//! Sequential pipeline executor.
//!
//! A run walks the graph in order on the calling thread:
//!
//! ```text
//! Start -> { LoadingPlugin(i) -> Invoking(i) -> Merging(i) } for each node -> Done
//!                          \__________ any error __________/ -> Failed
//! ```
//!
//! The first error aborts the run; no partial frame is returned.

use crate::error::{Error, Result};
use crate::frame::FrameBuffer;
use crate::graph::NodeDescriptor;
use crate::observability;
use crate::processor::{FrameProcessor, ProcessorSource};
use crossbeam_channel::RecvTimeoutError;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Configuration for the pipeline executor.
#[derive(Debug, Clone, Default)]
pub struct ExecutorConfig {
    /// Maximum time a single node may take. `None` runs nodes inline with no limit.
    pub node_timeout: Option<Duration>,
}

impl ExecutorConfig {
    /// Create a config with a per-node timeout.
    pub fn with_node_timeout(timeout: Duration) -> Self {
        Self {
            node_timeout: Some(timeout),
        }
    }
}

/// Execution state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Nothing executed yet.
    Start,
    /// Acquiring the processor for node `i`.
    LoadingPlugin(usize),
    /// Calling node `i`.
    Invoking(usize),
    /// Folding node `i`'s output into the working frame.
    Merging(usize),
    /// All nodes completed.
    Done,
    /// The run was aborted.
    Failed,
}

/// Outcome of one node in a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeReport {
    /// Position in the graph.
    pub index: usize,
    /// Display label.
    pub label: String,
    /// Node type tag.
    pub node_type: String,
    /// Time to acquire and run the node.
    pub elapsed: Duration,
    /// Whether the node replaced the frame.
    pub replaced: bool,
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Run identifier, unique per executor.
    pub run: u64,
    /// Per-node outcomes, in execution order.
    pub nodes: Vec<NodeReport>,
    /// Wall time of the whole run.
    pub elapsed: Duration,
}

struct RunTracker {
    run: u64,
    state: RunState,
}

impl RunTracker {
    fn transition(&mut self, next: RunState) {
        tracing::trace!(run = self.run, from = ?self.state, to = ?next, "pipeline state");
        self.state = next;
    }
}

/// Executes node graphs against frames.
pub struct PipelineExecutor {
    source: Arc<dyn ProcessorSource>,
    config: ExecutorConfig,
    next_run: AtomicU64,
}

impl PipelineExecutor {
    /// Create an executor with default configuration.
    pub fn new(source: Arc<dyn ProcessorSource>) -> Self {
        Self::with_config(source, ExecutorConfig::default())
    }

    /// Create an executor with custom configuration.
    pub fn with_config(source: Arc<dyn ProcessorSource>, config: ExecutorConfig) -> Self {
        Self {
            source,
            config,
            next_run: AtomicU64::new(1),
        }
    }

    /// The executor configuration.
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run `nodes` in order against `frame` and return the final frame.
    pub fn execute(&self, frame: FrameBuffer, nodes: &[NodeDescriptor]) -> Result<FrameBuffer> {
        self.execute_with_report(frame, nodes).map(|(frame, _)| frame)
    }

    /// Run `nodes` in order and also return per-node timings.
    pub fn execute_with_report(
        &self,
        frame: FrameBuffer,
        nodes: &[NodeDescriptor],
    ) -> Result<(FrameBuffer, RunReport)> {
        let run = self.next_run.fetch_add(1, Ordering::Relaxed);
        let _span = observability::span_pipeline(run, nodes.len()).entered();
        observability::record_pipeline_run(nodes.len());

        let started = Instant::now();
        let mut tracker = RunTracker {
            run,
            state: RunState::Start,
        };
        let mut reports = Vec::with_capacity(nodes.len());

        match self.run_nodes(&mut tracker, frame, nodes, &mut reports) {
            Ok(frame) => {
                tracker.transition(RunState::Done);
                let elapsed = started.elapsed();
                tracing::info!(run, nodes = nodes.len(), elapsed_ms = elapsed.as_millis() as u64, "pipeline completed");
                Ok((
                    frame,
                    RunReport {
                        run,
                        nodes: reports,
                        elapsed,
                    },
                ))
            }
            Err(e) => {
                let at = tracker.state;
                tracker.transition(RunState::Failed);
                tracing::error!(run, state = ?at, error = %e, "pipeline failed");
                observability::record_pipeline_failure(error_kind(&e));
                Err(e)
            }
        }
    }

    fn run_nodes(
        &self,
        tracker: &mut RunTracker,
        mut frame: FrameBuffer,
        nodes: &[NodeDescriptor],
        reports: &mut Vec<NodeReport>,
    ) -> Result<FrameBuffer> {
        frame.validate()?;

        for (index, node) in nodes.iter().enumerate() {
            let _span = observability::span_node(index, &node.label, &node.node_type).entered();
            let started = Instant::now();

            tracker.transition(RunState::LoadingPlugin(index));
            let processor = self.source.processor_for(node)?;

            tracker.transition(RunState::Invoking(index));
            // The processor is consumed here, so the plugin is released
            // before the next node is loaded.
            let output = self.invoke(processor, &frame, node)?;

            tracker.transition(RunState::Merging(index));
            let replaced = match output {
                Some(next) => {
                    next.check_shape()
                        .map_err(|v| Error::MalformedPluginResult {
                            node: node.node_type.clone(),
                            expected: v.expected,
                            actual: v.actual,
                        })?;
                    frame = next;
                    true
                }
                None => false,
            };

            let elapsed = started.elapsed();
            observability::record_node(&node.node_type, replaced, elapsed);
            tracing::debug!(
                width = frame.width,
                height = frame.height,
                channels = frame.channels,
                replaced,
                elapsed_us = elapsed.as_micros() as u64,
                "node completed"
            );
            reports.push(NodeReport {
                index,
                label: node.label.clone(),
                node_type: node.node_type.clone(),
                elapsed,
                replaced,
            });
        }

        Ok(frame)
    }

    fn invoke(
        &self,
        processor: Arc<dyn FrameProcessor>,
        frame: &FrameBuffer,
        node: &NodeDescriptor,
    ) -> Result<Option<FrameBuffer>> {
        let Some(timeout) = self.config.node_timeout else {
            return processor.apply(frame, &node.params);
        };

        let (tx, rx) = crossbeam_channel::bounded(1);
        let input = frame.clone();
        let params = node.params.clone();
        std::thread::Builder::new()
            .name(format!("node-{}", node.node_type))
            .spawn(move || {
                let result = processor.apply(&input, &params);
                // Release the plugin before the executor moves to the next node.
                drop(processor);
                drop(input);
                // The executor may have given up waiting.
                let _ = tx.send(result);
            })?;

        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                // The call cannot be interrupted safely; its thread is left to finish.
                tracing::warn!(node_type = %node.node_type, ?timeout, "node timed out, abandoning call");
                Err(Error::PluginTimeout {
                    node: node.node_type.clone(),
                    timeout,
                })
            }
            Err(RecvTimeoutError::Disconnected) => Err(Error::PluginInvocation(format!(
                "node '{}' exited without a result",
                node.node_type
            ))),
        }
    }
}

fn error_kind(error: &Error) -> &'static str {
    match error {
        Error::PluginLoad { .. } => "plugin_load",
        Error::SymbolNotFound { .. } => "symbol_not_found",
        Error::MalformedPluginResult { .. } => "malformed_result",
        Error::PluginInvocation(_) => "invocation",
        Error::PluginTimeout { .. } => "timeout",
        Error::UnknownNodeType(_) => "unknown_node_type",
        Error::InvalidFrame(_) => "invalid_frame",
        _ => "other",
    }
}

impl std::fmt::Debug for PipelineExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineExecutor")
            .field("config", &self.config)
            .finish()
    }
}
