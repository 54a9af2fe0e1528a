//! Node graph descriptions.
//!
//! A graph is an ordered list of nodes, as sent by the canvas frontend:
//!
//! ```json
//! [
//!   { "label": "Sobel Filter", "type": "sobel_filter", "params": { "ksize": 3 } },
//!   { "label": "Gaussian Blur", "type": "blur_effect", "params": { "blur_amount": 5 } }
//! ]
//! ```
//!
//! An object of the form `{ "nodes": [...] }` is accepted as well.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Node parameters, opaque to the pipeline and passed through to the plugin.
pub type NodeParams = serde_json::Map<String, serde_json::Value>;

/// One step of a processing graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    /// Display label. Defaults to the type tag.
    #[serde(default)]
    pub label: String,
    /// Plugin key used to resolve the processor.
    #[serde(rename = "type")]
    pub node_type: String,
    /// Parameters forwarded to the processor.
    #[serde(default)]
    pub params: NodeParams,
}

impl NodeDescriptor {
    /// Create a node with no parameters, labelled by its type.
    pub fn new(node_type: impl Into<String>) -> Self {
        let node_type = node_type.into();
        Self {
            label: node_type.clone(),
            node_type,
            params: NodeParams::new(),
        }
    }

    /// Set the display label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Add a parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GraphDocument {
    Nodes(Vec<NodeDescriptor>),
    Wrapped { nodes: Vec<NodeDescriptor> },
}

/// Parse a graph description from JSON bytes.
pub fn parse_graph(input: &[u8]) -> Result<Vec<NodeDescriptor>> {
    let document: GraphDocument = serde_json::from_slice(input).map_err(|e| {
        Error::InvalidGraph(format!(
            "expected a list of nodes or {{\"nodes\": [...]}}: {e}"
        ))
    })?;

    let mut nodes = match document {
        GraphDocument::Nodes(nodes) | GraphDocument::Wrapped { nodes } => nodes,
    };

    for (index, node) in nodes.iter_mut().enumerate() {
        if node.node_type.trim().is_empty() {
            return Err(Error::InvalidGraph(format!("node {index} has an empty type")));
        }
        if node.label.is_empty() {
            node.label = node.node_type.clone();
        }
    }

    Ok(nodes)
}
