//! Error types for visionflow.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using visionflow's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for visionflow operations.
///
/// Every variant raised while running a node aborts the whole pipeline run.
#[derive(Error, Debug)]
pub enum Error {
    /// The plugin library could not be loaded.
    #[error("failed to load plugin library {}: {reason}", path.display())]
    PluginLoad {
        /// Resolved library path.
        path: PathBuf,
        /// Platform loader diagnostic.
        reason: String,
    },

    /// The plugin does not export a required symbol.
    #[error("plugin is missing required export '{symbol}'")]
    SymbolNotFound {
        /// Name of the missing export.
        symbol: String,
    },

    /// The plugin returned a buffer whose shape does not match its declared dimensions.
    #[error("malformed result from node '{node}': expected {expected}, got {actual}")]
    MalformedPluginResult {
        /// Type tag of the offending node.
        node: String,
        /// What the contract requires.
        expected: String,
        /// What the plugin returned.
        actual: String,
    },

    /// Reserved for invocation failures a plugin can report.
    #[error("plugin invocation failed: {0}")]
    PluginInvocation(String),

    /// A node did not return within the configured timeout.
    #[error("node '{node}' did not complete within {timeout:?}")]
    PluginTimeout {
        /// Type tag of the node.
        node: String,
        /// Configured per-node timeout.
        timeout: Duration,
    },

    /// No processor is registered for the node type.
    #[error("unknown node type: {0}")]
    UnknownNodeType(String),

    /// A frame violates the buffer invariants.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// The graph description could not be parsed.
    #[error("invalid graph: {0}")]
    InvalidGraph(String),

    /// Image decode or encode failed.
    #[error("codec error: {0}")]
    Codec(String),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the error was caused by the request rather than the server or a plugin.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidGraph(_) | Error::InvalidFrame(_) | Error::Codec(_)
        )
    }
}
