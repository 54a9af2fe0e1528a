//! Server configuration.
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `VISIONFLOW_*` environment variables. The binary applies CLI flags last.

use crate::error::{Error, Result};
use crate::pipeline::{ExecutorConfig, PipelineExecutor};
use crate::plugin::PluginRegistry;
use crate::processor::ProcessorFactory;
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Default bind host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default bind port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default plugins directory, relative to the working directory.
pub const DEFAULT_PLUGINS_DIR: &str = "plugins";

/// Default maximum request body size (64 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Runtime configuration of the HTTP server and its pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Directory plugin libraries are resolved in.
    pub plugins_dir: PathBuf,
    /// Keep loaded plugins across requests.
    pub plugin_cache: bool,
    /// Per-node timeout in milliseconds.
    pub node_timeout_ms: Option<u64>,
    /// Maximum request body size in bytes.
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            plugins_dir: PathBuf::from(DEFAULT_PLUGINS_DIR),
            plugin_cache: false,
            node_timeout_ms: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl ServerConfig {
    /// Load defaults, the optional TOML file, then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Read a TOML configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parse a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| Error::Config(format!("failed to parse config as TOML: {e}")))
    }

    /// Apply `VISIONFLOW_*` environment variables.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a variable lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("VISIONFLOW_HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("VISIONFLOW_PORT") {
            self.port = parse_var("VISIONFLOW_PORT", &port)?;
        }
        if let Some(dir) = lookup("VISIONFLOW_PLUGINS_DIR") {
            self.plugins_dir = PathBuf::from(dir);
        }
        if let Some(cache) = lookup("VISIONFLOW_PLUGIN_CACHE") {
            self.plugin_cache = parse_bool("VISIONFLOW_PLUGIN_CACHE", &cache)?;
        }
        if let Some(timeout) = lookup("VISIONFLOW_NODE_TIMEOUT_MS") {
            self.node_timeout_ms = match timeout.trim() {
                "" | "0" => None,
                value => Some(parse_var("VISIONFLOW_NODE_TIMEOUT_MS", value)?),
            };
        }
        if let Some(limit) = lookup("VISIONFLOW_MAX_UPLOAD_BYTES") {
            self.max_upload_bytes = parse_var("VISIONFLOW_MAX_UPLOAD_BYTES", &limit)?;
        }
        Ok(())
    }

    /// The socket address to bind.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|e| Error::Config(format!("invalid host '{}': {e}", self.host)))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Per-node timeout, if configured.
    pub fn node_timeout(&self) -> Option<Duration> {
        self.node_timeout_ms
            .filter(|&ms| ms > 0)
            .map(Duration::from_millis)
    }

    /// Build the plugin registry described by this config.
    pub fn plugin_registry(&self) -> PluginRegistry {
        let registry = PluginRegistry::with_plugins_dir(&self.plugins_dir);
        if self.plugin_cache {
            registry.with_cache()
        } else {
            registry
        }
    }

    /// Build an executor over the built-in processors and the plugin registry.
    pub fn build_executor(&self) -> PipelineExecutor {
        let factory = ProcessorFactory::with_plugin_registry(Arc::new(self.plugin_registry()));
        let config = ExecutorConfig {
            node_timeout: self.node_timeout(),
        };
        PipelineExecutor::with_config(Arc::new(factory), config)
    }
}

fn parse_var<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("invalid {key} '{value}': {e}")))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!("invalid {key} '{value}': expected a boolean"))),
    }
}
