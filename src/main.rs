//! VisionFlow server binary entry point

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use visionflow::config::ServerConfig;
use visionflow::observability::init_metrics;
use visionflow::server::start_server;

/// HTTP server running image pipelines over native plugins.
#[derive(Debug, Parser)]
#[command(name = "visionflow-server", version, about)]
struct Args {
    /// TOML configuration file.
    #[arg(short, long, env = "VISIONFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Interface to bind.
    #[arg(long)]
    host: Option<String>,

    /// Port to bind.
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory plugin libraries are loaded from.
    #[arg(long)]
    plugins_dir: Option<PathBuf>,

    /// Keep loaded plugins across requests.
    #[arg(long)]
    plugin_cache: bool,

    /// Per-node timeout in milliseconds (0 disables).
    #[arg(long)]
    node_timeout_ms: Option<u64>,
}

impl Args {
    fn apply(self, config: &mut ServerConfig) {
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(dir) = self.plugins_dir {
            config.plugins_dir = dir;
        }
        if self.plugin_cache {
            config.plugin_cache = true;
        }
        if let Some(ms) = self.node_timeout_ms {
            config.node_timeout_ms = (ms > 0).then_some(ms);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "visionflow=info,visionflow_server=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let mut config = ServerConfig::load(args.config.as_deref())?;
    args.apply(&mut config);

    init_metrics();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting visionflow server");
    start_server(&config).await?;

    Ok(())
}
