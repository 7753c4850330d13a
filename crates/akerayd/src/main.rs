//! Akeray Daemon - request error normalizer service
//!
//! Hosts the PMS API routes behind the error normalizer.

use akeray_common::AkerayConfig;
use akerayd::{logging, server};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "akerayd")]
#[command(about = "Akeray PMS daemon - normalizes handler errors into bad requests", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to /etc/akeray/config.toml, then /var/lib/akeray/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen address, overrides server.bind_addr
    #[arg(long)]
    bind: Option<String>,

    /// Log filter, overrides RUST_LOG and logging.level
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_handle = logging::init(cli.log_level.as_deref());

    // An explicit path must load; the system paths fall back to defaults
    let mut config = AkerayConfig::resolve(cli.config.as_deref())
        .map_err(|e| {
            error!(kind = e.kind(), "Failed to load config: {}", e);
            e
        })
        .with_context(|| match &cli.config {
            Some(path) => format!("loading config from {}", path.display()),
            None => "loading config".to_string(),
        })?;
    if let Some(bind) = cli.bind {
        config.server.bind_addr = bind;
    }

    log_handle
        .apply_config_level(&config.logging.level)
        .context("applying logging.level")?;

    info!("Akeray Daemon v{} starting", env!("CARGO_PKG_VERSION"));
    server::run(config).await
}
