// rcp_utils - RCP utility daemon
// Shared clock, random source and lock status over a Unix Domain Socket

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::UnixListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rcp_utils::{server, ClockMode, UtilsConfig, UtilsOrgan};

#[derive(Parser)]
#[command(name = "rcp_utils", version, about = "RCP Utility Daemon - shared clock, random source and named locks")]
struct Args {
    /// JSON config file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Unix socket path for UDS server [default: /tmp/rcp_utils.sock]
    #[arg(long)]
    socket_path: Option<PathBuf>,

    /// Clock mode for rcp.timestamp (frozen | live) [default: live]
    #[arg(long)]
    clock_mode: Option<ClockMode>,

    /// Fixed seed for rcp.rand (wall-clock seconds when omitted)
    #[arg(long)]
    seed: Option<u64>,
}

impl Args {
    fn into_config(self) -> Result<UtilsConfig> {
        let mut config = match &self.config {
            Some(path) => UtilsConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => UtilsConfig::default(),
        };

        if let Some(socket_path) = self.socket_path {
            config.socket_path = socket_path;
        }
        if let Some(clock_mode) = self.clock_mode {
            config.clock_mode = clock_mode;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let config = Args::parse().into_config()?;

    info!("Starting RCP utility daemon");
    info!("   Socket: {}", config.socket_path.display());
    info!("   Clock mode: {}", config.clock_mode);

    // Lock status reports the same registry as rcp_utils::api::lock
    let organ = Arc::new(UtilsOrgan::process_wide(&config));

    // Remove old socket if exists
    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)
            .context("Failed to remove old socket")?;
    }

    let listener = UnixListener::bind(&config.socket_path)
        .context("Failed to bind Unix socket")?;

    info!("   ✓ Listening on {}", config.socket_path.display());

    server::serve(listener, organ).await
}
