//! LAN Agent Daemon - Main entry point
//!
//! Scans the local subnet on a fixed interval, serves the latest result at
//! `GET /scan` and advertises the API over mDNS.

mod announce;
mod api;
mod config;
mod server;
mod state;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "lanagent")]
#[command(about = "Network discovery service with JSON API and mDNS announcement")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "lanagent.toml")]
    config: PathBuf,

    /// Bind address for web server
    #[arg(short, long)]
    bind: Option<String>,

    /// Port for web server (0 picks a free port)
    #[arg(short, long)]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Run a single scan and exit
    #[arg(long)]
    scan_once: bool,

    /// Write the default configuration to the config path and exit
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging; RUST_LOG takes precedence over --log-level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(args.log_level.to_lowercase()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("LAN Agent v{}", env!("CARGO_PKG_VERSION"));

    if args.init_config {
        if args.config.exists() {
            anyhow::bail!("Refusing to overwrite {}", args.config.display());
        }
        config::save_default_config(&args.config)?;
        info!(path = %args.config.display(), "Wrote default configuration");
        return Ok(());
    }

    // Load configuration
    let mut config = config::load_config(&args.config)?;

    // Override bind address if specified
    if let Some(bind) = args.bind {
        config.daemon.bind = bind;
    }
    if let Some(port) = args.port {
        config.set_port(port)?;
    }

    info!(
        bind = %config.daemon.bind,
        interval_secs = config.discovery.interval_secs,
        interface = ?config.discovery.interface,
        "Configuration loaded"
    );

    // Create application state
    let state = state::AppState::new(config);

    if args.scan_once {
        // Single scan mode
        info!("Running single discovery scan");
        let result = state.scanner.scan().await?;
        println!("Discovered {} devices at {}:", result.len(), result.scanned_at);
        for device in &result.devices {
            println!("  - {:<15}  {}", device.ip, device.mac);
        }
    } else {
        // Daemon mode - run web server and discovery
        server::run(state).await?;
    }

    Ok(())
}
