//! Padlink server binary.
//!
//! # Usage
//!
//! ```bash
//! # Development: accept any origin
//! padlink-server --bind 0.0.0.0:3001
//!
//! # Production: restrict origins and tighten the room timeout
//! padlink-server --bind 0.0.0.0:3001 \
//!     --allowed-origins https://play.example.com \
//!     --room-timeout-secs 1800
//! ```

use std::time::Duration;

use clap::Parser;
use padlink_server::{DriverConfig, RuntimeConfig, Server};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Padlink session server
#[derive(Parser, Debug)]
#[command(name = "padlink-server")]
#[command(about = "Room and signaling server for small real-time game lobbies")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:3001")]
    bind: String,

    /// Comma-separated origins accepted for WebSocket upgrades ("*" for any)
    #[arg(long, default_value = "*", value_delimiter = ',')]
    allowed_origins: Vec<String>,

    /// Seconds a room may exist before the reaper evicts it
    #[arg(long, default_value = "3600")]
    room_timeout_secs: u64,

    /// Seconds between reaper sweeps
    #[arg(long, default_value = "300")]
    reap_interval_secs: u64,

    /// Seconds between connection keepalive probes
    #[arg(long, default_value = "30")]
    keepalive_interval_secs: u64,

    /// Maximum concurrent connections
    #[arg(long, default_value = "10000")]
    max_connections: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("padlink server starting");
    tracing::info!("binding to {}", args.bind);

    if args.allowed_origins.iter().any(|o| o == "*") {
        tracing::warn!("accepting WebSocket upgrades from any origin");
    }

    let config = RuntimeConfig {
        bind_address: args.bind,
        allowed_origins: args.allowed_origins,
        driver: DriverConfig {
            max_connections: args.max_connections,
            room_timeout: Duration::from_secs(args.room_timeout_secs),
            reap_interval: Duration::from_secs(args.reap_interval_secs),
            keepalive_interval: Duration::from_secs(args.keepalive_interval_secs),
        },
    };

    let server = Server::bind(config).await?;

    tracing::info!("server listening on {}", server.local_addr()?);

    server.run().await?;

    Ok(())
}
