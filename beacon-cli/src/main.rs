use anyhow::{Context, Result};
use beacon_server::{
    DEFAULT_PING_INTERVAL, DEFAULT_PING_TIMEOUT, DEFAULT_PORT, DEFAULT_ROOM_MAX_AGE,
    DEFAULT_SWEEP_INTERVAL, RelayConfig, serve,
};
use clap::Parser;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// WebRTC signaling relay: rooms, offers, answers and ICE candidates over WebSocket.
#[derive(Parser, Debug)]
#[command(name = "beacon-relay", version)]
struct Args {
    /// Address to bind.
    #[arg(long, env = "BEACON_HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    host: IpAddr,

    /// Port to listen on.
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Empty rooms older than this many seconds are removed by the sweep.
    #[arg(long, env = "BEACON_ROOM_MAX_AGE_SECS", default_value_t = DEFAULT_ROOM_MAX_AGE.as_secs())]
    room_max_age_secs: u64,

    /// Seconds between sweeps.
    #[arg(long, env = "BEACON_SWEEP_INTERVAL_SECS", default_value_t = DEFAULT_SWEEP_INTERVAL.as_secs())]
    sweep_interval_secs: u64,

    /// Seconds between WebSocket pings.
    #[arg(long, env = "BEACON_PING_INTERVAL_SECS", default_value_t = DEFAULT_PING_INTERVAL.as_secs())]
    ping_interval_secs: u64,

    /// Close a socket that sends nothing, pongs included, for this many seconds.
    #[arg(long, env = "BEACON_PING_TIMEOUT_SECS", default_value_t = DEFAULT_PING_TIMEOUT.as_secs())]
    ping_timeout_secs: u64,
}

impl Args {
    fn into_config(self) -> RelayConfig {
        RelayConfig {
            listen_addr: SocketAddr::new(self.host, self.port),
            room_max_age: Duration::from_secs(self.room_max_age_secs),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
            ping_interval: Duration::from_secs(self.ping_interval_secs),
            ping_timeout: Duration::from_secs(self.ping_timeout_secs),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Args::parse().into_config();
    config.validate().context("Invalid configuration")?;

    info!(
        "Rooms expire after {:?} empty; sweeping every {:?}",
        config.room_max_age, config.sweep_interval
    );
    info!(
        "Pinging every {:?}; idle sockets close after {:?}",
        config.ping_interval, config.ping_timeout
    );

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;

    serve(listener, &config, shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Ctrl-C received. Shutting down gracefully..."),
        _ = terminate => info!("SIGTERM received. Shutting down gracefully..."),
    }
}
