use anyhow::Context;
use clap::Parser;
use flightdeck::{
    TelemetryHub,
    config::ServerConfig,
    server::{self, AppState},
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Flightdeck - MAVLink telemetry relay and ULog viewer backend
#[derive(Parser, Debug)]
#[command(name = "flightdeck")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP listen address
    #[arg(long)]
    http_addr: Option<SocketAddr>,

    /// UDP host to receive MAVLink on
    #[arg(long)]
    udp_host: Option<String>,

    /// UDP port to receive MAVLink on
    #[arg(long)]
    udp_port: Option<u16>,

    /// Bind the UDP socket on the first stream request instead of at boot
    #[arg(long)]
    no_auto_start: bool,
}

impl Cli {
    fn apply(self, config: &mut ServerConfig) {
        if let Some(addr) = self.http_addr {
            config.http_addr = addr;
        }
        if let Some(host) = self.udp_host {
            config.udp_host = host;
        }
        if let Some(port) = self.udp_port {
            config.udp_port = port;
        }
        if self.no_auto_start {
            config.auto_start = false;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flightdeck=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = ServerConfig::load(cli.config.as_deref()).context("loading configuration")?;
    cli.apply(&mut config);

    info!("Starting flightdeck v{}", env!("CARGO_PKG_VERSION"));
    info!("   HTTP address: {}", config.http_addr);
    info!("   UDP telemetry: {}:{}", config.udp_host, config.udp_port);
    info!("   Auto start: {}", config.auto_start);

    let hub = Arc::new(TelemetryHub::new(config.channel_capacity));
    if config.auto_start {
        if let Err(e) = hub.start(&config.udp_host, config.udp_port).await {
            warn!("Continuing without live telemetry: {}", e);
        }
    }

    let http_addr = config.http_addr;
    let app = server::router(AppState::new(hub, config));

    let listener = tokio::net::TcpListener::bind(http_addr)
        .await
        .with_context(|| format!("binding HTTP listener on {http_addr}"))?;
    info!("Listening on http://{}", http_addr);
    info!("   Stream endpoint: http://{}/api/telemetry/stream", http_addr);

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
