//! wstun - WebSocket tunnel client

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::broadcast;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use wstun::app::{start_api_server, TrafficStats};
use wstun::client::{Client, Forwarder};
use wstun::codec::Pipeline;
use wstun::common::Registry;
use wstun::config::{Config, InterfaceAddrs};
use wstun::error::{Error, Result};
use wstun::session::WebSocketDialer;
use wstun::tun::{create_interface, HostInfo, NetworkConfigurator, RouteContext, TunDevice};

/// Command line arguments
#[derive(Debug, Parser)]
#[command(name = "wstun", version, about = "WebSocket tunnel client")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print an example client config and exit
    #[arg(long)]
    gen_config: bool,

    /// Route all traffic through the tunnel
    #[arg(short, long)]
    global: bool,

    /// Log per-packet errors
    #[arg(short, long)]
    verbose: bool,

    /// Metrics listen address (e.g., 127.0.0.1:9090)
    #[arg(long = "api", value_name = "ADDR")]
    api_listen: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.gen_config {
        let json = serde_json::to_string_pretty(&Config::default_client())
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        println!("{}", json);
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    config.global_mode |= args.global;
    config.verbose |= args.verbose;
    if args.api_listen.is_some() {
        config.api_listen = args.api_listen.clone();
    }

    // Initialize logging
    let default_level = if config.verbose { Level::DEBUG } else { Level::INFO };
    let log_level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default_level);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::Config(format!("Failed to set tracing subscriber: {}", e)))?;

    if args.config.is_none() {
        info!("No config file specified, using defaults");
    }

    if config.server_mode {
        error!("server_mode is set, but only the client role is supported");
        return Err(Error::Unsupported("server mode".to_string()));
    }

    let addrs = config.validate().map_err(|e| {
        error!("Invalid configuration: {}", e);
        e
    })?;

    let api_addr = match &config.api_listen {
        Some(listen) => Some(listen.parse::<SocketAddr>().map_err(|_| {
            error!("Invalid api listen address: {}", listen);
            Error::Config(format!("Invalid api listen address: {}", listen))
        })?),
        None => None,
    };

    info!("wstun v{} starting...", env!("CARGO_PKG_VERSION"));

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(config, addrs, api_addr))?;

    info!("Goodbye!");
    Ok(())
}

async fn run(config: Config, addrs: InterfaceAddrs, api_addr: Option<SocketAddr>) -> Result<()> {
    let device = Arc::new(create_interface(&config, &addrs).map_err(|e| {
        error!("{}", e);
        e
    })?);

    let configurator = NetworkConfigurator::for_host();
    let host = if config.is_global_client() {
        HostInfo::discover(configurator.platform(), &config.server_addr).await
    } else {
        HostInfo::default()
    };

    configurator
        .configure(&RouteContext {
            config: &config,
            addrs: &addrs,
            tun_name: device.name(),
            host: &host,
        })
        .await;

    let (shutdown_tx, _) = broadcast::channel(1);
    if let Some(addr) = api_addr {
        tokio::spawn(start_api_server(addr, shutdown_tx.subscribe()));
    }

    let stats = TrafficStats::new();
    let forwarder = Forwarder {
        device,
        registry: Arc::new(Registry::new()),
        pipeline: Pipeline::from_config(&config),
        stats: stats.clone(),
        buffer_size: config.buffer_size,
        verbose: config.verbose,
    };
    let dialer = Arc::new(WebSocketDialer::from_config(&config)?);
    let client = Client::new(dialer, forwarder);

    info!(
        "Tunnel to {} ({}{})",
        config.server_addr,
        config.protocol.scheme(),
        if config.global_mode { ", global" } else { "" }
    );

    tokio::select! {
        _ = client.run() => {}
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                warn!("Failed to listen for Ctrl-C: {}", e);
            }
        }
    }

    info!("Shutting down...");
    let _ = shutdown_tx.send(());
    configurator.reset(&config, &host).await;
    info!("Traffic: {}", stats.summary());

    Ok(())
}
