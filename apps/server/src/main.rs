//! OnAir Server - standalone now-playing push daemon.
//!
//! Serves the `/push/onair` WebSocket feed, listens for loopback control
//! messages, and doubles as a control client via `--notify`.

mod config;

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use onair_core::{api, bootstrap_services, send_raw, start_server};
use tokio::signal;

use crate::config::ServerConfig;

/// OnAir Server - pushes what is on the air to WebSocket clients.
#[derive(Parser, Debug)]
#[command(name = "onair-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "ONAIR_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// Bind port (overrides config file).
    #[arg(short = 'p', long, env = "ONAIR_BIND_PORT")]
    port: Option<u16>,

    /// Control port (overrides config file).
    #[arg(long, env = "ONAIR_CONTROL_PORT")]
    control_port: Option<u16>,

    /// Playlist fixture (overrides config file).
    #[arg(long, value_name = "FILE")]
    playlist: Option<PathBuf>,

    /// Send MESSAGE to a running instance's control port and exit.
    /// An empty message asks it to poll now.
    #[arg(long, value_name = "MESSAGE")]
    notify: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    let mut config =
        ServerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // Apply CLI overrides
    if let Some(port) = args.port {
        config.bind_port = port;
    }
    if let Some(port) = args.control_port {
        config.control_port = port;
    }
    if let Some(playlist) = args.playlist {
        config.playlist_file = Some(playlist);
    }

    if let Some(message) = args.notify {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, config.control_port));
        send_raw(addr, &message)
            .await
            .with_context(|| format!("Failed to notify {}", addr))?;
        return Ok(());
    }

    log::info!("OnAir Server v{}", env!("CARGO_PKG_VERSION"));
    log::info!(
        "Configuration: bind_port={}, control_port={}, provider={}, proxies={}",
        config.bind_port,
        config.control_port,
        if config.discogs_token.is_some() {
            "discogs"
        } else {
            "none"
        },
        config.proxies.len()
    );

    let core_config = config.to_core_config();
    let services = bootstrap_services(&core_config).context("Failed to bootstrap services")?;
    log::info!("Services bootstrapped successfully");

    let listener = api::bind(core_config.bind_port)
        .await
        .context("Failed to start HTTP server")?;

    services.start_background_tasks();

    let server_handle = tokio::spawn(start_server(
        services.app_state(),
        listener,
        services.cancel_token.clone(),
    ));

    shutdown_signal().await;
    log::info!("Shutdown signal received, cleaning up...");

    services.shutdown();

    match server_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => log::error!("Server error: {}", e),
        Err(e) => log::error!("Server task failed: {}", e),
    }

    log::info!("Shutdown complete");
    Ok(())
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
