//! Prometheus exporter for NIFCLOUD RDB metrics.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

use nifcloud_exporter::http::parse_listen_address;
use nifcloud_exporter::{Config, HttpServer, NifcloudCollector};

/// Prometheus exporter for NIFCLOUD RDB metrics.
#[derive(Parser, Debug)]
#[command(name = "nifcloud_exporter")]
#[command(about = "Export NIFCLOUD RDB metrics in Prometheus format")]
#[command(version)]
struct Args {
    /// Address on which to expose metrics and web interface.
    #[arg(long = "web.listen-address", default_value = ":9042")]
    listen_address: String,

    /// Path under which to expose exporter's metrics.
    #[arg(long = "web.telemetry-path", default_value = "/metrics")]
    telemetry_path: String,

    /// Path to configuration file.
    #[arg(long = "config.file", default_value = "config.yml")]
    config_file: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON.
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = args.log_level.parse().unwrap_or(Level::INFO);
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("nifcloud_exporter={}", log_level).parse()?)
        .add_directive(format!("nifcloud_rdb={}", log_level).parse()?);

    if args.log_json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("Starting NIFCLOUD exporter");

    // Load configuration
    let config = Config::load_from_file(&args.config_file)?;

    if !args.telemetry_path.starts_with('/') {
        return Err(anyhow::anyhow!(
            "Telemetry path must start with /: {}",
            args.telemetry_path
        ));
    }
    let listen_addr = parse_listen_address(&args.listen_address)?;

    info!(
        listen = %listen_addr,
        path = %args.telemetry_path,
        config = %args.config_file,
        environments = config.rdb.len(),
        instances = config.instance_count(),
        "Configuration loaded"
    );

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Create the collector
    let collector = Arc::new(NifcloudCollector::from_config(&config));

    // Start HTTP server
    let http_server = HttpServer::new(collector.clone(), listen_addr, args.telemetry_path.clone());
    let http_task = tokio::spawn(async move {
        if let Err(e) = http_server.run(shutdown_rx).await {
            error!("HTTP server error: {}", e);
        }
    });

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = async {
            #[cfg(unix)]
            {
                let mut sigterm = tokio::signal::unix::signal(
                    tokio::signal::unix::SignalKind::terminate()
                ).unwrap();
                sigterm.recv().await;
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
            }
        } => {
            info!("Received SIGTERM, shutting down...");
        }
    }

    // Signal shutdown
    shutdown_tx.send(true)?;

    // Wait for the server to stop
    let _ = tokio::time::timeout(Duration::from_secs(5), http_task).await;

    // Print final stats
    let stats = collector.stats();
    info!(
        requests_total = stats.requests_total(),
        failure_requests = stats.failure_requests(),
        "Final statistics"
    );

    info!("Exporter stopped");
    Ok(())
}
