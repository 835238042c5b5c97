//! shardctl control plane service entry point

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use shardctl::{api::HttpApi, config::Config, ShardCtl};

/// shardctl - Control plane for sharded SQL deployments
#[derive(Parser, Debug)]
#[command(name = "shardctl")]
#[command(about = "Shard registry, health monitoring and query routing for sharded SQL deployments")]
struct Args {
    /// Configuration file path (YAML format)
    #[arg(long)]
    config: Option<PathBuf>,

    /// HTTP API listen address
    #[arg(long)]
    http_addr: Option<String>,

    /// Data directory (registry is kept in memory only if unset)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Health probe interval (milliseconds)
    #[arg(long)]
    probe_interval_ms: Option<u64>,

    /// Default query timeout (milliseconds)
    #[arg(long)]
    query_timeout_ms: Option<u64>,

    /// Log level
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration from file if specified, otherwise use defaults
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    // Override config with command line arguments
    if let Some(http_addr) = args.http_addr {
        config.server.http_addr = http_addr;
    }
    if let Some(data_dir) = args.data_dir {
        config.server.data_dir = Some(data_dir);
    }
    if let Some(ms) = args.probe_interval_ms {
        config.health.probe_interval_ms = ms;
    }
    if let Some(ms) = args.query_timeout_ms {
        config.query.timeout_ms = ms;
    }
    if let Some(level) = args.log_level {
        config.log.level = level;
    }
    config.validate()?;

    // Initialize logging
    let level = match config.log.level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting shardctl...");
    if let Some(path) = &args.config {
        info!("  Config: {:?}", path);
    }
    info!("  HTTP API: {}", config.server.http_addr);
    info!("  Data dir: {:?}", config.server.data_dir);

    let http_addr = config.server.http_addr.clone();
    let ctl = Arc::new(ShardCtl::new(config).await?);

    // Start background tasks
    let _health_handle = ctl.start_health_monitor();
    let _save_handle = ctl.clone().start_periodic_save();

    let stats = ctl.registry().stats().await;
    info!(
        "Registry ready: {} projects, {} shards ({} online)",
        stats.total_projects, stats.total_shards, stats.online_shards
    );

    // Start HTTP API
    let app = HttpApi::new(ctl.clone()).router();

    let listener = tokio::net::TcpListener::bind(&http_addr).await?;
    info!("HTTP API listening on {}", http_addr);

    axum::serve(listener, app).await?;

    ctl.save().await?;
    Ok(())
}
