//! civicd - municipal complaint service daemon

use anyhow::Context;
use civic_service::config::StorageConfig;
use civic_service::{Server, ServiceConfig};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// civicd CLI
#[derive(Parser)]
#[command(name = "civicd")]
#[command(about = "Civic Desk - municipal complaint lifecycle service", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "CIVIC_CONFIG")]
    config: Option<String>,

    /// Listen address, overrides the configuration file
    #[arg(short, long, env = "CIVIC_LISTEN_ADDR")]
    listen: Option<String>,

    /// PostgreSQL URL; selects the postgres backend
    #[arg(long, env = "CIVIC_DATABASE_URL")]
    database_url: Option<String>,

    /// Log level
    #[arg(long, env = "CIVIC_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long, env = "CIVIC_LOG_JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| cli.log_level.clone().into());

    if cli.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    // Load configuration
    let mut config =
        ServiceConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    // Override with CLI args
    if let Some(listen) = &cli.listen {
        config.server.listen_addr = listen
            .parse()
            .with_context(|| format!("invalid listen address '{listen}'"))?;
    }
    if let Some(url) = cli.database_url {
        config.storage = match config.storage {
            StorageConfig::Postgres {
                max_connections,
                connect_timeout_secs,
                ..
            } => StorageConfig::Postgres {
                url,
                max_connections,
                connect_timeout_secs,
            },
            StorageConfig::Memory => StorageConfig::Postgres {
                url,
                max_connections: 10,
                connect_timeout_secs: 5,
            },
        };
    }
    config.logging.level = cli.log_level;
    config.logging.json = cli.json;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = %config.server.listen_addr,
        "Starting civicd"
    );

    Server::new(config).run().await?;
    Ok(())
}
