//! AAD Gateway - Azure AD bearer-token gateway
//!
//! Verifies tokens against the tenant JWKS and serves the demo API.

use aad_gateway::{api, config::Config, server::Server};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// AAD Gateway - Azure AD bearer-token verification in front of a demo API
#[derive(Parser, Debug)]
#[command(name = "aad-gateway")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file; without one, settings come from the environment
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting AAD Gateway v{}", aad_gateway::VERSION);

    // Load configuration
    let config = match &args.config {
        Some(path) => {
            let config = Config::load(path)?;
            info!("Loaded configuration from {:?}", path);
            config
        }
        None => {
            let config = Config::from_env()?;
            info!("Loaded configuration from environment");
            config
        }
    };

    let guard = Arc::new(config.auth.build_guard()?);
    info!(
        tenant = %config.auth.tenant_id,
        audience = %config.auth.audience,
        jwks_url = %config.auth.jwks_url(),
        "Token verification configured"
    );

    // Start server
    let server = Server::bind(&config.server, api::build_router(&config, guard)).await?;
    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
                futures::future::pending::<()>().await;
            }
        })
        .await?;

    Ok(())
}
