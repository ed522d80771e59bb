//! Tabula Binary Entry Point
//!
//! This binary runs the Tabula database admin service.
//! Core functionality is provided by the `tabula` library crate.

use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tabula::{
    config::AppConfig,
    registry::{self, ConnectionRegistry},
    server::{AppState, create_router},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Tabula - Lightweight Database Admin API
#[derive(Parser, Debug)]
#[command(name = "tabula", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "TABULA_CONFIG")]
    config: Option<String>,

    /// Server bind address (overrides config file)
    #[arg(long, env = "TABULA_BIND")]
    bind: Option<String>,

    /// Server port (overrides config file)
    #[arg(long, env = "TABULA_PORT")]
    port: Option<u16>,

    /// Database connection, repeatable: "name=connString" or a bare
    /// connection string with a derived name
    #[arg(long = "db", value_name = "NAME=CONN")]
    databases: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tabula=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Tabula - Lightweight Database Admin API");

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration from file when given, otherwise use defaults
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path);
            AppConfig::load(path)?
        }
        None => AppConfig::default(),
    };

    // Apply CLI/env overrides (CLI > ENV > config file)
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let registry = Arc::new(ConnectionRegistry::new(config.database.connect_timeout()));

    // Config-file connections first, then --db flags, then the fallback
    let mut pending: Vec<(String, String)> = config
        .database
        .connections
        .iter()
        .map(|c| (c.name.clone(), c.conn_string.clone()))
        .collect();

    for (i, arg) in cli.databases.iter().enumerate() {
        let (name, conn_string) = parse_connection_arg(arg);
        let name = match name {
            Some(name) => name,
            None => {
                let derived = registry::derive_name(&conn_string);
                if derived.is_empty() {
                    format!("db{}", pending.len() + i + 1)
                } else {
                    derived
                }
            }
        };
        pending.push((name, conn_string));
    }

    if pending.is_empty() {
        tracing::info!("No connections configured, using sqlite:tabula.db");
        pending.push(("main".to_string(), "sqlite:tabula.db".to_string()));
    }

    for (name, conn_string) in &pending {
        tracing::info!("Connecting to database: {} ({})", name, conn_string);
        registry.add(name, conn_string).await?;
    }

    // Create web server state
    let app_state = AppState {
        registry: Arc::clone(&registry),
    };

    // Build Axum router
    let app = create_router(app_state);

    // Parse bind address
    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;

    tracing::info!("Web server listening on: http://{}", addr);
    tracing::info!("Press Ctrl+C to shutdown");

    // Start server with graceful shutdown
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(registry))
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Split a `--db` argument into an optional name and a connection string.
/// The prefix before `=` counts as a name only when it looks like one;
/// that keeps bare connection strings containing `=` (query parameters)
/// from being split in half.
fn parse_connection_arg(arg: &str) -> (Option<String>, String) {
    if let Some((name, conn)) = arg.split_once('=') {
        let looks_like_name = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if looks_like_name {
            return (Some(name.to_string()), conn.to_string());
        }
    }
    (None, arg.to_string())
}

/// Setup graceful shutdown signal handler.
async fn shutdown_signal(registry: Arc<ConnectionRegistry>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }

    tracing::info!("Closing database connections...");
    if let Err(e) = registry.close_all().await {
        tracing::error!("Failed to close connections: {}", e);
    }
}
