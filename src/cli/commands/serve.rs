use std::sync::Arc;

use anyhow::Context;
use clap::Args;

use crate::config::config;
use crate::database::{DatabaseManager, MemoryStore, PgStore, Store};
use crate::server::app;
use crate::state::AppState;

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[arg(long, help = "Port to listen on (defaults to MADRASA_API_PORT / PORT / config)")]
    pub port: Option<u16>,

    #[arg(long, help = "Serve from an empty in-process store instead of PostgreSQL")]
    pub memory: bool,
}

pub async fn handle(args: ServeArgs) -> anyhow::Result<()> {
    let config = config();
    tracing::info!("Starting madrasa-api in {:?} mode", config.environment);

    let store: Arc<dyn Store> = if args.memory {
        tracing::warn!("Using in-memory store; data is lost on exit");
        Arc::new(MemoryStore::new())
    } else {
        let pool = DatabaseManager::connect_and_prepare()
            .await
            .context("failed to prepare database")?;
        Arc::new(PgStore::new(pool))
    };

    let port = args.port.unwrap_or(config.api.port);
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("madrasa-api listening on http://{}", bind_addr);
    axum::serve(listener, app(AppState::new(store)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
