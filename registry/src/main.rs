mod config;
mod db;
mod errors;
mod metrics;
mod model;
mod orchestrator;
mod rest;
mod store;
mod validate;
mod wake;

use axum::{routing::get, Router};
use clap::Parser;
use config::Config;
use db::{PgActivityLog, PgDeviceStore};
use rest::AppState;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use wake::UdpDispatcher;

#[tokio::main]
async fn main() {
    let config = Config::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting device registry");
    info!("HTTP server: {}", config.http_addr);
    info!("Database: {}", config.database_host());
    info!("Wake-on-LAN target: {}", config.wol_target);

    metrics::init_metrics();

    let pool = match db::make_pool(&config.database_url, config.db_max_connections).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    let state = AppState {
        devices: Arc::new(PgDeviceStore::new(pool.clone())),
        activities: Arc::new(PgActivityLog::new(pool.clone())),
        dispatcher: Arc::new(UdpDispatcher::new(config.wol_target)),
    };

    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .merge(rest::create_router(state));

    let listener = tokio::net::TcpListener::bind(&config.http_addr)
        .await
        .unwrap_or_else(|e| {
            error!("Failed to bind to {}: {}", config.http_addr, e);
            std::process::exit(1);
        });

    info!("HTTP server listening on {}", config.http_addr);

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap_or_else(|e| {
            error!("HTTP server error: {}", e);
        });
    });

    tokio::select! {
        _ = server_handle => {
            error!("HTTP server terminated");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Shutting down");
    pool.close().await;
}

async fn metrics_handler() -> String {
    metrics::gather_metrics()
}
