use crate::app_env::AppConfig;
use crate::session::TokenKeys;
use anyhow::Context;
use axum::extract::State;
use std::sync::Arc;
use tracing::info;

mod api;
mod app_env;
mod db;
mod domain;
mod dto;
mod external_connections;
mod logging;
mod persistence;
mod routes;
mod routing_utils;
mod session;

/// Data shared by every request handler
pub struct SharedData {
    pub ext_cxn: persistence::ExternalConnectivity,
    pub token_keys: TokenKeys,
}

/// Shorthand for extracting [SharedData] in a handler
pub type AppState = State<Arc<SharedData>>;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    dotenv::dotenv().ok();

    let config = AppConfig::from_env()?;
    let otel_exporters = match &config.otel {
        Some(endpoints) => Some(logging::init_exporters(&endpoints.spans, &endpoints.metrics)?),
        None => None,
    };
    logging::setup_logging_and_tracing(logging::init_env_filter()?, otel_exporters);

    info!("Connecting to database...");
    let sqlx_db_connection = db::connect_sqlx(&config.db_url).await?;
    db::run_migrations(&sqlx_db_connection).await?;

    let shared_data = Arc::new(SharedData {
        ext_cxn: persistence::ExternalConnectivity::new(sqlx_db_connection),
        token_keys: TokenKeys::new(&config.jwt_secret, config.token_ttl),
    });
    let router = routes::build_router(shared_data);

    let listener = tokio::net::TcpListener::bind(&config.listen_address)
        .await
        .with_context(|| format!("binding to {}", config.listen_address))?;
    info!("Starting server on {}", config.listen_address);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running the HTTP server")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    wait_for_shutdown(tokio::signal::ctrl_c()).await
}

/// Resolves once the signal arrives. If the signal can't be listened for, the server keeps
/// running instead of stopping straight away.
async fn wait_for_shutdown(signal: impl Future<Output = std::io::Result<()>>) {
    if let Err(err) = signal.await {
        tracing::error!("Could not listen for the shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
}
