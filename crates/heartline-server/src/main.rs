mod config;

use std::sync::Arc;

use axum::{Json, Router, routing::get};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use heartline_api::auth::AppStateInner;
use heartline_gateway::Gateway;
use heartline_gateway::chat::ChatService;
use heartline_gateway::dispatcher::Dispatcher;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "heartline=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = Arc::new(heartline_db::Database::open(&config.db_path)?);

    // Shared state
    let dispatcher = Dispatcher::new();
    let app_state = AppStateInner::new(db.clone(), config.jwt_secret.clone(), config.history_limit_max);
    let gateway = Gateway::new(
        dispatcher.clone(),
        ChatService::new(db, config.history_limit_max),
        &config.jwt_secret,
    );

    let app = Router::new()
        .route("/health", get(health))
        .merge(heartline_api::router(app_state))
        .merge(heartline_gateway::router(gateway))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    info!("Heartline server listening on {}", config.addr);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shut down with {} gateway connections open", dispatcher.online_count().await);
    Ok(())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
