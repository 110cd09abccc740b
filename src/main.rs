use anyhow::Result;
use axum::{http::StatusCode, response::Json, routing::get, Router};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, Level};

use reviewbot::config::Config;
use reviewbot::github::GitHubClient;
use reviewbot::handlers::EventProcessor;
use reviewbot::webhook::webhook_router;
use reviewbot::AppState;

async fn health_check() -> Result<Json<serde_json::Value>, StatusCode> {
    Ok(Json(json!({
        "status": "healthy",
        "service": "reviewbot"
    })))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    info!("Starting reviewer check-run bot");

    let config = Config::from_env()?;

    let github_client = GitHubClient::new(config.github_token, config.github_app_id);
    let processor = EventProcessor::new(Arc::new(github_client), config.bot_login);

    let app_state = Arc::new(AppState {
        processor,
        webhook_secret: config.github_webhook_secret,
    });

    let app = Router::new()
        .route("/health", get(health_check))
        .merge(webhook_router(app_state.clone()))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(app_state.clone());

    let listener = TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    info!("Server listening on port {}", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}
