//! Storyteller API server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use storyteller_api::error::AppError;
use storyteller_api::routes;
use storyteller_api::state::AppState;
use storyteller_core::clock::SystemClock;
use storyteller_generation::OpenAiGenerationClient;
use storyteller_narrative::application::config::EngineConfig;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting Storyteller API server");

    // Read configuration from environment. A missing credential stops the
    // server here, before any request could be attempted.
    let client = OpenAiGenerationClient::from_env()?;
    let engine_config = EngineConfig::from_env()?;
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse()
        .map_err(|e| AppError::Config(format!("PORT must be a valid u16: {e}")))?;

    tracing::info!(
        model = %client.config().model,
        reveal_tick = ?engine_config.reveal_tick,
        settle_delay = ?engine_config.session.settle_delay,
        "configuration loaded"
    );

    // Build application state.
    let app_state = AppState::new(Arc::new(client), Arc::new(SystemClock), engine_config);

    // Build router.
    // TODO: Replace CorsLayer::permissive() with restricted origins for production.
    let app = Router::new()
        .merge(routes::health::router())
        .nest("/api/v1/stories", routes::story::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server.
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app).await?;

    Ok(())
}
