use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dashboard_chat::{
    api::{create_router, AppState},
    config::Config,
    db,
    error::AppError,
};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,dashboard_chat=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting dashboard chat server v{}...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Arc::new(Config::from_env()?);
    tracing::info!(cipher = ?config.privacy_cipher, "Configuration loaded");

    // Setup database and run migrations
    let pool = db::connect(&config).await?;
    tracing::info!("Database connected: {}", config.database_url);

    let state = AppState::new(config.clone(), pool);
    tracing::info!(
        "Abuse guard configured ({} req / {}s per client)",
        config.rate_limit_max,
        config.rate_limit_window_secs
    );

    // Spawn background task for rate limiter cleanup
    {
        let guard = state.chat.guard().clone();
        let every = Duration::from_secs(config.rate_limit_sweep_secs.max(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                let evicted = guard.sweep().await;
                tracing::debug!(evicted, "Rate limiter windows swept");
            }
        });
        tracing::info!("Rate limiter cleanup task started");
    }

    // Build router
    let app = create_router(state);

    // Bind and serve
    let addr = config.server_address();
    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("  POST   /api/chat          - Submit message");
    tracing::info!("  GET    /api/chat          - List messages");
    tracing::info!("  GET    /api/chat/count    - Count messages");
    tracing::info!("  PATCH  /api/chat/{{id}}     - Edit message");
    tracing::info!("  DELETE /api/chat/{{id}}     - Delete message");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .map_err(|e| AppError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}
