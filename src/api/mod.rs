pub mod auth;
pub mod chat;
pub mod state;
pub mod middleware;
pub mod preview;

pub use state::AppState;
pub use middleware::ClientIp;

use axum::{
    Router,
    http::StatusCode,
    routing::{get, patch, post},
};
use tower_http::{
    cors::CorsLayer,
    trace::TraceLayer,
    timeout::TimeoutLayer,
};
use std::time::Duration;
use serde::Serialize;

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

pub fn create_router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config.request_timeout_secs);

    Router::new()
        // Health check
        .route("/api/health", get(health))

        // Identity
        .route("/api/session", get(auth::new_session))
        .route("/api/auth/login", post(auth::login))

        // Chat endpoints
        .route("/api/chat", get(chat::list_messages).post(chat::submit_message))
        .route("/api/chat/count", get(chat::count_messages))
        .route("/api/chat/{id}", patch(chat::edit_message).delete(chat::delete_message))

        // Link previews
        .route("/api/fetch-title", get(preview::fetch_link_title))

        // Add request timeout
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> axum::Json<HealthResponse> {
    axum::Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
