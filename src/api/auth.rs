use axum::{
    extract::State,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::AppJson;
use crate::api::state::AppState;
use crate::crypto::verify_password;
use crate::error::AppError;
use crate::session::generate_session_id;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: String,
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if req.password.is_empty() {
        return Err(AppError::Validation("Password required".to_string()));
    }

    let Some(stored_hash) = state.config.admin_password_hash.clone() else {
        tracing::error!("ADMIN_PASSWORD_HASH not set, admin login disabled");
        return Err(AppError::Auth("Invalid password".to_string()));
    };

    // Argon2 verification blocks for tens of milliseconds
    let valid = tokio::task::spawn_blocking(move || verify_password(&req.password, &stored_hash))
        .await
        .map_err(|e| AppError::Internal(format!("Password check panicked: {}", e)))??;

    if !valid {
        tracing::warn!("Failed admin login attempt");
        return Err(AppError::Auth("Invalid password".to_string()));
    }

    Ok(Json(serde_json::json!({"success": true})))
}

/// GET /api/session
pub async fn new_session() -> Json<SessionResponse> {
    Json(SessionResponse {
        session_id: generate_session_id(),
    })
}
