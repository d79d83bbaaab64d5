use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{AppJson, AppQuery, ClientIp};
use crate::api::state::AppState;
use crate::error::AppError;
use crate::service::{Caller, MessageView, SubmitRequest};

#[derive(Debug, Serialize, Deserialize)]
pub struct MessagesResponse {
    pub messages: Vec<MessageView>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: i64,
}

#[derive(Debug, Deserialize)]
pub struct EditRequest {
    #[serde(default)]
    pub content: String,
}

/// POST /api/chat
pub async fn submit_message(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    AppJson(req): AppJson<SubmitRequest>,
) -> Result<Json<MessageView>, AppError> {
    let message = state.chat.submit(&ip, req).await?;
    Ok(Json(message))
}

/// GET /api/chat?session_id=..&is_admin=..
pub async fn list_messages(
    State(state): State<AppState>,
    AppQuery(caller): AppQuery<Caller>,
) -> Result<Json<MessagesResponse>, AppError> {
    let messages = state.chat.list(&caller).await?;
    Ok(Json(MessagesResponse { messages }))
}

/// GET /api/chat/count?session_id=..&is_admin=..
pub async fn count_messages(
    State(state): State<AppState>,
    AppQuery(caller): AppQuery<Caller>,
) -> Result<Json<CountResponse>, AppError> {
    let count = state.chat.count(&caller).await?;
    Ok(Json(CountResponse { count }))
}

/// PATCH /api/chat/{id}
pub async fn edit_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppQuery(caller): AppQuery<Caller>,
    AppJson(req): AppJson<EditRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.chat.edit(&id, &caller, &req.content).await?;
    Ok(Json(serde_json::json!({"success": true})))
}

/// DELETE /api/chat/{id}
pub async fn delete_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppQuery(caller): AppQuery<Caller>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.chat.delete(&id, &caller).await?;
    Ok(Json(serde_json::json!({"success": true})))
}
