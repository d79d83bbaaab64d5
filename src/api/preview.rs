use axum::{
    extract::State,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::AppQuery;
use crate::api::state::AppState;
use crate::error::AppError;
use crate::preview::fetch_title;

#[derive(Debug, Deserialize)]
pub struct FetchTitleQuery {
    pub url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TitleResponse {
    pub title: String,
}

/// GET /api/fetch-title?url=..
pub async fn fetch_link_title(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<FetchTitleQuery>,
) -> Result<Json<TitleResponse>, AppError> {
    let url = query
        .url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .ok_or_else(|| AppError::Validation("URL is required".to_string()))?;

    let title = fetch_title(&state.http, url).await;
    Ok(Json(TitleResponse { title }))
}
