use std::convert::Infallible;

use axum::{
    extract::{rejection::JsonRejection, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::{Stream, StreamExt};
use serde::Serialize;
use serde_json::Value;

use super::error::ApiResult;
use super::state::AppState;
use crate::models::{Chat, NewChat};
use crate::services::GenerateRequest;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

impl StatusResponse {
    fn success() -> Json<Self> {
        Json(Self { status: "success" })
    }
}

/// POST /api/generate
///
/// Upstream failures arrive in-band as an `[ERROR]` event; the response
/// status is always 200 once streaming starts.
pub async fn generate(
    State(state): State<AppState>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let Json(request) = payload?;

    let stream = state
        .relay
        .relay(request)
        .map(|frame| Ok(Event::default().data(frame.data())));

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// GET /api/history
pub async fn get_history(State(state): State<AppState>) -> Json<Value> {
    Json(state.legacy_history.get().await)
}

/// POST /api/history
pub async fn replace_history(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<StatusResponse>> {
    let Json(document) = payload?;
    state.legacy_history.replace(&document).await?;
    Ok(StatusResponse::success())
}

/// DELETE /api/history
pub async fn clear_history(State(state): State<AppState>) -> ApiResult<Json<StatusResponse>> {
    state.legacy_history.clear().await?;
    Ok(StatusResponse::success())
}

/// GET /api/histories
pub async fn list_histories(State(state): State<AppState>) -> ApiResult<Json<Vec<Chat>>> {
    let chats = state.db.list_histories().await?;
    Ok(Json(chats))
}

/// POST /api/histories
pub async fn save_histories(
    State(state): State<AppState>,
    payload: Result<Json<Vec<NewChat>>, JsonRejection>,
) -> ApiResult<Json<StatusResponse>> {
    let Json(chats) = payload?;
    tracing::debug!("Received {} histories to save", chats.len());
    state.db.save_histories(chats).await?;
    Ok(StatusResponse::success())
}
