use axum::{Json, extract::State};
use std::sync::Arc;

use super::types::{PingResponse, StatusResponse};
use super::AppState;

/// GET /ping
pub async fn ping() -> Json<PingResponse> {
    Json(PingResponse { status: "online" })
}

/// GET /status
/// Collection counts, unauthenticated.
pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let store = state.store.lock().await;

    Json(StatusResponse {
        status: "ok",
        users: store.users.len(),
        keys: store.keys.len(),
        services: store.services.len(),
    })
}
