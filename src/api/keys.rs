use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::extract::Json;
use super::types::{
    AckResponse, AddKeyRequest, Denied, KeyActionRequest, KeyCreatedResponse, TokenQuery,
};
use super::{ApiError, AppState};

/// GET /keys
/// Keys owned by the token's user, optionally filtered by service id.
pub async fn list_keys(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TokenQuery>,
) -> Response {
    let Some(user) = state.auth.resolve_token(&query.token).await else {
        return (StatusCode::UNAUTHORIZED, Json(Denied::new())).into_response();
    };

    let keys = state
        .ledger
        .list_for_owner(&user, query.service_id.as_deref())
        .await;

    Json(keys).into_response()
}

/// POST /addkey
/// Mint a key with a caller-supplied code. The token check runs before field
/// validation, matching the original handler order.
pub async fn add_key(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AddKeyRequest>,
) -> Result<Json<KeyCreatedResponse>, ApiError> {
    let user = state
        .auth
        .resolve_token(&payload.token)
        .await
        .ok_or_else(|| ApiError::Unauthorized("Invalid token".to_string()))?;

    let key = state
        .ledger
        .create(
            &user,
            &payload.code,
            &payload.name,
            payload.service_id,
            payload.expiration_date,
        )
        .await?;

    Ok(Json(KeyCreatedResponse {
        success: true,
        key,
        message: "Key created!".to_string(),
    }))
}

/// POST /deletekey
pub async fn delete_key(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<KeyActionRequest>,
) -> Result<Response, ApiError> {
    let Some(user) = state.auth.resolve_token(&payload.token).await else {
        return Ok((StatusCode::UNAUTHORIZED, Json(Denied::new())).into_response());
    };

    if state.ledger.delete(&user, &payload.code).await? {
        Ok(Json(AckResponse { success: true }).into_response())
    } else {
        Ok((StatusCode::FORBIDDEN, Json(Denied::new())).into_response())
    }
}

/// POST /reset-hwid
/// Unbind an owned key so the next validation can bind a new device.
pub async fn reset_hwid(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<KeyActionRequest>,
) -> Result<Response, ApiError> {
    let Some(user) = state.auth.resolve_token(&payload.token).await else {
        return Ok((StatusCode::UNAUTHORIZED, Json(Denied::new())).into_response());
    };

    if state.ledger.reset_hwid(&user, &payload.code).await? {
        Ok(Json(AckResponse { success: true }).into_response())
    } else {
        Ok((StatusCode::FORBIDDEN, Json(Denied::new())).into_response())
    }
}
