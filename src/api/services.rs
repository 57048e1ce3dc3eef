use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::extract::Json;
use super::types::{
    AckResponse, AddServiceRequest, Denied, DeleteServiceRequest, ServiceCreatedResponse,
    TokenQuery,
};
use super::{ApiError, AppState};

/// GET /services
/// Services owned by the token's user, insertion order.
pub async fn list_services(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TokenQuery>,
) -> Response {
    let Some(user) = state.auth.resolve_token(&query.token).await else {
        return (StatusCode::UNAUTHORIZED, Json(Denied::new())).into_response();
    };

    let services = state.registry.list_for_owner(&user).await;
    Json(services).into_response()
}

/// POST /addservice
pub async fn add_service(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AddServiceRequest>,
) -> Result<Response, ApiError> {
    let Some(user) = state.auth.resolve_token(&payload.token).await else {
        return Ok((StatusCode::UNAUTHORIZED, Json(Denied::new())).into_response());
    };

    let service = state.registry.create(&user, &payload.name).await?;

    Ok(Json(ServiceCreatedResponse {
        success: true,
        service,
    })
    .into_response())
}

/// POST /deleteservice
/// Deleting a service cascades to every key scoped to it.
pub async fn delete_service(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<DeleteServiceRequest>,
) -> Result<Response, ApiError> {
    let Some(user) = state.auth.resolve_token(&payload.token).await else {
        return Ok((StatusCode::UNAUTHORIZED, Json(Denied::new())).into_response());
    };

    if state.registry.delete(&user, &payload.service_id).await? {
        Ok(Json(AckResponse { success: true }).into_response())
    } else {
        Ok((StatusCode::FORBIDDEN, Json(Denied::new())).into_response())
    }
}
