use axum::{extract::State, http::StatusCode, response::IntoResponse};
use std::sync::Arc;

use super::extract::Json;
use super::types::{
    ErrorBody, LoginRequest, RegisterRequest, SessionResponse, TokenInfoResponse,
    VerifyTokenRequest,
};
use super::{ApiError, AppState};
use crate::services::Session;

/// POST /register
/// Create an account; responds with the initial session token.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state
        .auth
        .register(&payload.username, &payload.password, &payload.email)
        .await?;

    Ok(Json(session_response(session, "Account created!")))
}

/// POST /login
/// Verify credentials and issue a fresh token. Any previously issued token
/// for the account stops working.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state
        .auth
        .login(&payload.username, &payload.password)
        .await?;

    Ok(Json(session_response(session, "Logged in!")))
}

/// POST /verify-token
/// Check whether a bearer token still resolves to a user.
pub async fn verify_token(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<VerifyTokenRequest>,
) -> impl IntoResponse {
    match state.auth.resolve_token(&payload.token).await {
        Some(user) => Json(TokenInfoResponse {
            success: true,
            username: user.username,
            user_id: user.id,
        })
        .into_response(),
        None => (
            StatusCode::UNAUTHORIZED,
            Json(ErrorBody::new("Invalid token".to_string())),
        )
            .into_response(),
    }
}

fn session_response(session: Session, message: &str) -> SessionResponse {
    SessionResponse {
        success: true,
        token: session.token,
        username: session.username,
        user_id: session.user_id,
        message: message.to_string(),
    }
}
