use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::types::{VerifyQuery, VerifyResponse};
use super::{ApiError, AppState};
use crate::services::{Verdict, VerifyRequest};

/// GET /verify
///
/// Runs the validation decision tree and maps each verdict onto the wire
/// contract. Business rejections (unknown key, expired, hwid mismatch) use a
/// 200 status with `valid: false` on purpose: the HTTP status must not
/// confirm or deny that a key exists. Only a persistence failure after an
/// accepting decision becomes a 5xx.
pub async fn verify(
    State(state): State<Arc<AppState>>,
    Query(query): Query<VerifyQuery>,
) -> Result<Response, ApiError> {
    let request = VerifyRequest {
        key_code: query.key,
        hwid: query.hwid,
        token: query.token,
        service_id: query.service_id,
    };

    let verdict = state.verifier.verify(&request).await?;

    let (status, message, reason) = match &verdict {
        Verdict::MissingParams => (StatusCode::BAD_REQUEST, "Missing parameters", None),
        Verdict::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid token", None),
        Verdict::UnknownKey => (StatusCode::OK, "Invalid key!", None),
        Verdict::WrongOwner => (
            StatusCode::FORBIDDEN,
            "This key belongs to a different account.",
            None,
        ),
        Verdict::WrongService => (
            StatusCode::FORBIDDEN,
            "This key is not valid for this service.",
            None,
        ),
        Verdict::Expired => (StatusCode::OK, "Key expired!", None),
        Verdict::Bound | Verdict::Valid => (StatusCode::OK, "Key validated!", None),
        Verdict::HwidMismatch => (
            StatusCode::OK,
            "This key is already in use on another device",
            Some("hwid_mismatch".to_string()),
        ),
    };

    let body = VerifyResponse {
        valid: verdict.is_valid(),
        message: message.to_string(),
        reason,
    };

    Ok((status, Json(body)).into_response())
}
