use serde::{Deserialize, Serialize};

use crate::models::{LicenseKey, Service};

// ============================================================================
// Request bodies
// ============================================================================

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub email: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct VerifyTokenRequest {
    pub token: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct AddKeyRequest {
    pub token: String,
    pub code: String,
    pub name: String,
    pub service_id: Option<String>,
    pub expiration_date: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct KeyActionRequest {
    pub token: String,
    pub code: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct AddServiceRequest {
    pub token: String,
    pub name: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct DeleteServiceRequest {
    pub token: String,
    pub service_id: String,
}

/// Query string for the GET endpoints; the token travels here rather than in
/// an Authorization header (compat with existing clients).
#[derive(Debug, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct TokenQuery {
    pub token: String,
    pub service_id: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct VerifyQuery {
    pub key: String,
    pub hwid: String,
    pub token: String,
    pub service_id: String,
}

// ============================================================================
// Response bodies
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
}

impl ErrorBody {
    #[must_use]
    pub const fn new(message: String) -> Self {
        Self {
            success: false,
            message,
        }
    }
}

/// Bare `{success: false}`, used by the endpoints whose original responses
/// carry no message.
#[derive(Debug, Default, Serialize)]
pub struct Denied {
    pub success: bool,
}

impl Denied {
    #[must_use]
    pub const fn new() -> Self {
        Self { success: false }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub success: bool,
    pub token: String,
    pub username: String,
    pub user_id: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfoResponse {
    pub success: bool,
    pub username: String,
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub valid: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct KeyCreatedResponse {
    pub success: bool,
    pub key: LicenseKey,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ServiceCreatedResponse {
    pub success: bool,
    pub service: Service,
}

#[derive(Debug, Serialize)]
pub struct AckResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct PingResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub users: usize,
    pub keys: usize,
    pub services: usize,
}
