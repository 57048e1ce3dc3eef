use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

use super::types::ErrorBody;
use crate::services::{CreateKeyError, LoginError, RegisterError};

/// Handler-level failure. Owns the status mapping; every variant renders as a
/// structured `{success: false, message}` body.
///
/// Duplicate usernames/emails/key codes report 400 rather than 409 to keep the
/// wire contract of the original clients.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),

    Unauthorized(String),

    Forbidden(String),

    Conflict(String),

    RateLimited,

    Internal(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadRequest(msg) => write!(f, "Bad request: {msg}"),
            Self::Unauthorized(msg) => write!(f, "Unauthorized: {msg}"),
            Self::Forbidden(msg) => write!(f, "Forbidden: {msg}"),
            Self::Conflict(msg) => write!(f, "Conflict: {msg}"),
            Self::RateLimited => write!(f, "Rate limited"),
            Self::Internal(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) | Self::Conflict(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            Self::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests. Try again in a minute.".to_string(),
            ),
            Self::Internal(msg) => {
                tracing::error!("Internal error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorBody::new(message))).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<RegisterError> for ApiError {
    fn from(err: RegisterError) -> Self {
        match err {
            RegisterError::MissingFields
            | RegisterError::UsernameTooShort
            | RegisterError::PasswordTooShort
            | RegisterError::InvalidEmail => Self::BadRequest(err.to_string()),
            RegisterError::UsernameTaken | RegisterError::EmailTaken => {
                Self::Conflict(err.to_string())
            }
            RegisterError::Internal(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<LoginError> for ApiError {
    fn from(err: LoginError) -> Self {
        match err {
            LoginError::MissingFields => Self::BadRequest(err.to_string()),
            LoginError::UserNotFound | LoginError::BadPassword => {
                Self::Unauthorized(err.to_string())
            }
            LoginError::Internal(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<CreateKeyError> for ApiError {
    fn from(err: CreateKeyError) -> Self {
        match err {
            CreateKeyError::MissingFields => Self::BadRequest(err.to_string()),
            CreateKeyError::DuplicateCode => Self::Conflict(err.to_string()),
            CreateKeyError::Internal(e) => Self::Internal(e.to_string()),
        }
    }
}
