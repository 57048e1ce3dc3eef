use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered account. Never deleted; the current bearer token is replaced
/// wholesale on every successful login, so at most one session is live per user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,

    /// Unique, compared case-insensitively.
    pub username: String,

    /// Unique, compared case-insensitively.
    pub email: String,

    /// Argon2 PHC string. The plaintext password is never stored or logged.
    pub password_hash: String,

    /// Current bearer token (64 hex chars). Overwritten on login.
    pub token: String,

    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
}
