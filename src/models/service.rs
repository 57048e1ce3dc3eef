use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named product a user issues keys for. Owned exclusively by its creator;
/// deleting it removes every key scoped to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub owner_username: String,
    pub created_at: DateTime<Utc>,
}
