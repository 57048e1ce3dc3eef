use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A license key record.
///
/// `code` is the caller-supplied identifier clients present at validation time;
/// it is unique across the entire ledger and immutable. `hwid` starts out as
/// `None` and is written exactly once, on the first successful validation —
/// that is the binding event, undone only by an explicit reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseKey {
    pub code: String,

    pub name: String,

    /// Service this key is scoped to. A key with no service never validates.
    pub service_id: Option<String>,

    pub owner_id: String,

    pub owner_username: String,

    /// Hardware identifier the key is bound to, once first used.
    pub hwid: Option<String>,

    /// Immutable once set; checked at validation time, never swept.
    pub expiration_date: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub first_used: Option<DateTime<Utc>>,

    #[serde(default)]
    pub last_used: Option<DateTime<Utc>>,
}

impl LicenseKey {
    /// Whether the key has passed its expiration date as of `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration_date.is_some_and(|exp| now > exp)
    }
}
